//! One end-to-end briefing run.
//!
//! ```text
//! collect → dedupe → prioritize → notes → rewrite → sanitize → synthesize → publish
//! ```
//!
//! Every stage before publication degrades instead of failing: unreachable
//! feeds yield no candidates, an empty note list or an unavailable rewrite
//! yields the fixed fallback script, and a failed synthesis yields an episode
//! without audio. Only filesystem errors while publishing end the run.

use crate::config::BriefingConfig;
use crate::dedupe::{dedupe, prioritize};
use crate::extract::ArticleText;
use crate::feeds;
use crate::models::Episode;
use crate::notes::build_notes;
use crate::outputs::{self, episodes};
use crate::rewrite::{ScriptRewriter, fallback_script, greeting};
use crate::sanitize::{SpeechLexicon, sanitize_for_speech};
use crate::tts::SpeechSynthesizer;
use crate::utils::ensure_writable_dir;
use chrono::{DateTime, FixedOffset};
use reqwest::Client;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Where the episode is published.
#[derive(Debug, Clone, Copy)]
pub struct PublishTarget<'a> {
    pub output_dir: &'a Path,
    /// Prefix for audio and feed URLs; empty for site-relative links.
    pub public_base_url: &'a str,
}

/// External services the run talks to. `synthesizer` is `None` when audio is disabled.
pub struct Collaborators<'a, E, R, S> {
    pub http: &'a Client,
    pub extractor: &'a E,
    pub rewriter: &'a R,
    pub synthesizer: Option<&'a S>,
    pub lexicon: &'a SpeechLexicon,
}

/// What a run produced, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub candidates: usize,
    pub deduped: usize,
    pub notes: usize,
    /// The fixed apology script was used instead of a rewritten one.
    pub used_fallback: bool,
    pub episode: Episode,
}

#[instrument(level = "info", skip_all, fields(date = %now.date_naive()))]
pub async fn run<E, R, S>(
    config: &BriefingConfig,
    target: PublishTarget<'_>,
    parts: &Collaborators<'_, E, R, S>,
    now: DateTime<FixedOffset>,
) -> Result<RunReport, Box<dyn Error>>
where
    E: ArticleText,
    R: ScriptRewriter,
    S: SpeechSynthesizer,
{
    ensure_writable_dir(target.output_dir).await?;

    let candidates = feeds::collect(
        parts.http,
        &config.sources,
        &config.exclude_keywords,
        config.daily_limit_per_source,
        config.concurrency,
    )
    .await;
    let candidate_count = candidates.len();

    let items = prioritize(dedupe(candidates, config.dedupe_threshold), &config.prioritize_sources);
    let deduped_count = items.len();

    let notes = build_notes(
        parts.extractor,
        &items,
        config.max_items,
        config.min_lead_words,
        config.concurrency,
    )
    .await;

    let opening = greeting(now.naive_local(), &config.show.title);
    let rewritten = if notes.is_empty() {
        warn!("No notes survived; using fallback script");
        None
    } else {
        parts.rewriter.rewrite(&opening, &notes).await
    };
    let used_fallback = rewritten.is_none();
    let script = rewritten.unwrap_or_else(|| fallback_script(&opening));
    let spoken = sanitize_for_speech(&script, parts.lexicon);

    let audio = match parts.synthesizer {
        Some(synthesizer) => synthesizer.synthesize(&spoken).await,
        None => {
            info!("Audio disabled; skipping synthesis");
            None
        }
    };

    let date = now.date_naive();
    let episode = Episode {
        id: date.to_string(),
        title: episodes::episode_title(&config.show.title, date),
        date: date.to_string(),
        duration_secs: episodes::estimate_duration_secs(&spoken),
        script: spoken,
        audio_file: None,
        audio_bytes: 0,
        sources: notes,
        generated_at: now.to_rfc3339(),
    };
    let note_count = episode.sources.len();

    let episode = outputs::publish_episode(
        target.output_dir,
        &config.show,
        target.public_base_url,
        episode,
        audio.as_deref(),
        now,
    )
    .await?;

    info!(
        candidates = candidate_count,
        deduped = deduped_count,
        notes = note_count,
        used_fallback,
        audio_bytes = episode.audio_bytes,
        "Briefing run complete"
    );
    Ok(RunReport {
        candidates: candidate_count,
        deduped: deduped_count,
        notes: note_count,
        used_fallback,
        episode,
    })
}
