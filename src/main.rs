//! # Daily Briefing
//!
//! Builds a short spoken news briefing from a list of RSS/Atom feeds and
//! publishes it as a podcast episode on a static site.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=... ELEVEN_API_KEY=... ELEVEN_VOICE_ID=... daily_briefing -o ./public
//! ```
//!
//! ## Architecture
//!
//! 1. **Collecting**: Fetch every feed and keep newsworthy entries, capped per source
//! 2. **Deduplicating**: Drop near-duplicate headlines across sources
//! 3. **Notes**: Reduce each story to one attributed lead sentence
//! 4. **Rewriting**: Turn the notes into a radio script with a language model
//! 5. **Speech**: Normalize the script for speech and synthesize audio
//! 6. **Output**: Write the episode, podcast feed, show notes and JSON API
//!
//! A run always publishes an episode; missing feeds, models or audio only
//! degrade it.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dedupe;
mod extract;
mod feeds;
mod models;
mod notes;
mod outputs;
mod pipeline;
mod rewrite;
mod sanitize;
mod tts;
mod utils;

use cli::Cli;
use extract::ArticleExtractor;
use pipeline::{Collaborators, PublishTarget};
use rewrite::{DEFAULT_STYLE_PROMPT, LlmRewriter};
use sanitize::SpeechLexicon;
use tts::{ElevenLabs, load_voice_config};

/// Synthesis of a full script regularly takes over a minute.
const TTS_TIMEOUT: Duration = Duration::from_secs(180);

/// Style prompt from `--prompt`, or the built-in one when absent or unreadable.
async fn load_style_prompt(path: Option<&str>) -> String {
    let Some(path) = path else {
        return DEFAULT_STYLE_PROMPT.to_string();
    };
    match tokio::fs::read_to_string(path).await {
        Ok(prompt) if !prompt.trim().is_empty() => {
            info!(path, "Loaded style prompt");
            prompt
        }
        Ok(_) => {
            warn!(path, "Style prompt file is empty; using the default prompt");
            DEFAULT_STYLE_PROMPT.to_string()
        }
        Err(e) => {
            warn!(path, error = %e, "Could not read style prompt; using the default prompt");
            DEFAULT_STYLE_PROMPT.to_string()
        }
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_briefing starting up");

    let args = Cli::parse();
    debug!(config = %args.config, output_dir = %args.output_dir, no_audio = args.no_audio, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match config::load_config(&args.config).await {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config, error = %e, "Failed to load configuration");
            return Err(e);
        }
    };
    if let Some(max_items) = args.max_items {
        info!(max_items, "Overriding max_items from the command line");
        config.max_items = max_items;
    }
    if config.sources.is_empty() {
        warn!("No feed sources configured; the episode will use the fallback script");
    }

    let style_prompt = load_style_prompt(args.prompt.as_deref()).await;
    let lexicon = SpeechLexicon::load(config.lexicon_path.as_deref().map(Path::new)).await?;

    // ---- Services ----
    let http = utils::http_client(Duration::from_secs(config.fetch_timeout_secs))?;
    let extractor = ArticleExtractor::new(http.clone());
    let rewriter = LlmRewriter::from_config(&config.rewriter, args.openai_api_key.as_deref(), style_prompt)?;
    let synthesizer = if args.no_audio {
        None
    } else {
        let voice = load_voice_config(Path::new(&args.voice_settings)).await;
        Some(ElevenLabs::new(
            utils::http_client(TTS_TIMEOUT)?,
            args.eleven_api_key.clone(),
            args.eleven_voice_id.clone(),
            voice,
        ))
    };

    let public_base_url = args
        .public_base_url
        .clone()
        .unwrap_or_else(|| config.show.link.clone());
    if public_base_url.is_empty() {
        warn!("No public base URL; feed enclosures will use site-relative links");
    }

    let parts = Collaborators {
        http: &http,
        extractor: &extractor,
        rewriter: &rewriter,
        synthesizer: synthesizer.as_ref(),
        lexicon: &lexicon,
    };
    let target = PublishTarget {
        output_dir: Path::new(&args.output_dir),
        public_base_url: &public_base_url,
    };

    // ---- Run ----
    let report = match pipeline::run(&config, target, &parts, Local::now().fixed_offset()).await {
        Ok(report) => report,
        Err(e) => {
            error!(output_dir = %args.output_dir, error = %e, "Briefing run failed");
            return Err(e);
        }
    };

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        date = %report.episode.date,
        notes = report.notes,
        used_fallback = report.used_fallback,
        has_audio = report.episode.has_audio(),
        "Execution complete"
    );

    Ok(())
}
