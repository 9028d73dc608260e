//! Data models flowing through the briefing pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedSource`]: A named RSS/Atom endpoint from the configuration
//! - [`CandidateItem`]: A newsworthy feed entry admitted by the collector
//! - [`DedupedItem`]: A candidate that survived title deduplication
//! - [`ExtractedNote`]: The one-line attributed note handed to the rewriter
//! - [`Episode`]: A published briefing, persisted in the episode manifest

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named feed endpoint.
///
/// Sources are loaded once per run from the configuration file and are
/// identified by `name`, which is also the attribution used in notes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    /// Display name used for attribution (e.g. "WBUR").
    pub name: String,
    /// URL of the RSS or Atom document.
    pub rss_url: String,
}

/// A feed entry that passed the newsworthiness filter and the per-source cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    /// Name of the [`FeedSource`] the entry came from.
    pub source: String,
    /// Entry headline, entity-decoded and whitespace-collapsed.
    pub title: String,
    /// Absolute link to the article page.
    pub link: String,
    /// HTML-stripped feed description, kept as an extraction fallback.
    pub summary: Option<String>,
}

/// A candidate that survived deduplication. Same shape, narrower meaning.
pub type DedupedItem = CandidateItem;

/// A single attributed lead sentence for one story.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractedNote {
    pub source: String,
    pub sentence: String,
    pub link: String,
}

impl fmt::Display for ExtractedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (link: {})", self.source, self.sentence, self.link)
    }
}

/// A published briefing.
///
/// Episodes are keyed by `date` (`YYYY-MM-DD`); re-running the pipeline on the
/// same day replaces that day's entry in the manifest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Stable identifier, equal to `date`.
    pub id: String,
    /// Human title, e.g. "Boston Briefing – October 19, 2026".
    pub title: String,
    /// Local date in `YYYY-MM-DD` format.
    pub date: String,
    /// The spoken script as sent to the synthesizer.
    pub script: String,
    /// Audio file name relative to the `episodes/` directory, if audio was produced.
    pub audio_file: Option<String>,
    /// Size of the audio file in bytes (0 when no audio was produced).
    pub audio_bytes: u64,
    /// Notes the script was written from, in script order.
    pub sources: Vec<ExtractedNote>,
    /// RFC 3339 timestamp of generation.
    pub generated_at: String,
    /// Rough duration estimate in seconds.
    pub duration_secs: u32,
}

impl Episode {
    /// Whether this episode has an audio enclosure.
    pub fn has_audio(&self) -> bool {
        self.audio_file.is_some() && self.audio_bytes > 0
    }
}
