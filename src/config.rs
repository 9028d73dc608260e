//! Run configuration loaded from a YAML file.
//!
//! Everything the pipeline tunes (feed list, filters, caps, thresholds,
//! rewriter models) lives in one [`BriefingConfig`] value that is passed
//! explicitly into each component. Optional fields fall back to the
//! defaults below so a minimal file only needs `sources`.
//!
//! ```yaml
//! show:
//!   title: Boston Briefing
//!   slug: boston-briefing
//! sources:
//!   - name: WBUR
//!     rss_url: https://www.wbur.org/feed
//! exclude_keywords: [sports, horoscope]
//! daily_limit_per_source: 4
//! max_items: 8
//! ```

use crate::dedupe::DEFAULT_THRESHOLD;
use crate::models::FeedSource;
use itertools::Itertools;
use serde::Deserialize;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

/// Show metadata used by the greeting, the podcast feed and the show notes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    pub title: String,
    /// File-name prefix for episode artifacts.
    pub slug: String,
    pub description: String,
    pub author: String,
    pub language: String,
    /// Public site URL; audio enclosure URLs are built from it.
    pub link: String,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            title: "Boston Briefing".to_string(),
            slug: "boston-briefing".to_string(),
            description: "A short spoken roundup of the day's local headlines.".to_string(),
            author: "Boston Briefing".to_string(),
            language: "en-us".to_string(),
            link: String::new(),
        }
    }
}

/// Language-model settings for the script rewriter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewriterConfig {
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    /// Models tried in order until one produces a usable script.
    pub models: Vec<String>,
    /// Retries per model before moving on to the next one.
    pub max_retries: usize,
    /// Scripts shorter than this are treated as a failed rewrite.
    pub min_script_words: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
            max_retries: 1,
            min_script_words: 40,
            temperature: 0.4,
            timeout_secs: 120,
        }
    }
}

/// Complete configuration for one briefing run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BriefingConfig {
    pub show: ShowConfig,
    pub sources: Vec<FeedSource>,
    /// Titles containing any of these (case-insensitive substring) are dropped.
    pub exclude_keywords: Vec<String>,
    /// Accepted entries per source; rejected entries do not count.
    pub daily_limit_per_source: usize,
    /// Upper bound on notes handed to the rewriter.
    pub max_items: usize,
    /// Token-set ratio (0-100) at or above which two titles are duplicates.
    pub dedupe_threshold: u8,
    /// Lead sentences shorter than this are discarded.
    pub min_lead_words: usize,
    /// When non-empty, deduped items are stably reordered by this source list.
    pub prioritize_sources: Vec<String>,
    /// Concurrent feed/article fetches.
    pub concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub rewriter: RewriterConfig,
    /// Optional replacement for the built-in speech lexicon.
    pub lexicon_path: Option<String>,
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            show: ShowConfig::default(),
            sources: Vec::new(),
            exclude_keywords: Vec::new(),
            daily_limit_per_source: 4,
            max_items: 8,
            dedupe_threshold: DEFAULT_THRESHOLD,
            min_lead_words: 6,
            prioritize_sources: Vec::new(),
            concurrency: 4,
            fetch_timeout_secs: 20,
            rewriter: RewriterConfig::default(),
            lexicon_path: None,
        }
    }
}

impl BriefingConfig {
    /// Parse a configuration from YAML text and normalize it.
    pub fn from_yaml(yaml: &str) -> Result<Self, Box<dyn Error>> {
        let config: BriefingConfig = serde_yaml::from_str(yaml)?;
        Ok(config.normalized())
    }

    /// Lower-case and de-duplicate exclude keywords, clamp degenerate values.
    fn normalized(mut self) -> Self {
        self.exclude_keywords = self
            .exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .unique()
            .collect();
        self.concurrency = self.concurrency.max(1);
        self.dedupe_threshold = self.dedupe_threshold.min(100);
        self
    }
}

/// Load the briefing configuration from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_config(path: impl AsRef<Path>) -> Result<BriefingConfig, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    let config = BriefingConfig::from_yaml(&text)?;
    info!(
        sources = config.sources.len(),
        exclude_keywords = config.exclude_keywords.len(),
        max_items = config.max_items,
        "Loaded briefing configuration"
    );
    Ok(config)
}
