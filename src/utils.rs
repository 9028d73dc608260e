//! Utility functions for text handling, time classification and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Time-of-day classification for the greeting
//! - Whitespace collapsing, word counting and HTML stripping for feed/article text
//! - String truncation for logging
//! - File system validation for output directories

use chrono::{NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// User agent sent on feed and first-pass article requests.
pub const USER_AGENT: &str = concat!("daily_briefing/", env!("CARGO_PKG_VERSION"));

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Classify a local time into morning, afternoon, or evening.
///
/// The boundaries are:
/// - **Morning**: 00:00 - 12:00
/// - **Afternoon**: 12:00 - 17:00
/// - **Evening**: 17:00 - 24:00
pub fn time_of_day(time: NaiveTime) -> &'static str {
    match time.hour() {
        0..=11 => "morning",
        12..=16 => "afternoon",
        _ => "evening",
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Count whitespace-separated words.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Decode entities and drop markup from a feed snippet, returning plain text.
///
/// Feed descriptions routinely carry escaped HTML (`&lt;p&gt;…`), so the text
/// is entity-decoded first and then parsed as an HTML fragment.
pub fn strip_html(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let fragment = Html::parse_fragment(&decoded);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    collapse_whitespace(&text)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes with
/// an ellipsis and a byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Build the shared HTTP client with an explicit per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a scratch file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}
