//! Feed collection: fetch every configured source and admit newsworthy entries.
//!
//! A source that cannot be fetched or parsed is logged and skipped; it never
//! aborts the collection. Sources are fetched concurrently but the merged
//! candidate list always follows the order of the configured source list.

use crate::feeds::rss::{FeedEntry, parse_feed};
use crate::models::{CandidateItem, FeedSource};
use crate::utils::{collapse_whitespace, strip_html};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Whether a title passes the exclude-keyword filter.
///
/// Matching is a case-insensitive *substring* test, so the keyword `sports`
/// also rejects "Transports union votes".
pub fn is_newsworthy(title: &str, exclude_keywords: &[String]) -> bool {
    let lowered = title.to_lowercase();
    !exclude_keywords
        .iter()
        .any(|keyword| lowered.contains(&keyword.to_lowercase()))
}

/// Turn one source's raw entries into candidates.
///
/// Entries need a non-empty title and a link that resolves (against the feed
/// URL) to an http(s) URL. Only accepted entries count toward `per_source_cap`.
pub fn admit_entries(
    source: &FeedSource,
    entries: Vec<FeedEntry>,
    exclude_keywords: &[String],
    per_source_cap: usize,
) -> Vec<CandidateItem> {
    let base = Url::parse(&source.rss_url).ok();
    let mut admitted = Vec::new();

    for entry in entries {
        if admitted.len() >= per_source_cap {
            break;
        }
        let title = collapse_whitespace(&entry.title);
        if title.is_empty() {
            continue;
        }
        let Some(link) = resolve_link(base.as_ref(), &entry.link) else {
            debug!(source = %source.name, %title, "Entry has no usable link");
            continue;
        };
        if !is_newsworthy(&title, exclude_keywords) {
            debug!(source = %source.name, %title, "Entry rejected by exclude keywords");
            continue;
        }
        let summary = entry
            .summary
            .as_deref()
            .map(strip_html)
            .filter(|s| !s.is_empty());

        admitted.push(CandidateItem {
            source: source.name.clone(),
            title,
            link,
            summary,
        });
    }
    admitted
}

fn resolve_link(base: Option<&Url>, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(link).ok()?,
        None => Url::parse(link).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Fetch and parse a single feed.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
async fn fetch_source(client: &Client, source: &FeedSource) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    let body = client
        .get(&source.rss_url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let entries = parse_feed(&body)?;
    debug!(entries = entries.len(), "Parsed feed");
    Ok(entries)
}

/// Collect candidates from every source.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the per-request timeout
/// * `sources` - Feeds to read, in priority order
/// * `exclude_keywords` - Lower-cased substrings that disqualify a title
/// * `per_source_cap` - Maximum accepted entries per source
/// * `concurrency` - Maximum feeds fetched at once
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn collect(
    client: &Client,
    sources: &[FeedSource],
    exclude_keywords: &[String],
    per_source_cap: usize,
    concurrency: usize,
) -> Vec<CandidateItem> {
    let per_source: Vec<Vec<CandidateItem>> = stream::iter(sources)
        .map(|source| async move {
            match fetch_source(client, source).await {
                Ok(entries) => {
                    let admitted = admit_entries(source, entries, exclude_keywords, per_source_cap);
                    info!(source = %source.name, admitted = admitted.len(), "Collected feed");
                    admitted
                }
                Err(e) => {
                    warn!(source = %source.name, url = %source.rss_url, error = %e, "Feed unavailable; skipping source");
                    Vec::new()
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let candidates: Vec<CandidateItem> = per_source.into_iter().flatten().collect();
    info!(count = candidates.len(), "Collected candidate items");
    candidates
}
