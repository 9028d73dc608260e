//! RSS 2.0 / RSS 1.0 / Atom entry extraction on top of `feed-rs`.
//!
//! Only the handful of fields the briefing needs are kept: the entry title,
//! its link and the first description-like field (summary, falling back to
//! the content body).

use feed_rs::model::Entry;
use feed_rs::parser;
use std::error::Error;
use tracing::debug;

/// One `<item>` or `<entry>` as it appears in the feed, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    /// Raw description (may contain HTML markup).
    pub summary: Option<String>,
}

/// First `alternate` (or rel-less) link, then any link, then a URL-shaped id.
fn entry_link(entry: &Entry) -> String {
    let usable = || entry.links.iter().filter(|l| !l.href.trim().is_empty());
    if let Some(link) = usable().find(|l| {
        l.rel
            .as_deref()
            .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    }) {
        return link.href.trim().to_string();
    }
    if let Some(link) = usable().next() {
        return link.href.trim().to_string();
    }
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return id.to_string();
    }
    String::new()
}

fn entry_summary(entry: &Entry) -> Option<String> {
    entry
        .summary
        .as_ref()
        .map(|text| text.content.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|content| content.body.as_deref())
                .map(|body| body.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

impl From<&Entry> for FeedEntry {
    fn from(entry: &Entry) -> Self {
        FeedEntry {
            title: entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default(),
            link: entry_link(entry),
            summary: entry_summary(entry),
        }
    }
}

/// Parse every entry out of an RSS or Atom document.
///
/// # Errors
///
/// Returns an error when the document is not a feed (malformed XML, or an
/// HTML error page served in place of the feed).
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, Box<dyn Error>> {
    let feed = parser::parse(xml.as_bytes())?;
    let entries: Vec<FeedEntry> = feed.entries.iter().map(FeedEntry::from).collect();
    debug!(entries = entries.len(), "Parsed feed document");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Local News</title>
    <link>https://news.example.com</link>
    <description>Local headlines</description>
    <item>
      <title>Council &amp; mayor reach budget deal</title>
      <link>https://news.example.com/budget</link>
      <description><![CDATA[<p>The council voted <b>9-4</b>.</p>]]></description>
    </item>
    <item>
      <title>Snow expected tonight</title>
      <link>https://news.example.com/snow</link>
      <content:encoded>&lt;p&gt;Up to six inches&lt;/p&gt;</content:encoded>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:atom-feed</id>
  <updated>2026-10-19T08:00:00Z</updated>
  <link rel="self" href="https://atom.example.com/feed"/>
  <entry>
    <title>Transit fares to rise</title>
    <id>urn:uuid:fares</id>
    <updated>2026-10-19T08:00:00Z</updated>
    <source>
      <title>Origin Feed</title>
      <id>urn:uuid:origin</id>
    </source>
    <link rel="edit" href="https://atom.example.com/edit/1"/>
    <link rel="alternate" href="https://atom.example.com/fares"/>
    <summary>Fares rise in January.</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Council & mayor reach budget deal");
        assert_eq!(entries[0].link, "https://news.example.com/budget");
        assert_eq!(
            entries[0].summary.as_deref(),
            Some("<p>The council voted <b>9-4</b>.</p>")
        );
        assert_eq!(entries[1].summary.as_deref(), Some("<p>Up to six inches</p>"));
    }

    #[test]
    fn test_channel_title_is_not_an_entry() {
        let entries = parse_feed(RSS).unwrap();
        assert!(entries.iter().all(|e| e.title != "Local News"));
    }

    #[test]
    fn test_atom_entry_title_ignores_nested_source_title() {
        let entries = parse_feed(ATOM).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Transit fares to rise");
        assert_eq!(entries[0].link, "https://atom.example.com/fares");
        assert_eq!(entries[0].summary.as_deref(), Some("Fares rise in January."));
    }

    #[test]
    fn test_entry_without_link_keeps_empty_link() {
        let xml = r#"<rss version="2.0"><channel><title>T</title><item><title>No link here</title></item></channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].link.is_empty());
        assert!(entries[0].summary.is_none());
    }

    #[test]
    fn test_permalink_guid_stands_in_for_missing_link() {
        let xml = r#"<rss version="2.0"><channel><title>T</title><item><title>Guid only</title>
            <guid isPermaLink="true">https://news.example.com/guid-story</guid></item></channel></rss>"#;
        let entries = parse_feed(xml).unwrap();
        assert_eq!(entries[0].link, "https://news.example.com/guid-story");
    }

    #[test]
    fn test_html_document_is_rejected() {
        let html = "<html><head><title>502 Bad Gateway</title></head><body></body></html>";
        assert!(parse_feed(html).is_err());
    }

    #[test]
    fn test_non_xml_body_is_an_error() {
        assert!(parse_feed("Service Unavailable").is_err());
    }
}
