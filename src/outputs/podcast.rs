//! Podcast RSS 2.0 feed (`feed.xml`) with the iTunes namespace.
//!
//! Episodes are listed newest first. Only episodes with audio get an
//! `<enclosure>`; a degraded day still appears as an item so subscribers see
//! that the run happened.

use crate::config::ShowConfig;
use crate::models::Episode;
use crate::outputs::episodes::EPISODES_DIR;
use chrono::{DateTime, NaiveDate};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::error::Error;
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const FEED_FILE: &str = "feed.xml";
const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// Absolute (or site-relative, without a base URL) URL of a published file.
pub fn public_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.is_empty() {
        path.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// RFC 2822 date for `<pubDate>`, from the generation timestamp or the episode date.
fn pub_date(episode: &Episode) -> String {
    if let Ok(generated) = DateTime::parse_from_rfc3339(&episode.generated_at) {
        return generated.to_rfc2822();
    }
    NaiveDate::parse_from_str(&episode.date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().to_rfc2822())
        .unwrap_or_default()
}

fn item_description(episode: &Episode) -> String {
    if episode.sources.is_empty() {
        return episode.script.clone();
    }
    episode
        .sources
        .iter()
        .map(|note| format!("{}: {}", note.source, note.sentence))
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Render the feed document.
pub fn render_feed(show: &ShowConfig, base_url: &str, episodes: &[Episode]) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    let site = if show.link.is_empty() { base_url } else { show.link.as_str() };
    write_text_element(&mut writer, "title", &show.title)?;
    write_text_element(&mut writer, "link", site)?;
    write_text_element(&mut writer, "description", &show.description)?;
    write_text_element(&mut writer, "language", &show.language)?;
    write_text_element(&mut writer, "itunes:author", &show.author)?;
    write_text_element(&mut writer, "itunes:summary", &show.description)?;
    write_text_element(&mut writer, "itunes:explicit", "false")?;
    if let Some(latest) = episodes.first() {
        write_text_element(&mut writer, "lastBuildDate", &pub_date(latest))?;
    }

    for episode in episodes {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &episode.title)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&format!("{}-{}", show.slug, episode.id))))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "pubDate", &pub_date(episode))?;
        write_text_element(&mut writer, "description", &item_description(episode))?;

        if let (true, Some(audio_file)) = (episode.has_audio(), &episode.audio_file) {
            let url = public_url(base_url, &format!("{EPISODES_DIR}/{audio_file}"));
            let length = episode.audio_bytes.to_string();
            let mut enclosure = BytesStart::new("enclosure");
            enclosure.push_attribute(("url", url.as_str()));
            enclosure.push_attribute(("length", length.as_str()));
            enclosure.push_attribute(("type", "audio/mpeg"));
            writer.write_event(Event::Empty(enclosure))?;
            write_text_element(&mut writer, "itunes:duration", &episode.duration_secs.to_string())?;
        }
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

#[instrument(level = "info", skip_all, fields(episodes = episodes.len()))]
pub async fn write_feed(
    output_dir: &Path,
    show: &ShowConfig,
    base_url: &str,
    episodes: &[Episode],
) -> Result<(), Box<dyn Error>> {
    let xml = render_feed(show, base_url, episodes)?;
    let path = output_dir.join(FEED_FILE);
    fs::write(&path, xml).await?;
    info!(path = %path.display(), "Wrote podcast feed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::rss::parse_feed;
    use crate::models::ExtractedNote;

    fn episode(date: &str, audio_bytes: u64) -> Episode {
        Episode {
            id: date.to_string(),
            title: format!("Boston Briefing – {date}"),
            date: date.to_string(),
            script: "Good morning & welcome.".to_string(),
            audio_file: (audio_bytes > 0).then(|| format!("boston-briefing-{date}.mp3")),
            audio_bytes,
            sources: vec![ExtractedNote {
                source: "WBUR".to_string(),
                sentence: "Council passes <budget>".to_string(),
                link: "https://www.wbur.org/1".to_string(),
            }],
            generated_at: format!("{date}T08:00:00-04:00"),
            duration_secs: 95,
        }
    }

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("https://x.org/", "episodes/a.mp3"), "https://x.org/episodes/a.mp3");
        assert_eq!(public_url("", "episodes/a.mp3"), "episodes/a.mp3");
    }

    #[test]
    fn test_enclosure_only_for_audio_episodes() {
        let episodes = vec![episode("2026-10-19", 0), episode("2026-10-18", 123_456)];
        let xml = render_feed(&ShowConfig::default(), "https://briefing.example.org", &episodes).unwrap();

        assert!(xml.contains(r#"xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd""#));
        assert_eq!(xml.matches("<enclosure").count(), 1);
        assert!(xml.contains(
            r#"<enclosure url="https://briefing.example.org/episodes/boston-briefing-2026-10-18.mp3" length="123456" type="audio/mpeg"/>"#
        ));
        assert!(xml.contains("<pubDate>Mon, 19 Oct 2026 08:00:00 -0400</pubDate>"));
        assert!(xml.contains("Council passes &lt;budget&gt;"));
        assert!(xml.find("2026-10-19").unwrap() < xml.find("2026-10-18").unwrap());
    }

    #[test]
    fn test_feed_parses_back_as_rss() {
        let episodes = vec![episode("2026-10-19", 10)];
        let xml = render_feed(&ShowConfig::default(), "", &episodes).unwrap();
        let entries = parse_feed(&xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Boston Briefing – 2026-10-19");
        assert_eq!(entries[0].summary.as_deref(), Some("WBUR: Council passes <budget>"));
    }

    #[tokio::test]
    async fn test_write_feed_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        write_feed(dir.path(), &ShowConfig::default(), "", &[]).await.unwrap();
        let xml = std::fs::read_to_string(dir.path().join(FEED_FILE)).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<title>Boston Briefing</title>"));
    }
}
