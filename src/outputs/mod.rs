//! Publication of a finished episode to the static site directory.
//!
//! # Submodules
//!
//! - [`episodes`]: Audio/script files and the date-keyed episode manifest
//! - [`podcast`]: Podcast RSS feed with audio enclosures
//! - [`show_notes`]: `index.html` with the latest stories and an archive
//! - [`api`]: Static JSON endpoints
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── episodes/
//! │   ├── boston-briefing-2026-10-19.mp3
//! │   ├── boston-briefing-2026-10-19.txt
//! │   └── episodes.json
//! ├── api/
//! │   ├── episodes.json
//! │   └── health.json
//! ├── feed.xml
//! └── index.html
//! ```

pub mod api;
pub mod episodes;
pub mod podcast;
pub mod show_notes;

use crate::config::ShowConfig;
use crate::models::Episode;
use chrono::{DateTime, FixedOffset};
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

/// Write the episode's files, upsert it into the manifest, and regenerate
/// the feed, the show notes and the JSON API from the full manifest.
///
/// Returns the episode as recorded (with its audio file name and size).
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %episode.date))]
pub async fn publish_episode(
    output_dir: &Path,
    show: &ShowConfig,
    public_base_url: &str,
    mut episode: Episode,
    audio: Option<&[u8]>,
    now: DateTime<FixedOffset>,
) -> Result<Episode, Box<dyn Error>> {
    let episodes_dir = output_dir.join(episodes::EPISODES_DIR);
    episodes::write_episode_files(&episodes_dir, &show.slug, &mut episode, audio).await?;

    let manifest = episodes::load_manifest(&episodes_dir).await?;
    let manifest = episodes::upsert(manifest, episode.clone());
    episodes::save_manifest(&episodes_dir, &manifest).await?;

    podcast::write_feed(output_dir, show, public_base_url, &manifest).await?;
    show_notes::write_index(output_dir, show, public_base_url, &manifest).await?;
    api::write_api(output_dir, show, public_base_url, &manifest, now).await?;

    info!(
        episodes = manifest.len(),
        audio_bytes = episode.audio_bytes,
        "Published episode"
    );
    Ok(episode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn episode(date: &str) -> Episode {
        Episode {
            id: date.to_string(),
            title: format!("Boston Briefing – {date}"),
            date: date.to_string(),
            script: "Good morning.".to_string(),
            audio_file: None,
            audio_bytes: 0,
            sources: Vec::new(),
            generated_at: format!("{date}T08:00:00-04:00"),
            duration_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_publish_twice_same_day_keeps_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let show = ShowConfig::default();
        let now = FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 8, 0, 0)
            .unwrap();

        publish_episode(dir.path(), &show, "", episode("2026-10-18"), Some(&b"mp3"[..]), now)
            .await
            .unwrap();
        publish_episode(dir.path(), &show, "", episode("2026-10-19"), None, now)
            .await
            .unwrap();
        let recorded = publish_episode(dir.path(), &show, "", episode("2026-10-19"), Some(&b"ID3x"[..]), now)
            .await
            .unwrap();
        assert_eq!(recorded.audio_bytes, 4);

        let manifest = episodes::load_manifest(&dir.path().join("episodes")).await.unwrap();
        let dates: Vec<&str> = manifest.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-10-19", "2026-10-18"]);

        let feed = std::fs::read_to_string(dir.path().join("feed.xml")).unwrap();
        assert_eq!(feed.matches("<item>").count(), 2);
        assert_eq!(feed.matches("<enclosure").count(), 2);
        assert!(dir.path().join("index.html").exists());
        assert!(dir.path().join("api/episodes.json").exists());
        assert!(dir.path().join("api/health.json").exists());
    }
}
