//! Episode artifacts and the episode manifest.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/episodes/
//! ├── boston-briefing-2026-10-18.mp3
//! ├── boston-briefing-2026-10-18.txt
//! ├── boston-briefing-2026-10-19.txt   # degraded day: script only
//! └── episodes.json                    # manifest, newest first
//! ```
//!
//! The manifest is keyed by date: publishing twice on the same day replaces
//! that day's entry instead of adding a second one.

use crate::models::Episode;
use crate::utils::word_count;
use chrono::NaiveDate;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

pub const EPISODES_DIR: &str = "episodes";
pub const MANIFEST_FILE: &str = "episodes.json";

/// Speaking rate used for the duration estimate.
const WORDS_PER_MINUTE: usize = 150;

/// File stem shared by an episode's audio and script, e.g. `boston-briefing-2026-10-19`.
pub fn episode_stem(slug: &str, date: &str) -> String {
    format!("{slug}-{date}")
}

/// Human title, e.g. `Boston Briefing – October 19, 2026`.
pub fn episode_title(show_title: &str, date: NaiveDate) -> String {
    format!("{show_title} – {}", date.format("%B %d, %Y"))
}

/// Rough spoken length of a script in seconds.
pub fn estimate_duration_secs(script: &str) -> u32 {
    let secs = (word_count(script) * 60).div_ceil(WORDS_PER_MINUTE);
    u32::try_from(secs.max(1)).unwrap_or(u32::MAX)
}

/// Write the script (and audio, when present) and record them on the episode.
///
/// A missing or empty `audio` leaves the episode without an audio file and
/// with `audio_bytes == 0`.
#[instrument(level = "info", skip_all, fields(date = %episode.date))]
pub async fn write_episode_files(
    episodes_dir: &Path,
    slug: &str,
    episode: &mut Episode,
    audio: Option<&[u8]>,
) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(episodes_dir).await {
        error!(dir = %episodes_dir.display(), error = %e, "Failed to create episodes dir");
        return Err(e.into());
    }

    let stem = episode_stem(slug, &episode.date);
    let script_path = episodes_dir.join(format!("{stem}.txt"));
    fs::write(&script_path, &episode.script).await?;
    info!(path = %script_path.display(), "Wrote episode script");

    match audio.filter(|bytes| !bytes.is_empty()) {
        Some(bytes) => {
            let audio_name = format!("{stem}.mp3");
            let audio_path = episodes_dir.join(&audio_name);
            fs::write(&audio_path, bytes).await?;
            episode.audio_file = Some(audio_name);
            episode.audio_bytes = bytes.len() as u64;
            info!(path = %audio_path.display(), bytes = bytes.len(), "Wrote episode audio");
        }
        None => {
            episode.audio_file = None;
            episode.audio_bytes = 0;
            warn!("No audio for this episode; publishing script only");
        }
    }
    Ok(())
}

/// Read the manifest; a missing file is an empty archive.
pub async fn load_manifest(episodes_dir: &Path) -> Result<Vec<Episode>, Box<dyn Error>> {
    let path = episodes_dir.join(MANIFEST_FILE);
    if !fs::try_exists(&path).await? {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(&path).await?;
    let episodes: Vec<Episode> = serde_json::from_str(&raw)
        .map_err(|e| format!("corrupt manifest {}: {e}", path.display()))?;
    Ok(episodes)
}

/// Replace any episode with the same date and sort newest first.
pub fn upsert(mut manifest: Vec<Episode>, episode: Episode) -> Vec<Episode> {
    manifest.retain(|existing| existing.date != episode.date);
    manifest.push(episode);
    manifest.sort_by(|a, b| b.date.cmp(&a.date));
    manifest
}

pub async fn save_manifest(episodes_dir: &Path, manifest: &[Episode]) -> Result<(), Box<dyn Error>> {
    let path = episodes_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), episodes = manifest.len(), "Wrote episode manifest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(date: &str, script: &str) -> Episode {
        Episode {
            id: date.to_string(),
            title: format!("Boston Briefing – {date}"),
            date: date.to_string(),
            script: script.to_string(),
            audio_file: None,
            audio_bytes: 0,
            sources: Vec::new(),
            generated_at: format!("{date}T08:00:00-04:00"),
            duration_secs: 60,
        }
    }

    #[test]
    fn test_title_and_stem() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        assert_eq!(episode_title("Boston Briefing", date), "Boston Briefing – October 09, 2026");
        assert_eq!(episode_stem("boston-briefing", "2026-10-09"), "boston-briefing-2026-10-09");
    }

    #[test]
    fn test_duration_estimate() {
        assert_eq!(estimate_duration_secs(""), 1);
        assert_eq!(estimate_duration_secs(&"word ".repeat(150)), 60);
        assert_eq!(estimate_duration_secs(&"word ".repeat(151)), 61);
    }

    #[test]
    fn test_upsert_replaces_same_date_and_sorts_newest_first() {
        let manifest = vec![episode("2026-10-17", "a"), episode("2026-10-18", "b")];
        let manifest = upsert(manifest, episode("2026-10-19", "c"));
        let manifest = upsert(manifest, episode("2026-10-18", "b2"));

        let dates: Vec<&str> = manifest.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-10-19", "2026-10-18", "2026-10-17"]);
        assert_eq!(manifest[1].script, "b2");
    }

    #[tokio::test]
    async fn test_write_files_with_and_without_audio() {
        let dir = tempfile::tempdir().unwrap();
        let episodes_dir = dir.path().join(EPISODES_DIR);

        let mut with_audio = episode("2026-10-19", "Good morning.");
        write_episode_files(&episodes_dir, "boston-briefing", &mut with_audio, Some(&b"ID3abc"[..]))
            .await
            .unwrap();
        assert_eq!(with_audio.audio_file.as_deref(), Some("boston-briefing-2026-10-19.mp3"));
        assert_eq!(with_audio.audio_bytes, 6);
        assert!(with_audio.has_audio());
        let script = std::fs::read_to_string(episodes_dir.join("boston-briefing-2026-10-19.txt")).unwrap();
        assert_eq!(script, "Good morning.");

        let mut degraded = episode("2026-10-20", "Sorry.");
        write_episode_files(&episodes_dir, "boston-briefing", &mut degraded, Some(&b""[..]))
            .await
            .unwrap();
        assert_eq!(degraded.audio_file, None);
        assert_eq!(degraded.audio_bytes, 0);
        assert!(!episodes_dir.join("boston-briefing-2026-10-20.mp3").exists());
    }

    #[tokio::test]
    async fn test_manifest_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_manifest(dir.path()).await.unwrap().is_empty());

        let manifest = upsert(Vec::new(), episode("2026-10-19", "script"));
        save_manifest(dir.path(), &manifest).await.unwrap();
        assert_eq!(load_manifest(dir.path()).await.unwrap(), manifest);

        std::fs::write(dir.path().join(MANIFEST_FILE), "not json").unwrap();
        assert!(load_manifest(dir.path()).await.is_err());
    }
}
