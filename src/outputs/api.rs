//! Static JSON endpoints served alongside the site.
//!
//! ```text
//! output_dir/api/
//! ├── episodes.json   # 10 newest episodes + total, lastUpdated, status
//! └── health.json     # liveness document for uptime checks
//! ```

use crate::config::ShowConfig;
use crate::models::Episode;
use crate::outputs::episodes::EPISODES_DIR;
use crate::outputs::podcast::public_url;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

pub const API_DIR: &str = "api";
/// Episodes listed by the episodes endpoint.
pub const RECENT_EPISODES: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEpisode<'a> {
    id: &'a str,
    title: &'a str,
    date: &'a str,
    script: &'a str,
    #[serde(rename = "audioURL")]
    audio_url: Option<String>,
    duration: u32,
    generated_at: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EpisodesResponse<'a> {
    episodes: Vec<ApiEpisode<'a>>,
    total: usize,
    last_updated: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    service: &'a str,
    timestamp: String,
    version: &'static str,
}

/// `api/episodes.json` body for a manifest that is already sorted newest first.
pub fn render_episodes(base_url: &str, episodes: &[Episode], now: DateTime<FixedOffset>) -> serde_json::Result<String> {
    let recent = episodes
        .iter()
        .take(RECENT_EPISODES)
        .map(|episode| ApiEpisode {
            id: &episode.id,
            title: &episode.title,
            date: &episode.date,
            script: &episode.script,
            audio_url: episode
                .audio_file
                .as_ref()
                .filter(|_| episode.has_audio())
                .map(|file| public_url(base_url, &format!("{EPISODES_DIR}/{file}"))),
            duration: episode.duration_secs,
            generated_at: &episode.generated_at,
        })
        .collect();

    serde_json::to_string_pretty(&EpisodesResponse {
        episodes: recent,
        total: episodes.len(),
        last_updated: now.to_rfc3339(),
        status: "success",
    })
}

/// `api/health.json` body.
pub fn render_health(show: &ShowConfig, now: DateTime<FixedOffset>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&HealthResponse {
        status: "healthy",
        service: &show.title,
        timestamp: now.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[instrument(level = "info", skip_all, fields(episodes = episodes.len()))]
pub async fn write_api(
    output_dir: &Path,
    show: &ShowConfig,
    base_url: &str,
    episodes: &[Episode],
    now: DateTime<FixedOffset>,
) -> Result<(), Box<dyn Error>> {
    let api_dir = output_dir.join(API_DIR);
    if let Err(e) = fs::create_dir_all(&api_dir).await {
        error!(dir = %api_dir.display(), error = %e, "Failed to create API dir");
        return Err(e.into());
    }

    let episodes_path = api_dir.join("episodes.json");
    fs::write(&episodes_path, render_episodes(base_url, episodes, now)?).await?;
    let health_path = api_dir.join("health.json");
    fs::write(&health_path, render_health(show, now)?).await?;

    info!(
        episodes = %episodes_path.display(),
        health = %health_path.display(),
        "Wrote static API"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(4 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, 8, 30, 0)
            .unwrap()
    }

    fn episode(day: u32) -> Episode {
        let date = format!("2026-10-{day:02}");
        Episode {
            id: date.clone(),
            title: format!("Boston Briefing – {date}"),
            audio_file: (day % 2 == 0).then(|| format!("boston-briefing-{date}.mp3")),
            audio_bytes: if day % 2 == 0 { 1000 } else { 0 },
            date,
            script: "Script".to_string(),
            sources: Vec::new(),
            generated_at: "2026-10-19T08:00:00-04:00".to_string(),
            duration_secs: 180,
        }
    }

    #[test]
    fn test_episodes_endpoint_lists_ten_newest() {
        let episodes: Vec<Episode> = (1..=12).rev().map(episode).collect();
        let body: Value = serde_json::from_str(&render_episodes("https://b.example.org", &episodes, now()).unwrap()).unwrap();

        assert_eq!(body["status"], "success");
        assert_eq!(body["total"], 12);
        assert_eq!(body["lastUpdated"], "2026-10-19T08:30:00-04:00");
        let listed = body["episodes"].as_array().unwrap();
        assert_eq!(listed.len(), RECENT_EPISODES);
        assert_eq!(listed[0]["id"], "2026-10-12");
        assert_eq!(
            listed[0]["audioURL"],
            "https://b.example.org/episodes/boston-briefing-2026-10-12.mp3"
        );
        assert_eq!(listed[1]["audioURL"], Value::Null);
        assert_eq!(listed[0]["generatedAt"], "2026-10-19T08:00:00-04:00");
    }

    #[tokio::test]
    async fn test_write_api_files() {
        let dir = tempfile::tempdir().unwrap();
        write_api(dir.path(), &ShowConfig::default(), "", &[episode(19)], now()).await.unwrap();

        let health: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("api/health.json")).unwrap()).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "Boston Briefing");
        assert!(dir.path().join("api/episodes.json").exists());
    }
}
