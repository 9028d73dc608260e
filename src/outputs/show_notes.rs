//! Show-notes page (`index.html`).
//!
//! The page leads with the newest episode (player, when audio exists, and the
//! list of stories with links to their sources) followed by an archive of
//! every episode in the manifest. All text is HTML-escaped.

use crate::config::ShowConfig;
use crate::models::Episode;
use crate::outputs::episodes::{EPISODES_DIR, episode_stem};
use crate::outputs::podcast::{FEED_FILE, public_url};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const INDEX_FILE: &str = "index.html";

fn write_latest(html: &mut String, show: &ShowConfig, base_url: &str, episode: &Episode) -> Result<(), Box<dyn Error>> {
    writeln!(html, "<section class=\"latest\">")?;
    writeln!(html, "  <h2>{}</h2>", text(&episode.title))?;
    if let (true, Some(audio_file)) = (episode.has_audio(), &episode.audio_file) {
        let src = public_url(base_url, &format!("{EPISODES_DIR}/{audio_file}"));
        writeln!(html, "  <audio controls preload=\"none\" src=\"{}\"></audio>", attr(&src))?;
    } else {
        writeln!(html, "  <p class=\"no-audio\">Audio is not available for this episode.</p>")?;
    }

    if episode.sources.is_empty() {
        writeln!(html, "  <p>No stories were available today.</p>")?;
    } else {
        writeln!(html, "  <h3>Stories</h3>")?;
        writeln!(html, "  <ol class=\"sources\">")?;
        for note in &episode.sources {
            writeln!(
                html,
                "    <li><strong>{}</strong>: {} <a href=\"{}\" rel=\"noopener\">Read more</a></li>",
                text(&note.source),
                text(&note.sentence),
                attr(&note.link)
            )?;
        }
        writeln!(html, "  </ol>")?;
    }

    let script = public_url(base_url, &format!("{EPISODES_DIR}/{}.txt", episode_stem(&show.slug, &episode.date)));
    writeln!(html, "  <p><a href=\"{}\">Read the script</a></p>", attr(&script))?;
    writeln!(html, "</section>")?;
    Ok(())
}

/// Render the full page.
pub fn render_index(show: &ShowConfig, base_url: &str, episodes: &[Episode]) -> Result<String, Box<dyn Error>> {
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"{}\">", attr(&show.language))?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\">")?;
    writeln!(html, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")?;
    writeln!(html, "<title>{}</title>", text(&show.title))?;
    writeln!(
        html,
        "<link rel=\"alternate\" type=\"application/rss+xml\" title=\"{}\" href=\"{}\">",
        attr(&show.title),
        attr(&public_url(base_url, FEED_FILE))
    )?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>{}</h1>", text(&show.title))?;
    writeln!(html, "<p class=\"description\">{}</p>", text(&show.description))?;

    match episodes.first() {
        Some(latest) => write_latest(&mut html, show, base_url, latest)?,
        None => writeln!(html, "<p>No episodes yet.</p>")?,
    }

    if episodes.len() > 1 {
        writeln!(html, "<section class=\"archive\">")?;
        writeln!(html, "  <h2>Archive</h2>")?;
        writeln!(html, "  <ul>")?;
        for episode in &episodes[1..] {
            let target = match (&episode.audio_file, episode.has_audio()) {
                (Some(audio_file), true) => format!("{EPISODES_DIR}/{audio_file}"),
                _ => format!("{EPISODES_DIR}/{}.txt", episode_stem(&show.slug, &episode.date)),
            };
            writeln!(
                html,
                "    <li><a href=\"{}\">{}</a></li>",
                attr(&public_url(base_url, &target)),
                text(&episode.title)
            )?;
        }
        writeln!(html, "  </ul>")?;
        writeln!(html, "</section>")?;
    }

    writeln!(
        html,
        "<footer><a href=\"{}\">Podcast feed</a></footer>",
        attr(&public_url(base_url, FEED_FILE))
    )?;
    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;
    Ok(html)
}

#[instrument(level = "info", skip_all, fields(episodes = episodes.len()))]
pub async fn write_index(
    output_dir: &Path,
    show: &ShowConfig,
    base_url: &str,
    episodes: &[Episode],
) -> Result<(), Box<dyn Error>> {
    let html = render_index(show, base_url, episodes)?;
    let path = output_dir.join(INDEX_FILE);
    fs::write(&path, html).await?;
    info!(path = %path.display(), "Wrote show notes page");
    Ok(())
}
