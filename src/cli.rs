//! Command-line interface definitions for the daily briefing.
//!
//! Secrets and the public URL are usually supplied through environment
//! variables; everything else has a sensible default.

use clap::Parser;

/// Command-line arguments for one briefing run.
///
/// # Examples
///
/// ```sh
/// # Defaults: config/briefing.yaml in, ./public out
/// daily_briefing
///
/// # Script and site only, no text-to-speech
/// daily_briefing --no-audio --output-dir /srv/briefing
///
/// # Fewer stories, custom voice settings
/// daily_briefing --max-items 5 --voice-settings ./voice.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the briefing YAML configuration
    #[arg(short, long, default_value = "config/briefing.yaml")]
    pub config: String,

    /// Directory the site, feed and episodes are written to
    #[arg(short, long, default_value = "public")]
    pub output_dir: String,

    /// Optional file replacing the default style prompt for the rewriter
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Voice settings JSON for text-to-speech (defaults are used if missing)
    #[arg(long, default_value = "voice_settings.json")]
    pub voice_settings: String,

    /// Override `max_items` from the configuration
    #[arg(short, long)]
    pub max_items: Option<usize>,

    /// Skip text-to-speech; episodes are published without audio
    #[arg(long)]
    pub no_audio: bool,

    /// Base URL the output directory is served from (defaults to the show link)
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// API key for the OpenAI-compatible rewriter endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// ElevenLabs API key
    #[arg(long, env = "ELEVEN_API_KEY", hide_env_values = true)]
    pub eleven_api_key: Option<String>,

    /// ElevenLabs voice id
    #[arg(long, env = "ELEVEN_VOICE_ID")]
    pub eleven_voice_id: Option<String>,
}
