//! Speech synthesis through the ElevenLabs text-to-speech API.
//!
//! Synthesis is best effort: a missing key, an HTTP error or a timeout means
//! "no audio" and publication continues without an enclosure.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::{info, instrument, warn};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Per-voice tuning sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.85,
            similarity_boost: 0.90,
            style: 0.15,
            use_speaker_boost: true,
        }
    }
}

/// Model and voice parameters, usually read from `voice_settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub model_id: String,
    pub voice_settings: VoiceSettings,
    pub voice_speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model_id: "eleven_multilingual_v2".to_string(),
            voice_settings: VoiceSettings::default(),
            voice_speed: 1.0,
        }
    }
}

/// Read voice settings from a JSON file, falling back to the defaults when
/// the file is missing or invalid.
pub async fn load_voice_config(path: &Path) -> VoiceConfig {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(_) => {
            info!(path = %path.display(), "No voice settings file; using defaults");
            return VoiceConfig::default();
        }
    };
    match serde_json::from_str::<VoiceConfig>(&raw) {
        Ok(config) => {
            info!(path = %path.display(), model = %config.model_id, "Loaded voice settings");
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid voice settings; using defaults");
            VoiceConfig::default()
        }
    }
}

/// Anything that can turn a script into audio bytes. `None` means "no audio".
pub trait SpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
    voice_speed: f32,
}

/// ElevenLabs client for one voice.
#[derive(Debug, Clone)]
pub struct ElevenLabs {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    voice_id: Option<String>,
    voice: VoiceConfig,
}

impl ElevenLabs {
    /// The client should carry a long timeout; synthesis of a full script
    /// regularly takes over a minute.
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        voice_id: Option<String>,
        voice: VoiceConfig,
    ) -> Self {
        Self {
            http,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            voice_id: voice_id.filter(|v| !v.trim().is_empty()),
            voice,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl SpeechSynthesizer for ElevenLabs {
    #[instrument(level = "info", skip_all, fields(chars = text.len()))]
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        let (Some(api_key), Some(voice_id)) = (&self.api_key, &self.voice_id) else {
            warn!("Skipping speech synthesis; API key or voice id missing");
            return None;
        };
        if text.trim().is_empty() {
            warn!("Skipping speech synthesis; empty script");
            return None;
        }

        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={OUTPUT_FORMAT}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(voice_id)
        );
        let payload = SpeechRequest {
            text,
            model_id: &self.voice.model_id,
            voice_settings: &self.voice.voice_settings,
            voice_speed: self.voice.voice_speed,
        };

        let t0 = Instant::now();
        let response = match self
            .http
            .post(&url)
            .header("xi-api-key", api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "Speech request failed");
                return None;
            }
        };

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %crate::utils::truncate_for_log(&body, 300), "Speech API error");
            return None;
        }

        match response.bytes().await {
            Ok(audio) if !audio.is_empty() => {
                info!(
                    bytes = audio.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Speech synthesized"
                );
                Some(audio.to_vec())
            }
            Ok(_) => {
                warn!("Speech API returned no audio");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read speech audio");
                None
            }
        }
    }
}
