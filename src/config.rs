//! Configuration management
//!
//! Precedence: environment > config file > default. The config file lives
//! at `~/.config/bloom/config.toml` (platform equivalent elsewhere).

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;
use crate::session::UserContext;

/// Default inference gateway URL
const DEFAULT_GATEWAY_URL: &str = "http://localhost:6000";

/// Default model for reply generation
const DEFAULT_TEXT_MODEL: &str = "llama-3.1-8b-instant";

/// Default model for speech synthesis
const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Default model for speech recognition
const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Default voice for synthesized replies
const DEFAULT_VOICE: &str = "Algenib";

/// Companion configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Inference gateway configuration
    pub gateway: GatewayConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Wellness snapshot attached to generation requests
    pub context: Option<UserContext>,
}

/// Inference gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the `OpenAI`-compatible inference gateway
    pub base_url: String,

    /// Bearer token for the gateway, if it requires one
    pub api_key: Option<String>,

    /// Model id for reply generation
    pub text_model: String,

    /// Model id for speech synthesis
    pub tts_model: String,

    /// Model id for speech recognition
    pub stt_model: String,
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input and spoken replies
    pub enabled: bool,

    /// Voice used for synthesized replies
    pub voice: String,
}

/// On-disk config file layout
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    gateway: FileGateway,
    #[serde(default)]
    voice: FileVoice,
    context: Option<FileContext>,
}

#[derive(Debug, Default, Deserialize)]
struct FileGateway {
    base_url: Option<String>,
    api_key: Option<String>,
    text_model: Option<String>,
    tts_model: Option<String>,
    stt_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileVoice {
    enabled: Option<bool>,
    voice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileContext {
    mood: String,
    sleep_hours: f32,
    steps: u32,
    name: Option<String>,
}

impl Config {
    /// Load configuration
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with an explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed.
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = load_config_file()?;

        let gateway = GatewayConfig {
            base_url: std::env::var("BLOOM_GATEWAY_URL")
                .ok()
                .or(fc.gateway.base_url)
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            api_key: std::env::var("BLOOM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .or(fc.gateway.api_key),
            text_model: std::env::var("BLOOM_TEXT_MODEL")
                .ok()
                .or(fc.gateway.text_model)
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            tts_model: std::env::var("BLOOM_TTS_MODEL")
                .ok()
                .or(fc.gateway.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            stt_model: std::env::var("BLOOM_STT_MODEL")
                .ok()
                .or(fc.gateway.stt_model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
        };

        let enabled = if disable_voice {
            tracing::info!("voice explicitly disabled");
            false
        } else {
            fc.voice.enabled.unwrap_or(true)
        };
        let voice = VoiceConfig {
            enabled,
            voice: std::env::var("BLOOM_TTS_VOICE")
                .ok()
                .or(fc.voice.voice)
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        };

        let context = fc.context.map(|c| UserContext {
            mood: c.mood,
            sleep_hours: c.sleep_hours,
            steps: c.steps,
            name: c.name,
        });

        Ok(Self {
            gateway,
            voice,
            context,
        })
    }
}

/// Path to the config file
fn config_file_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/bloom/config.toml"),
        |d| d.config_dir().join("bloom").join("config.toml"),
    )
}

fn load_config_file() -> Result<FileConfig> {
    let path = config_file_path();
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let raw = std::fs::read_to_string(&path)?;
    let fc = toml::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(fc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_parses_all_sections() {
        let raw = r#"
            [gateway]
            base_url = "http://gateway.local:9000"
            text_model = "sonnet"

            [voice]
            enabled = false
            voice = "Kore"

            [context]
            mood = "calm"
            sleep_hours = 7.5
            steps = 4200
            name = "Jo"
        "#;

        let fc: FileConfig = toml::from_str(raw).unwrap();
        assert_eq!(fc.gateway.base_url.as_deref(), Some("http://gateway.local:9000"));
        assert_eq!(fc.gateway.text_model.as_deref(), Some("sonnet"));
        assert!(fc.gateway.api_key.is_none());
        assert_eq!(fc.voice.enabled, Some(false));
        assert_eq!(fc.voice.voice.as_deref(), Some("Kore"));

        let ctx = fc.context.unwrap();
        assert_eq!(ctx.mood, "calm");
        assert_eq!(ctx.steps, 4200);
        assert_eq!(ctx.name.as_deref(), Some("Jo"));
    }

    #[test]
    fn file_config_sections_are_optional() {
        let fc: FileConfig = toml::from_str("").unwrap();
        assert!(fc.gateway.base_url.is_none());
        assert!(fc.voice.enabled.is_none());
        assert!(fc.context.is_none());
    }
}
