//! Configuration management for lingua-coach
//!
//! Layered: environment variables override the TOML file, which overlays the
//! built-in defaults.

pub mod file;

use std::time::Duration;

use crate::providers::openai::OpenAiSettings;
use crate::session::{DEFAULT_AUDIO_CACHE_SIZE, SessionConfig};
use crate::{Error, Result};

/// Default API server port
pub const DEFAULT_PORT: u16 = 8930;

/// Practice engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// External provider settings
    pub provider: OpenAiSettings,

    /// Delay before a level's sentence auto-plays
    pub autoplay_delay: Duration,

    /// Playback-rate multiplier for level audio
    pub playback_rate: f64,

    /// Distinct texts kept in the decoded-audio cache
    pub audio_cache_size: usize,

    /// API server port
    pub port: u16,

    /// Whether device audio output is enabled
    pub audio_enabled: bool,
}

impl Config {
    /// Load configuration (env > TOML file > defaults)
    ///
    /// # Errors
    ///
    /// Returns error on malformed values (unparseable base URL, playback
    /// rate out of range).
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with an explicit audio disable option
    ///
    /// # Errors
    ///
    /// Returns error on malformed values.
    pub fn load_with_options(disable_audio: bool) -> Result<Self> {
        let fc = file::load_config_file();

        let base_url = std::env::var("LINGUA_API_BASE_URL")
            .ok()
            .or(fc.provider.base_url)
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        url::Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("invalid API base URL {base_url:?}: {e}")))?;

        let provider = OpenAiSettings {
            base_url,
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .or(fc.provider.api_key)
                .unwrap_or_default(),
            chat_model: std::env::var("LINGUA_CHAT_MODEL")
                .ok()
                .or(fc.provider.chat_model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            tts_model: std::env::var("LINGUA_TTS_MODEL")
                .ok()
                .or(fc.provider.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: std::env::var("LINGUA_TTS_VOICE")
                .ok()
                .or(fc.provider.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            image_model: std::env::var("LINGUA_IMAGE_MODEL")
                .ok()
                .or(fc.provider.image_model)
                .unwrap_or_else(|| "dall-e-3".to_string()),
            target_language: std::env::var("LINGUA_TARGET_LANGUAGE")
                .ok()
                .or(fc.provider.target_language)
                .unwrap_or_else(|| "English".to_string()),
            native_language: std::env::var("LINGUA_NATIVE_LANGUAGE")
                .ok()
                .or(fc.provider.native_language)
                .unwrap_or_else(|| "Chinese".to_string()),
        };

        let autoplay_delay_ms = std::env::var("LINGUA_AUTOPLAY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.practice.autoplay_delay_ms)
            .unwrap_or(600);

        let playback_rate = std::env::var("LINGUA_PLAYBACK_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.practice.playback_rate)
            .unwrap_or(1.0);
        if !(0.25..=4.0).contains(&playback_rate) {
            return Err(Error::Config(format!(
                "playback rate {playback_rate} outside 0.25..=4.0"
            )));
        }

        let audio_cache_size = fc
            .practice
            .audio_cache_size
            .unwrap_or(DEFAULT_AUDIO_CACHE_SIZE);

        let port = std::env::var("LINGUA_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let audio_enabled = if disable_audio {
            tracing::info!("device audio explicitly disabled");
            false
        } else {
            fc.audio.enabled.unwrap_or(true)
        };

        Ok(Self {
            provider,
            autoplay_delay: Duration::from_millis(autoplay_delay_ms),
            playback_rate,
            audio_cache_size,
            port,
            audio_enabled,
        })
    }

    /// Session tuning derived from this configuration
    #[must_use]
    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            autoplay_delay: self.autoplay_delay,
            playback_rate: self.playback_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_carries_tuning() {
        let config = Config {
            provider: OpenAiSettings {
                base_url: "https://api.openai.com".to_string(),
                api_key: "k".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                tts_model: "tts-1".to_string(),
                tts_voice: "alloy".to_string(),
                image_model: "dall-e-3".to_string(),
                target_language: "English".to_string(),
                native_language: "Spanish".to_string(),
            },
            autoplay_delay: Duration::from_millis(250),
            playback_rate: 0.75,
            audio_cache_size: 16,
            port: DEFAULT_PORT,
            audio_enabled: true,
        };

        let session = config.session_config();
        assert_eq!(session.autoplay_delay, Duration::from_millis(250));
        assert!((session.playback_rate - 0.75).abs() < f64::EPSILON);
    }
}
