//! TOML configuration file loading
//!
//! Supports `~/.config/lingua-coach/config.toml` as a persistent config
//! source. All fields are optional — the file is a partial overlay on top of
//! defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// External provider configuration
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Practice tuning
    #[serde(default)]
    pub practice: PracticeFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Audio output configuration
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// External provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// API base URL (e.g. `https://api.openai.com`)
    pub base_url: Option<String>,

    /// API key (`OPENAI_API_KEY` env takes precedence)
    pub api_key: Option<String>,

    /// Chat model for generation and critique (e.g. `gpt-4o-mini`)
    pub chat_model: Option<String>,

    /// TTS model (e.g. `tts-1`)
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. `alloy`)
    pub tts_voice: Option<String>,

    /// Image model (e.g. `dall-e-3`)
    pub image_model: Option<String>,

    /// Language being learned
    pub target_language: Option<String>,

    /// Language for translations and feedback
    pub native_language: Option<String>,
}

/// Practice tuning
#[derive(Debug, Default, Deserialize)]
pub struct PracticeFileConfig {
    /// Delay before a level's sentence auto-plays, in milliseconds
    pub autoplay_delay_ms: Option<u64>,

    /// Playback-rate multiplier (0.25 to 4.0)
    pub playback_rate: Option<f64>,

    /// Distinct texts kept in the decoded-audio cache
    pub audio_cache_size: Option<usize>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Audio output configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Enable device audio output (disable on headless servers)
    pub enabled: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from an explicit path
pub fn load_config_from(path: &PathBuf) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lingua-coach/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lingua-coach").join("config.toml"))
}
