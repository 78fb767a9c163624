//! Interactive first-run setup wizard (`lingua setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    AudioFileConfig, ConfigFile, PracticeFileConfig, ProviderFileConfig, ServerFileConfig,
};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or the config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("lingua-coach setup\n");

    // Load existing config if present
    let existing = crate::config::file::load_config_file();
    let config_path = crate::config::file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/lingua-coach/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Language pair
    let target_language: String = Input::new()
        .with_prompt("Language to practice")
        .default(
            existing
                .provider
                .target_language
                .unwrap_or_else(|| "English".to_string()),
        )
        .interact_text()?;

    let native_language: String = Input::new()
        .with_prompt("Your language (translations and feedback)")
        .default(
            existing
                .provider
                .native_language
                .unwrap_or_else(|| "Chinese".to_string()),
        )
        .interact_text()?;

    // 2. API key
    let existing_key = existing.provider.api_key.as_deref();
    let masked = existing_key.map(|k| {
        if k.len() > 8 {
            format!("{}...{}", &k[..4], &k[k.len() - 4..])
        } else {
            "****".to_string()
        }
    });

    let prompt = masked.as_ref().map_or_else(
        || "OpenAI API key (OPENAI_API_KEY)".to_string(),
        |m| format!("OpenAI API key (current: {m}, leave blank to keep)"),
    );

    let api_key_input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;

    let api_key = if api_key_input.is_empty() {
        existing_key.map(str::to_string)
    } else {
        Some(api_key_input)
    };

    // 3. Chat model
    let chat_model: String = Input::new()
        .with_prompt("Chat model (generation and critique)")
        .default(
            existing
                .provider
                .chat_model
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
        )
        .interact_text()?;

    // 4. Voice
    let voices = ["alloy", "echo", "fable", "nova", "onyx", "shimmer"];
    let default_voice = existing
        .provider
        .tts_voice
        .as_deref()
        .and_then(|v| voices.iter().position(|&l| l == v))
        .unwrap_or(0);

    let voice_idx = Select::new()
        .with_prompt("Synthesized voice")
        .items(&voices)
        .default(default_voice)
        .interact()?;
    let tts_voice = voices[voice_idx].to_string();

    // 5. Device audio
    let audio_default = existing.audio.enabled.unwrap_or(true);
    let audio_enabled = Confirm::new()
        .with_prompt("Enable device audio output?")
        .default(audio_default)
        .interact()?;

    // 6. Build and write config
    let config_file = ConfigFile {
        provider: ProviderFileConfig {
            base_url: existing.provider.base_url,
            api_key,
            chat_model: Some(chat_model),
            tts_model: existing.provider.tts_model,
            tts_voice: Some(tts_voice),
            image_model: existing.provider.image_model,
            target_language: Some(target_language),
            native_language: Some(native_language),
        },
        practice: PracticeFileConfig {
            autoplay_delay_ms: existing.practice.autoplay_delay_ms,
            playback_rate: existing.practice.playback_rate,
            audio_cache_size: existing.practice.audio_cache_size,
        },
        server: ServerFileConfig {
            port: existing.server.port,
        },
        audio: AudioFileConfig {
            enabled: Some(audio_enabled),
        },
    };

    write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `lingua -v` to start the practice server.");

    Ok(())
}

/// Serialize and write the config file
fn write_config(path: &PathBuf, config: &ConfigFile) -> anyhow::Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = serialize_config(config);
    std::fs::write(path, toml)?;

    Ok(())
}

/// Serialize config to a readable TOML string
fn serialize_config(config: &ConfigFile) -> String {
    let mut out = String::new();

    // [provider]
    let p = &config.provider;
    out.push_str("[provider]\n");
    for (key, val) in [
        ("base_url", &p.base_url),
        ("api_key", &p.api_key),
        ("chat_model", &p.chat_model),
        ("tts_model", &p.tts_model),
        ("tts_voice", &p.tts_voice),
        ("image_model", &p.image_model),
        ("target_language", &p.target_language),
        ("native_language", &p.native_language),
    ] {
        if let Some(v) = val {
            out.push_str(&format!("{key} = \"{v}\"\n"));
        }
    }
    out.push('\n');

    // [practice]
    let pr = &config.practice;
    if pr.autoplay_delay_ms.is_some() || pr.playback_rate.is_some() || pr.audio_cache_size.is_some()
    {
        out.push_str("[practice]\n");
        if let Some(ms) = pr.autoplay_delay_ms {
            out.push_str(&format!("autoplay_delay_ms = {ms}\n"));
        }
        if let Some(rate) = pr.playback_rate {
            out.push_str(&format!("playback_rate = {rate}\n"));
        }
        if let Some(size) = pr.audio_cache_size {
            out.push_str(&format!("audio_cache_size = {size}\n"));
        }
        out.push('\n');
    }

    // [server]
    if let Some(port) = config.server.port {
        out.push_str("[server]\n");
        out.push_str(&format!("port = {port}\n\n"));
    }

    // [audio]
    if let Some(enabled) = config.audio.enabled {
        out.push_str("[audio]\n");
        out.push_str(&format!("enabled = {enabled}\n"));
    }

    out
}
