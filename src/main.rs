use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lingua_coach::Config;
use lingua_coach::api::{ApiServer, ApiState};
use lingua_coach::providers::{OpenAiProvider, SpeechSynthesizer};
use lingua_coach::voice::{AudioClip, AudioSink, CpalSink, PLAYBACK_SAMPLE_RATE, chime, decode_mp3};

/// lingua - speech-practice server for graded language learning
#[derive(Parser)]
#[command(name = "lingua", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "LINGUA_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable device audio output (for headless servers)
    #[arg(long, env = "LINGUA_DISABLE_AUDIO")]
    disable_audio: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test speaker output with a tone
    TestSpeaker,
    /// Test synthesized speech output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech synthesizer.")]
        text: String,
    },
    /// Play the success chime
    TestChime,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,lingua_coach=info",
        1 => "info,lingua_coach=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::TestChime => test_chime().await,
            Command::Setup => lingua_coach::setup::run_setup(),
        };
    }

    let mut config = Config::load_with_options(cli.disable_audio)?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    tracing::info!(
        port = config.port,
        target = %config.provider.target_language,
        audio = config.audio_enabled,
        "starting practice server"
    );

    let state = ApiState::from_config(config)?;
    ApiServer::new(state).run().await?;

    Ok(())
}

/// Play a clip on the default device and wait for it to finish
async fn play_blocking(clip: AudioClip) -> anyhow::Result<()> {
    let sink = CpalSink::new()?;
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let handle = sink.play(
        Arc::new(clip),
        1.0,
        Box::new(move || {
            let _ = done_tx.send(());
        }),
    )?;
    done_rx.await.ok();
    drop(handle);
    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    play_blocking(AudioClip {
        samples,
        sample_rate: PLAYBACK_SAMPLE_RATE,
    })
    .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test synthesized speech end to end
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let provider = OpenAiProvider::new(config.provider)?;

    println!("Synthesizing speech...");
    let Some(mp3_data) = provider.synthesize(text).await? else {
        anyhow::bail!("synthesizer returned no audio");
    };
    println!("Got {} bytes of audio data", mp3_data.len());

    let clip = decode_mp3(&mp3_data)?;
    println!(
        "Decoded {} samples at {} Hz, playing...",
        clip.samples.len(),
        clip.sample_rate
    );

    play_blocking(clip).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Play the success chime
async fn test_chime() -> anyhow::Result<()> {
    println!("Playing the success chime...");
    play_blocking(chime()).await?;
    Ok(())
}
