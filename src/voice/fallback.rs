//! Offline fallback speech synthesis
//!
//! When the remote synthesizer fails or returns no audio, practice must not
//! block: a local engine renders the sentence at lower fidelity. Uses
//! `espeak-ng`/`espeak` (WAV on stdout) or macOS `say` when present.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::voice::AudioClip;
use crate::{Error, Result};

/// Offline synthesis seam used when the remote synthesizer yields nothing
///
/// Implementations are blocking; async callers go through `spawn_blocking`.
pub trait FallbackSynth: Send + Sync {
    /// Whether the engine can render anything at all
    fn available(&self) -> bool;

    /// Render `text` to a clip
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails or no engine is available
    fn render(&self, text: &str) -> Result<AudioClip>;
}

/// Local text-to-speech engine resolved from binaries on PATH
pub struct LocalSynth {
    engine: Option<SynthBinary>,
}

/// A usable synthesis binary and how to invoke it
#[derive(Debug, Clone)]
enum SynthBinary {
    Espeak(PathBuf),
    Say(PathBuf),
}

impl LocalSynth {
    /// Probe PATH for a usable synthesis binary
    #[must_use]
    pub fn discover() -> Self {
        let engine = which::which("espeak-ng")
            .or_else(|_| which::which("espeak"))
            .map(SynthBinary::Espeak)
            .or_else(|_| which::which("say").map(SynthBinary::Say))
            .ok();

        match &engine {
            Some(SynthBinary::Espeak(path) | SynthBinary::Say(path)) => {
                tracing::debug!(binary = %path.display(), "local synthesizer available");
            }
            None => {
                tracing::warn!("no local synthesizer found (espeak-ng/espeak/say)");
            }
        }

        Self { engine }
    }
}

impl FallbackSynth for LocalSynth {
    fn available(&self) -> bool {
        self.engine.is_some()
    }

    fn render(&self, text: &str) -> Result<AudioClip> {
        let Some(engine) = &self.engine else {
            return Err(Error::Synthesis(
                "no local synthesizer available".to_string(),
            ));
        };

        let wav = match engine {
            SynthBinary::Espeak(path) => render_espeak(path, text)?,
            SynthBinary::Say(path) => render_say(path, text)?,
        };

        decode_wav(&wav)
    }
}

/// espeak writes a WAV stream to stdout with `--stdout`
fn render_espeak(binary: &Path, text: &str) -> Result<Vec<u8>> {
    let output = Command::new(binary)
        .arg("--stdout")
        .arg(text)
        .output()
        .map_err(|e| Error::Synthesis(format!("espeak failed to run: {e}")))?;

    if !output.status.success() {
        return Err(Error::Synthesis(format!(
            "espeak exited with {}",
            output.status
        )));
    }

    Ok(output.stdout)
}

/// macOS `say` only writes to a file; use a temp path and read it back
fn render_say(binary: &Path, text: &str) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fallback.wav");

    let status = Command::new(binary)
        .arg("-o")
        .arg(&path)
        .arg("--data-format=LEI16@22050")
        .arg("--file-format=WAVE")
        .arg(text)
        .status()
        .map_err(|e| Error::Synthesis(format!("say failed to run: {e}")))?;

    if !status.success() {
        return Err(Error::Synthesis(format!("say exited with {status}")));
    }

    Ok(std::fs::read(&path)?)
}

/// Decode a WAV payload into a mono clip
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav: &[u8]) -> Result<AudioClip> {
    let mut reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| Error::Synthesis(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .filter_map(std::result::Result::ok)
                .map(|s| f32::from(s) / max)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .filter_map(std::result::Result::ok)
            .collect(),
    };

    if samples.is_empty() {
        return Err(Error::Synthesis("WAV payload had no samples".to_string()));
    }

    // Downmix interleaved channels to mono
    let channels = usize::from(spec.channels.max(1));
    let samples = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    Ok(AudioClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}
