//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Decoded audio ready for playback
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Mono f32 samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Clip duration in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }
}

/// Handle to an active playback stream
///
/// Dropping the handle does not stop playback; call [`PlaybackHandle::stop`].
/// Stopping is idempotent and usable from any state.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    stop: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Create a handle around a stop flag
    #[must_use]
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }

    /// Request the stream stop as soon as possible
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether stop has been requested
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Audio output seam: one clip in, one completion callback out
///
/// `on_done` fires exactly once, when the clip finishes or the handle is
/// stopped. Implementations must not block the caller for the duration of
/// the clip.
pub trait AudioSink: Send + Sync {
    /// Start playing `clip` at the given playback-rate multiplier
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    fn play(
        &self,
        clip: Arc<AudioClip>,
        rate: f64,
        on_done: Box<dyn FnOnce() + Send>,
    ) -> Result<PlaybackHandle>;
}

/// Plays audio to the default output device
pub struct CpalSink {
    config: StreamConfig,
}

impl CpalSink {
    /// Create a new playback sink
    ///
    /// # Errors
    ///
    /// Returns error if no output device or suitable config is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { config })
    }
}

impl AudioSink for CpalSink {
    fn play(
        &self,
        clip: Arc<AudioClip>,
        rate: f64,
        on_done: Box<dyn FnOnce() + Send>,
    ) -> Result<PlaybackHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = PlaybackHandle::new(Arc::clone(&stop));
        let config = self.config.clone();

        // cpal streams are not Send; the stream lives on a dedicated thread
        // that owns it until completion or stop
        std::thread::spawn(move || {
            if let Err(e) = run_stream(&clip, rate, &config, &stop) {
                tracing::warn!(error = %e, "playback stream failed");
            }
            on_done();
        });

        Ok(handle)
    }
}

/// Sink for headless hosts: completes every clip immediately, no device
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(
        &self,
        clip: Arc<AudioClip>,
        _rate: f64,
        on_done: Box<dyn FnOnce() + Send>,
    ) -> Result<PlaybackHandle> {
        tracing::trace!(ms = clip.duration_ms(), "null sink swallowed clip");
        on_done();
        Ok(PlaybackHandle::new(Arc::new(AtomicBool::new(false))))
    }
}

/// Open the output stream and block until the clip finishes or stop is set
fn run_stream(
    clip: &AudioClip,
    rate: f64,
    config: &StreamConfig,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    // The device rate is fixed; the playback-rate multiplier is applied by
    // resampling the clip before output
    let ratio = f64::from(PLAYBACK_SAMPLE_RATE) / (f64::from(clip.sample_rate) * rate);
    let samples = resample(&clip.samples, ratio)?;
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let channels = config.channels as usize;
    let sample_count = samples.len();

    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(AtomicBool::new(false));

    let samples = Arc::new(samples);
    let samples_cb = Arc::clone(&samples);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position_cb.lock().unwrap();

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples_cb.len() {
                        samples_cb[*pos]
                    } else {
                        finished_cb.store(true, Ordering::SeqCst);
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples_cb.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    if !stop.load(Ordering::SeqCst) {
        // Let the device drain the tail
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Resample mono samples by `ratio` (output length ≈ input length × ratio)
fn resample(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if samples.is_empty() || (ratio - 1.0).abs() < 1e-6 {
        return Ok(samples.to_vec());
    }

    const CHUNK: usize = 1024;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 8.0, params, CHUNK, 1)
        .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let mut out = Vec::with_capacity((samples.len() as f64 * ratio) as usize + CHUNK);
    let mut pos = 0;

    while pos + CHUNK <= samples.len() {
        let chunk = vec![samples[pos..pos + CHUNK].to_vec()];
        let frames = resampler
            .process(&chunk, None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        out.extend_from_slice(&frames[0]);
        pos += CHUNK;
    }

    if pos < samples.len() {
        let rest = vec![samples[pos..].to_vec()];
        let frames = resampler
            .process_partial(Some(&rest), None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        out.extend_from_slice(&frames[0]);
    }

    Ok(out)
}

/// Decode MP3 bytes to an [`AudioClip`]
///
/// # Errors
///
/// Returns error if the payload is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<AudioClip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate.max(1) as u32;
                }

                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    // Mono
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(Error::Audio("MP3 payload decoded to no samples".to_string()));
    }

    Ok(AudioClip {
        samples,
        sample_rate,
    })
}

/// Short two-tone success chime played before advancing to the next level
#[must_use]
pub fn chime() -> AudioClip {
    const TONES: [(f32, f32); 2] = [(660.0, 0.12), (880.0, 0.16)];
    const AMPLITUDE: f32 = 0.25;

    let mut samples = Vec::new();
    for (frequency, duration_secs) in TONES {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

        #[allow(clippy::cast_precision_loss)]
        samples.extend((0..num_samples).map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            // Linear fade-out keeps the tone from clicking at the boundary
            let envelope = 1.0 - i as f32 / num_samples as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * AMPLITUDE * envelope
        }));
    }

    AudioClip {
        samples,
        sample_rate: PLAYBACK_SAMPLE_RATE,
    }
}
