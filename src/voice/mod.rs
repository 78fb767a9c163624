//! Platform audio and speech-recognition seams
//!
//! Audio output, the offline fallback synthesizer, and the recognition
//! engine contract. The session layer (see `session`) never touches cpal or
//! process spawning directly; it speaks to these seams only.

mod fallback;
mod playback;
mod recognition;

pub use fallback::{FallbackSynth, LocalSynth};
pub use playback::{
    AudioClip, AudioSink, CpalSink, NullSink, PLAYBACK_SAMPLE_RATE, PlaybackHandle, chime,
    decode_mp3,
};
pub use recognition::{CaptureCommand, ChannelRecognition, RecognitionEngine, RecognitionEvent};
