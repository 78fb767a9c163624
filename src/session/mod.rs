//! Practice-session core
//!
//! The session owns all mutable state and processes exactly one user action
//! or one internal signal at a time. Spawned work (synthesis, illustration,
//! critique, timers, playback completion) communicates back exclusively
//! through [`SessionSignal`]s; recognition engines emit
//! [`crate::voice::RecognitionEvent`]s on their own channel.

mod cache;
mod capture;
mod controller;
mod evaluation;
mod playback;
mod progress;

pub use cache::{DEFAULT_AUDIO_CACHE_SIZE, MediaCache};
pub use capture::{CaptureController, CaptureOutcome, CaptureState};
pub use controller::{PracticeSession, SessionConfig, SessionView, WordDetail};
pub use evaluation::EvaluationPipeline;
pub use playback::{PlaybackController, PlaybackState};
pub use progress::{AdvanceOutcome, ProgressTracker};

use crate::course::Evaluation;
use crate::providers::LevelImage;

/// Internal signal delivered to the session's owner task
#[derive(Debug)]
pub enum SessionSignal {
    /// A playback stream finished or was stopped; `seq` identifies which
    PlaybackFinished { seq: u64 },
    /// A critique resolved for the level that was active at submission time
    Evaluated {
        index: usize,
        evaluation: Evaluation,
    },
    /// A critique call failed; history is left untouched
    EvaluationFailed { index: usize, message: String },
    /// The delayed autoplay timer for a level fired
    AutoPlay { index: usize },
    /// The current level's illustration resolved
    ImageReady {
        index: usize,
        image: Option<LevelImage>,
    },
}
