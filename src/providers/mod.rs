//! External collaborator contracts
//!
//! The practice engine consumes four external services through narrow async
//! contracts: course generation, speech synthesis, level illustration, and
//! pronunciation critique. All are opaque; failures are non-fatal to the
//! session and handled by the callers' fallback policies.

pub mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::course::{CourseInput, Evaluation, Level};

/// Reference to a generated illustration for a level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelImage {
    /// URL or data URL the front-end can render directly
    pub url: String,
}

/// Expands user seed material into a sequence of graded levels
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate the ordered level list for a course
    ///
    /// # Errors
    ///
    /// Returns a generation error on service failure or malformed output.
    /// Callers surface this as retryable and stay on the pre-generation
    /// screen.
    async fn generate(&self, input: &CourseInput) -> Result<Vec<Level>>;
}

/// Synthesizes speech for a level sentence
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` to encoded audio (MP3)
    ///
    /// `Ok(None)` signals "no synthesized voice available, fall back to
    /// local synthesis".
    ///
    /// # Errors
    ///
    /// Returns a synthesis error on service failure; callers fall back
    /// rather than blocking practice.
    async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>>;
}

/// Generates an illustration for a level sentence
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `text`
    ///
    /// `Ok(None)` means no image is available for this level; the UI
    /// degrades to a placeholder.
    ///
    /// # Errors
    ///
    /// Returns an illustration error on service failure.
    async fn illustrate(&self, text: &str) -> Result<Option<LevelImage>>;
}

/// Produces a pronunciation critique for a recorded attempt
#[async_trait]
pub trait PronunciationCritic: Send + Sync {
    /// Compare `transcript` against `target` and return feedback with
    /// per-word phonetic error annotations
    ///
    /// Must tolerate empty or garbled transcripts without panicking.
    ///
    /// # Errors
    ///
    /// Returns a critique error on service failure; the level's history is
    /// left untouched so a retry is possible.
    async fn critique(&self, target: &str, transcript: &str) -> Result<Evaluation>;
}
