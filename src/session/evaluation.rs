//! Asynchronous pronunciation critique submission
//!
//! Critique calls run as spawned tasks and report back through session
//! signals. The level index is captured at submission time; whether the
//! result still applies is decided where the signal is handled, against the
//! index active at resolution time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::SessionSignal;
use crate::providers::PronunciationCritic;

/// Submits completed transcripts to the critique collaborator
pub struct EvaluationPipeline {
    critic: Arc<dyn PronunciationCritic>,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl EvaluationPipeline {
    /// Create a pipeline reporting into `signals`
    #[must_use]
    pub fn new(
        critic: Arc<dyn PronunciationCritic>,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        Self { critic, signals }
    }

    /// Submit a transcript for the level at `index`
    ///
    /// Returns `None` without calling the collaborator when the transcript
    /// is empty after trimming. A failed call leaves the level's history
    /// untouched so a retry is possible.
    pub fn submit(&self, index: usize, target: &str, transcript: &str) -> Option<JoinHandle<()>> {
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            tracing::debug!(index, "empty transcript, critique skipped");
            return None;
        }

        let critic = Arc::clone(&self.critic);
        let signals = self.signals.clone();
        let target = target.to_string();

        Some(tokio::spawn(async move {
            match critic.critique(&target, &transcript).await {
                Ok(evaluation) => {
                    let _ = signals.send(SessionSignal::Evaluated { index, evaluation });
                }
                Err(e) => {
                    tracing::warn!(index, error = %e, "critique failed");
                    let _ = signals.send(SessionSignal::EvaluationFailed {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }))
    }
}
