//! Capture state machine for continuous speech recognition
//!
//! `Idle → Listening → (Restarting ⇄ Listening)* → Idle`. The underlying
//! engine may end a run on its own silence timeout; unless the user asked
//! for the stop, the finalized text is banked and the engine restarted, so
//! listening is effectively unbounded. Only a user-initiated stop
//! finalizes a transcript.

use crate::voice::{RecognitionEngine, RecognitionEvent};
use crate::{Error, Result};

/// Capture lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
    /// Between an engine-imposed stop and the restarted run
    Restarting,
}

/// Outcome surfaced to the session from a capture event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// User stopped and the trimmed transcript was non-empty
    Completed { transcript: String },
    /// Permission denied: capture is disabled until session reset
    Disabled,
    /// Transient failure that ended the listening loop (restart failed)
    Failed { message: String },
}

/// Drives one recognition engine and accumulates its transcript
pub struct CaptureController {
    state: CaptureState,
    engine: Box<dyn RecognitionEngine>,
    user_stopped: bool,
    disabled: bool,
    /// Finalized text banked across engine restarts
    segments: Vec<String>,
    /// Finalized text of the current engine run
    live_final: String,
    /// Interim fragment; replaced by each partial event
    interim: String,
}

impl CaptureController {
    /// Create an idle controller around `engine`
    #[must_use]
    pub fn new(engine: Box<dyn RecognitionEngine>) -> Self {
        Self {
            state: CaptureState::Idle,
            engine,
            user_stopped: false,
            disabled: false,
            segments: Vec::new(),
            live_final: String::new(),
            interim: String::new(),
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether a capture is in progress
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, CaptureState::Idle)
    }

    /// Whether capture was disabled by a permission denial
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Best current guess at the transcript while listening
    #[must_use]
    pub fn preview(&self) -> String {
        let mut parts: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        if !self.live_final.is_empty() {
            parts.push(&self.live_final);
        }
        if !self.interim.is_empty() {
            parts.push(&self.interim);
        }
        parts.join(" ").trim().to_string()
    }

    /// Begin a capture
    ///
    /// Clears all buffers and the user-stopped flag. No-op if already
    /// listening.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureUnsupported`] when the platform lacks a
    /// recognition facility, [`Error::PermissionDenied`] when a prior
    /// denial disabled capture, or a capture error if the engine fails to
    /// start.
    pub fn start(&mut self) -> Result<()> {
        if self.disabled {
            return Err(Error::PermissionDenied);
        }
        if !self.engine.supported() {
            return Err(Error::CaptureUnsupported(
                "no speech-recognition facility on this platform".to_string(),
            ));
        }
        if self.is_active() {
            return Ok(());
        }

        self.clear_buffers();
        self.user_stopped = false;
        self.engine.start()?;
        self.state = CaptureState::Listening;
        tracing::debug!("capture started");
        Ok(())
    }

    /// User-initiated stop; the only path that finalizes a transcript
    pub fn stop(&mut self) {
        if !self.is_active() {
            return;
        }
        self.user_stopped = true;
        self.engine.stop();
    }

    /// Unconditional teardown for level switches
    ///
    /// Sets the user-stopped flag *before* stopping the engine so a
    /// concurrent `Ended` event cannot trigger the restart path, then
    /// discards every buffer. Emits nothing.
    pub fn abort(&mut self) {
        self.user_stopped = true;
        if self.is_active() {
            self.engine.stop();
        }
        self.clear_buffers();
        self.state = CaptureState::Idle;
    }

    /// Feed one engine event through the state machine
    ///
    /// Events arriving while `Idle` (late events after an abort) are
    /// discarded.
    pub fn handle_event(&mut self, event: RecognitionEvent) -> Option<CaptureOutcome> {
        if !self.is_active() {
            tracing::trace!(?event, "recognition event ignored while idle");
            return None;
        }

        match event {
            RecognitionEvent::Partial { text } => {
                self.interim = text;
                None
            }
            RecognitionEvent::Final { text } => {
                if !self.live_final.is_empty() {
                    self.live_final.push(' ');
                }
                self.live_final.push_str(&text);
                self.interim.clear();
                None
            }
            RecognitionEvent::Error { message } => {
                // Transient; the listening loop continues
                tracing::debug!(message, "transient recognition error");
                None
            }
            RecognitionEvent::PermissionDenied => {
                self.disabled = true;
                self.engine.stop();
                self.clear_buffers();
                self.state = CaptureState::Idle;
                tracing::warn!("microphone permission denied, capture disabled");
                Some(CaptureOutcome::Disabled)
            }
            RecognitionEvent::Ended => {
                if self.user_stopped {
                    self.finalize()
                } else {
                    self.restart()
                }
            }
        }
    }

    /// Engine stopped on its own; bank the run and keep listening
    fn restart(&mut self) -> Option<CaptureOutcome> {
        let run = std::mem::take(&mut self.live_final);
        if !run.trim().is_empty() {
            self.segments.push(run.trim().to_string());
        }
        self.interim.clear();
        self.state = CaptureState::Restarting;

        match self.engine.start() {
            Ok(()) => {
                self.state = CaptureState::Listening;
                tracing::debug!(segments = self.segments.len(), "capture restarted");
                None
            }
            Err(e) => {
                self.clear_buffers();
                self.state = CaptureState::Idle;
                Some(CaptureOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// User stop landed; assemble and emit the transcript
    fn finalize(&mut self) -> Option<CaptureOutcome> {
        let transcript = self.preview();
        self.clear_buffers();
        self.state = CaptureState::Idle;

        if transcript.is_empty() {
            tracing::debug!("capture ended with empty transcript");
            return None;
        }

        tracing::info!(chars = transcript.len(), "capture complete");
        Some(CaptureOutcome::Completed { transcript })
    }

    fn clear_buffers(&mut self) {
        self.segments.clear();
        self.live_final.clear();
        self.interim.clear();
    }
}
