//! Speech-recognition engine contract
//!
//! Recognition is modeled as a typed event stream consumed by the capture
//! state machine, not as callbacks mutating shared state. The engine may end
//! a run on its own (silence timeout); the capture controller decides
//! whether that ending was user-intended.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// One event from a recognition run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// Interim fragment; replaces any previous interim text
    Partial { text: String },
    /// Finalized fragment; appended to the run's transcript
    Final { text: String },
    /// The engine stopped, either on request or on its own silence timeout
    Ended,
    /// Microphone permission denied; terminal for the session
    PermissionDenied,
    /// Transient engine error; the listening loop continues
    Error { message: String },
}

/// Commands sent to a recognition engine driven over a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
}

/// Platform speech-recognition seam
///
/// `start` begins a recognition run that emits [`RecognitionEvent`]s into
/// the session's event channel; each run ends with exactly one `Ended`.
/// `stop` requests that ending. Engines must tolerate `stop` when no run is
/// active.
pub trait RecognitionEngine: Send + Sync {
    /// Whether the platform has a usable recognition facility
    fn supported(&self) -> bool {
        true
    }

    /// Begin a recognition run
    ///
    /// # Errors
    ///
    /// Returns error if a run cannot be started (engine gone, channel
    /// closed)
    fn start(&mut self) -> Result<()>;

    /// Request the current run stop
    fn stop(&mut self);
}

/// Recognition engine driven by a remote producer over a command channel
///
/// The browser owns the actual recognizer: `start`/`stop` are forwarded as
/// [`CaptureCommand`]s (delivered to the client as capture prompts), and the
/// client's transcript events are fed into the session's recognition
/// channel by the API layer.
pub struct ChannelRecognition {
    commands: mpsc::UnboundedSender<CaptureCommand>,
    supported: bool,
}

impl ChannelRecognition {
    /// Create an engine forwarding commands into `commands`
    #[must_use]
    pub const fn new(commands: mpsc::UnboundedSender<CaptureCommand>) -> Self {
        Self {
            commands,
            supported: true,
        }
    }

    /// Create an engine that reports no recognition capability
    #[must_use]
    pub const fn unsupported(commands: mpsc::UnboundedSender<CaptureCommand>) -> Self {
        Self {
            commands,
            supported: false,
        }
    }
}

impl RecognitionEngine for ChannelRecognition {
    fn supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self) -> Result<()> {
        self.commands
            .send(CaptureCommand::Start)
            .map_err(|_| Error::Capture("recognition command channel closed".to_string()))
    }

    fn stop(&mut self) {
        if self.commands.send(CaptureCommand::Stop).is_err() {
            tracing::debug!("recognition command channel closed during stop");
        }
    }
}
