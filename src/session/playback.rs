//! Playback state machine for level audio
//!
//! `Idle → Loading → Playing → Idle`, with `Idle → Idle` on error. Exactly
//! one output stream may be active: starting playback silences any prior
//! stream (the fallback path and the success chime included), and a level
//! switch stops everything. Completion callbacks carry a sequence number so
//! a stale completion from a superseded stream cannot corrupt the state.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{MediaCache, SessionSignal};
use crate::voice::{AudioClip, AudioSink, FallbackSynth, PlaybackHandle, chime};

/// Playback lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
}

/// Drives text-to-speech playback for the active level
pub struct PlaybackController {
    state: PlaybackState,
    sink: Arc<dyn AudioSink>,
    fallback: Arc<dyn FallbackSynth>,
    cache: Arc<MediaCache>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    active: Option<PlaybackHandle>,
    chime_stream: Option<PlaybackHandle>,
    seq: u64,
}

impl PlaybackController {
    /// Create an idle controller
    #[must_use]
    pub fn new(
        sink: Arc<dyn AudioSink>,
        fallback: Arc<dyn FallbackSynth>,
        cache: Arc<MediaCache>,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        Self {
            state: PlaybackState::Idle,
            sink,
            fallback,
            cache,
            signals,
            active: None,
            chime_stream: None,
            seq: 0,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether a stream is loading or playing
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        !matches!(self.state, PlaybackState::Idle)
    }

    /// Start playing `text` at the given rate multiplier
    ///
    /// No-op while already loading/playing and while a recording is in
    /// progress. Prefers the cached synthesized voice; falls back to the
    /// offline engine on any synthesis failure. Ends `Idle` on error.
    pub async fn play(&mut self, text: &str, rate: f64, capture_active: bool) {
        if capture_active {
            tracing::debug!("playback refused: capture in progress");
            return;
        }
        if self.is_busy() {
            tracing::debug!(state = ?self.state, "playback refused: already active");
            return;
        }

        self.silence();
        self.state = PlaybackState::Loading;
        self.seq += 1;
        let seq = self.seq;

        let clip = match self.cache.audio_for(text).await {
            Ok(Some(clip)) => Some(clip),
            Ok(None) => self.render_fallback(text).await,
            Err(e) => {
                tracing::warn!(error = %e, "synthesis failed, using local fallback");
                self.render_fallback(text).await
            }
        };

        let Some(clip) = clip else {
            // Nothing renderable; practice goes on without audio
            self.state = PlaybackState::Idle;
            return;
        };

        let signals = self.signals.clone();
        let on_done = Box::new(move || {
            let _ = signals.send(SessionSignal::PlaybackFinished { seq });
        });

        match self.sink.play(clip, rate, on_done) {
            Ok(handle) => {
                self.active = Some(handle);
                self.state = PlaybackState::Playing;
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio output failed");
                self.state = PlaybackState::Idle;
            }
        }
    }

    /// Play the success chime
    ///
    /// The chime is feedback audio, not level audio: it survives the level
    /// reset that follows `next()`, but any new playback silences it.
    pub fn play_chime(&mut self) {
        if let Some(prior) = self.chime_stream.take() {
            prior.stop();
        }
        match self.sink.play(Arc::new(chime()), 1.0, Box::new(|| {})) {
            Ok(handle) => self.chime_stream = Some(handle),
            Err(e) => tracing::debug!(error = %e, "chime skipped"),
        }
    }

    /// Cancel any in-flight or active level playback; idempotent
    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.stop();
        }
        self.state = PlaybackState::Idle;
    }

    /// Handle a completion signal from the sink
    ///
    /// Signals from superseded streams (older `seq`) are ignored.
    pub fn on_finished(&mut self, seq: u64) {
        if seq != self.seq {
            tracing::trace!(seq, current = self.seq, "stale playback completion ignored");
            return;
        }
        self.active = None;
        self.state = PlaybackState::Idle;
    }

    /// Stop every stream this controller owns, the chime included
    fn silence(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.stop();
        }
        if let Some(handle) = self.chime_stream.take() {
            handle.stop();
        }
        self.state = PlaybackState::Idle;
    }

    /// Latest playback sequence number (used to correlate completions)
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Render with the offline engine off the async thread
    async fn render_fallback(&self, text: &str) -> Option<Arc<AudioClip>> {
        if !self.fallback.available() {
            tracing::warn!("no fallback synthesizer; level plays silently");
            return None;
        }

        let fallback = Arc::clone(&self.fallback);
        let text = text.to_string();
        let rendered =
            tokio::task::spawn_blocking(move || fallback.render(&text)).await;

        match rendered {
            Ok(Ok(clip)) => Some(Arc::new(clip)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "fallback synthesis failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "fallback synthesis task failed");
                None
            }
        }
    }
}
