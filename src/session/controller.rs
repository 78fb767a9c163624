//! Practice session orchestration
//!
//! One `PracticeSession` owns every piece of mutable session state. User
//! actions and internal signals are processed one at a time on the owner
//! task; spawned work reports back through the signal channel, never by
//! touching state directly. The per-level reset protocol runs on every
//! index change and is the only place transient state is cleared.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{
    AdvanceOutcome, CaptureController, CaptureOutcome, CaptureState, EvaluationPipeline,
    MediaCache, PlaybackController, PlaybackState, ProgressTracker, SessionSignal,
};
use crate::course::{Evaluation, Level, PhonemeError, clean_word};
use crate::providers::{LevelImage, PronunciationCritic};
use crate::voice::{AudioSink, FallbackSynth, RecognitionEngine, RecognitionEvent};
use crate::{Error, Result};

/// Tuning knobs for a practice session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before the level sentence auto-plays after a level switch
    pub autoplay_delay: Duration,
    /// Playback-rate multiplier for level audio
    pub playback_rate: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autoplay_delay: Duration::from_millis(600),
            playback_rate: 1.0,
        }
    }
}

/// Word-popover content, resolved per the merged lookup order:
/// evaluation error annotation, then vocabulary item, then token gloss
#[derive(Debug, Clone, Serialize)]
pub struct WordDetail {
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<PhonemeError>,
}

/// Renderable snapshot of the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub current: usize,
    pub unlocked: usize,
    pub total: usize,
    pub level: Level,
    pub playing: bool,
    pub loading_audio: bool,
    pub recording: bool,
    pub evaluating: bool,
    pub analysis_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<LevelImage>,
    pub capture_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_word: Option<WordDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub completed: bool,
}

/// Orchestrates one practice session over a generated course
pub struct PracticeSession {
    tracker: ProgressTracker,
    cache: Arc<MediaCache>,
    playback: PlaybackController,
    capture: CaptureController,
    evaluator: EvaluationPipeline,
    signals_tx: mpsc::UnboundedSender<SessionSignal>,
    signals_rx: mpsc::UnboundedReceiver<SessionSignal>,
    recognition_rx: mpsc::UnboundedReceiver<RecognitionEvent>,
    autoplay: Option<JoinHandle<()>>,
    background: Vec<JoinHandle<()>>,
    config: SessionConfig,

    // Transient per-level view state, cleared by the reset protocol
    evaluating: bool,
    analysis_visible: bool,
    displayed: Option<Evaluation>,
    image: Option<LevelImage>,
    open_word: Option<String>,
    notice: Option<String>,
    completed: bool,
    capability_notified: bool,
}

impl PracticeSession {
    /// Create a session over `levels` and enter the first level
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty course.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        levels: Vec<Level>,
        cache: Arc<MediaCache>,
        sink: Arc<dyn AudioSink>,
        fallback: Arc<dyn FallbackSynth>,
        critic: Arc<dyn PronunciationCritic>,
        engine: Box<dyn RecognitionEngine>,
        recognition_rx: mpsc::UnboundedReceiver<RecognitionEvent>,
        config: SessionConfig,
    ) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::Validation("course has no levels".to_string()));
        }

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let playback = PlaybackController::new(
            sink,
            fallback,
            Arc::clone(&cache),
            signals_tx.clone(),
        );
        let evaluator = EvaluationPipeline::new(critic, signals_tx.clone());

        let mut session = Self {
            tracker: ProgressTracker::new(levels),
            cache,
            playback,
            capture: CaptureController::new(engine),
            evaluator,
            signals_tx,
            signals_rx,
            recognition_rx,
            autoplay: None,
            background: Vec::new(),
            config,
            evaluating: false,
            analysis_visible: false,
            displayed: None,
            image: None,
            open_word: None,
            notice: None,
            completed: false,
            capability_notified: false,
        };
        session.enter_level();
        Ok(session)
    }

    /// Progress state (read-only)
    #[must_use]
    pub const fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Current playback state
    #[must_use]
    pub const fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    /// Current capture state
    #[must_use]
    pub const fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    /// Whether the course has been completed
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Play the current level's sentence
    ///
    /// Refused while a recording is in progress or audio is already active.
    pub async fn play(&mut self) {
        let text = self.tracker.level().source_text.clone();
        let rate = self.config.playback_rate;
        let capture_active = self.capture.is_active();
        self.playback.play(&text, rate, capture_active).await;
    }

    /// Stop level audio immediately
    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    /// Begin recording an attempt
    ///
    /// Refused while audio is playing. Capability failures disable the
    /// feature and notify once; other failures surface inline.
    pub fn start_recording(&mut self) {
        if self.playback.is_busy() {
            tracing::debug!("recording refused: audio active");
            return;
        }

        match self.capture.start() {
            Ok(()) => {
                self.notice = None;
            }
            Err(e) if e.is_capability() => {
                let message = match e {
                    Error::PermissionDenied => {
                        "Microphone access is blocked; recording is disabled for this session."
                    }
                    _ => "Speech recognition is not available on this platform.",
                };
                self.notify_capability(message);
            }
            Err(e) => {
                self.notice = Some(format!("Could not start recording: {e}"));
            }
        }
    }

    /// Finish recording; the transcript is evaluated when it lands
    pub fn stop_recording(&mut self) {
        self.capture.stop();
    }

    /// Complete the current level and move on
    ///
    /// Plays the success chime, then advances; at the last level the
    /// session is flagged complete and the view stays put.
    pub fn next(&mut self) {
        self.playback.play_chime();
        match self.tracker.advance() {
            AdvanceOutcome::Advanced(index) => {
                tracing::debug!(index, "advanced to next level");
                self.enter_level();
            }
            AdvanceOutcome::Completed => {
                tracing::info!("course completed");
                self.completed = true;
            }
        }
    }

    /// Navigate to an unlocked level; silently rejected when locked
    pub fn jump(&mut self, index: usize) {
        if self.tracker.jump_to(index) {
            self.enter_level();
        }
    }

    /// Toggle the detail popover for a word (mutually exclusive)
    pub fn toggle_word(&mut self, word: &str) {
        let cleaned = clean_word(word);
        if cleaned.is_empty() {
            return;
        }
        if self.open_word.as_deref() == Some(cleaned.as_str()) {
            self.open_word = None;
        } else {
            self.open_word = Some(cleaned);
        }
    }

    /// Background click: close any open popover
    pub fn close_popovers(&mut self) {
        self.open_word = None;
    }

    /// Feed one recognition event through the capture machine
    pub fn handle_recognition(&mut self, event: RecognitionEvent) {
        match self.capture.handle_event(event) {
            Some(CaptureOutcome::Completed { transcript }) => {
                let index = self.tracker.current();
                let target = self.tracker.level().source_text.clone();
                if let Some(handle) = self.evaluator.submit(index, &target, &transcript) {
                    self.evaluating = true;
                    self.background.push(handle);
                }
            }
            Some(CaptureOutcome::Disabled) => {
                self.notify_capability(
                    "Microphone access was denied; recording is disabled for this session.",
                );
            }
            Some(CaptureOutcome::Failed { message }) => {
                self.notice = Some(format!("Recording stopped unexpectedly: {message}"));
            }
            None => {}
        }
    }

    /// Handle one internal signal
    pub async fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::PlaybackFinished { seq } => {
                self.playback.on_finished(seq);
            }
            SessionSignal::Evaluated { index, evaluation } => {
                if index != self.tracker.current() {
                    // The user moved on; applying this would corrupt the
                    // wrong level's display
                    tracing::debug!(
                        index,
                        current = self.tracker.current(),
                        "stale evaluation discarded"
                    );
                    return;
                }
                self.tracker.record(index, evaluation.clone());
                self.displayed = Some(evaluation);
                self.analysis_visible = true;
                self.evaluating = false;
            }
            SessionSignal::EvaluationFailed { index, message } => {
                if index == self.tracker.current() {
                    self.evaluating = false;
                    self.notice = Some("Feedback is unavailable right now; try again.".to_string());
                }
                tracing::debug!(index, message, "evaluation failed");
            }
            SessionSignal::AutoPlay { index } => {
                if index == self.tracker.current()
                    && !self.capture.is_active()
                    && !self.playback.is_busy()
                {
                    self.play().await;
                }
            }
            SessionSignal::ImageReady { index, image } => {
                if index == self.tracker.current() {
                    self.image = image;
                }
            }
        }
    }

    /// Drive pending background work and drain both event channels
    ///
    /// Deterministic: loops until no spawned task, signal, or recognition
    /// event remains. Pending autoplay timers are intentionally not
    /// awaited.
    pub async fn settle(&mut self) {
        loop {
            let mut progressed = false;

            while let Ok(event) = self.recognition_rx.try_recv() {
                self.handle_recognition(event);
                progressed = true;
            }
            while let Ok(signal) = self.signals_rx.try_recv() {
                self.handle_signal(signal).await;
                progressed = true;
            }

            if !self.background.is_empty() {
                for handle in std::mem::take(&mut self.background) {
                    if let Err(e) = handle.await {
                        tracing::debug!(error = %e, "background task aborted");
                    }
                }
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
    }

    /// Await the next internal signal or recognition event and handle it
    ///
    /// Interactive drivers select on this alongside their own input;
    /// [`Self::settle`] remains the batch entry point. Never returns until
    /// something was handled (the session holds its own signal sender, so
    /// the signal channel cannot close).
    pub async fn pump(&mut self) {
        enum Next {
            Signal(SessionSignal),
            Recognition(RecognitionEvent),
        }

        let next = tokio::select! {
            Some(signal) = self.signals_rx.recv() => Next::Signal(signal),
            Some(event) = self.recognition_rx.recv() => Next::Recognition(event),
        };

        match next {
            Next::Signal(signal) => self.handle_signal(signal).await,
            Next::Recognition(event) => self.handle_recognition(event),
        }
    }

    /// Tear the session down: stop all streams, cancel all timers
    pub fn teardown(&mut self) {
        if let Some(timer) = self.autoplay.take() {
            timer.abort();
        }
        self.playback.stop();
        self.capture.abort();
    }

    /// Current renderable snapshot
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            current: self.tracker.current(),
            unlocked: self.tracker.unlocked(),
            total: self.tracker.len(),
            level: self.tracker.level().clone(),
            playing: matches!(self.playback.state(), PlaybackState::Playing),
            loading_audio: matches!(self.playback.state(), PlaybackState::Loading),
            recording: self.capture.is_active(),
            evaluating: self.evaluating,
            analysis_visible: self.analysis_visible,
            evaluation: self.displayed.clone(),
            image: self.image.clone(),
            capture_preview: self.capture.preview(),
            open_word: self.word_detail(),
            notice: self.notice.clone(),
            completed: self.completed,
        }
    }

    /// The per-level reset protocol, run on every index change
    fn enter_level(&mut self) {
        // 1. Pending timers and audio first
        if let Some(timer) = self.autoplay.take() {
            timer.abort();
        }
        self.playback.stop();

        // 2. Capture, with the user-stopped flag pre-set inside abort()
        self.capture.abort();

        // 3. Transient flags and popovers
        self.evaluating = false;
        self.notice = None;
        self.open_word = None;
        self.image = None;

        // 4. History restore
        let index = self.tracker.current();
        if let Some(stored) = self.tracker.result_for(index) {
            self.displayed = Some(stored.clone());
            self.analysis_visible = true;
        } else {
            self.displayed = None;
            self.analysis_visible = false;
        }

        // 5. Media prefetch and the delayed autoplay timer
        let text = self.tracker.level().source_text.clone();
        let cache = Arc::clone(&self.cache);
        let signals = self.signals_tx.clone();
        self.background.push(tokio::spawn(async move {
            let image = cache.image_for(index, &text).await;
            let _ = signals.send(SessionSignal::ImageReady { index, image });
        }));

        if let Some(next) = self.tracker.level_at(index + 1) {
            self.background
                .push(self.cache.prefetch_image(index + 1, next.source_text.clone()));
        }

        let signals = self.signals_tx.clone();
        let delay = self.config.autoplay_delay;
        self.autoplay = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(SessionSignal::AutoPlay { index });
        }));

        tracing::debug!(index, "entered level");
    }

    /// Capability failures notify the user exactly once per session
    fn notify_capability(&mut self, message: &str) {
        if self.capability_notified {
            return;
        }
        self.capability_notified = true;
        self.notice = Some(message.to_string());
    }

    /// Resolve popover content for the open word, if any
    fn word_detail(&self) -> Option<WordDetail> {
        let word = self.open_word.as_ref()?;
        let level = self.tracker.level();

        let pronunciation = self
            .displayed
            .as_ref()
            .and_then(|e| e.error_for(word))
            .cloned();
        let vocab = level.vocabulary_for(word);
        let token = level.token_for(word);

        Some(WordDetail {
            word: word.clone(),
            ipa: vocab
                .and_then(|v| v.ipa.clone())
                .or_else(|| token.map(|t| t.ipa.clone())),
            meaning: vocab
                .map(|v| v.meaning.clone())
                .or_else(|| token.map(|t| t.gloss.clone())),
            usage_note: vocab.map(|v| v.usage_note.clone()),
            pronunciation,
        })
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
