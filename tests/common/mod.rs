//! Shared test utilities: scripted fakes for every collaborator seam
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use lingua_coach::course::{
    DifficultyTier, Evaluation, Level, PhonemeError, VocabularyItem, WordToken,
};
use lingua_coach::providers::{
    ContentGenerator, ImageGenerator, LevelImage, PronunciationCritic, SpeechSynthesizer,
};
use lingua_coach::session::{MediaCache, PracticeSession, SessionConfig};
use lingua_coach::voice::{
    AudioClip, AudioSink, FallbackSynth, PlaybackHandle, RecognitionEngine, RecognitionEvent,
};
use lingua_coach::{CourseInput, Error, Result};

/// Build `n` simple levels; each sentence mentions a fox
#[must_use]
pub fn levels(n: usize) -> Vec<Level> {
    (0..n)
        .map(|i| Level {
            id: u32::try_from(i).unwrap(),
            source_text: format!("The quick fox jumps over level {i}."),
            translation: format!("translation {i}"),
            tier: DifficultyTier::Basic,
            grammar_notes: vec!["Simple present".to_string()],
            vocabulary: vec![VocabularyItem {
                word: "fox".to_string(),
                part_of_speech: "noun".to_string(),
                meaning: "a small wild canine".to_string(),
                usage_note: "often figurative".to_string(),
                is_user_word: true,
                ipa: Some("fɒks".to_string()),
            }],
            word_tokens: vec![
                WordToken {
                    text: "quick".to_string(),
                    ipa: "kwɪk".to_string(),
                    gloss: "fast".to_string(),
                },
                WordToken {
                    text: "fox".to_string(),
                    ipa: "fɒks".to_string(),
                    gloss: "the animal".to_string(),
                },
            ],
            tip: None,
        })
        .collect()
}

/// Generator that returns a fixed course (or fails)
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub levels: Vec<Level>,
    pub fail: bool,
}

impl FakeGenerator {
    #[must_use]
    pub fn new(levels: Vec<Level>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            levels,
            fail: false,
        }
    }
}

#[async_trait]
impl ContentGenerator for FakeGenerator {
    async fn generate(&self, input: &CourseInput) -> Result<Vec<Level>> {
        input.validate()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Generation("service unavailable".to_string()));
        }
        Ok(self.levels.clone())
    }
}

/// Synthesizer that always defers to the local fallback
pub struct SilentSynth;

#[async_trait]
impl SpeechSynthesizer for SilentSynth {
    async fn synthesize(&self, _text: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Illustrator that returns one URL per text and counts calls
pub struct StubIllustrator {
    pub calls: AtomicUsize,
}

impl StubIllustrator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageGenerator for StubIllustrator {
    async fn illustrate(&self, text: &str) -> Result<Option<LevelImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(LevelImage {
            url: format!("https://img.test/{}", text.len()),
        }))
    }
}

/// Critic returning a scripted evaluation; records the last call
pub struct FakeCritic {
    pub calls: AtomicUsize,
    pub last_call: Mutex<Option<(String, String)>>,
    pub fail: AtomicBool,
}

impl FakeCritic {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PronunciationCritic for FakeCritic {
    async fn critique(&self, target: &str, transcript: &str) -> Result<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some((target.to_string(), transcript.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Critique("critique service down".to_string()));
        }
        Ok(Evaluation {
            transcript: transcript.to_string(),
            feedback: "Good effort, mind the vowels.".to_string(),
            errors: vec![PhonemeError {
                word: "fox".to_string(),
                expected: "ɒ".to_string(),
                produced: "oʊ".to_string(),
                tip: "shorter vowel".to_string(),
                contrast: "fox / folks".to_string(),
            }],
            created_at: Utc::now(),
        })
    }
}

/// Fallback that always renders a short tone
pub struct ToneFallback;

impl FallbackSynth for ToneFallback {
    fn available(&self) -> bool {
        true
    }

    fn render(&self, _text: &str) -> Result<AudioClip> {
        Ok(AudioClip {
            samples: vec![0.1; 240],
            sample_rate: 24000,
        })
    }
}

/// Fallback with nothing to offer
pub struct NoFallback;

impl FallbackSynth for NoFallback {
    fn available(&self) -> bool {
        false
    }

    fn render(&self, _text: &str) -> Result<AudioClip> {
        Err(Error::Synthesis("no engine".to_string()))
    }
}

/// Sink that records every play and keeps completion under test control
pub struct RecordingSink {
    /// Complete clips immediately instead of leaving them "playing"
    pub auto_complete: bool,
    pub plays: AtomicUsize,
    pub rates: Mutex<Vec<f64>>,
    pub handles: Mutex<Vec<PlaybackHandle>>,
    pending: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new(auto_complete: bool) -> Self {
        Self {
            auto_complete,
            plays: AtomicUsize::new(0),
            rates: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Fire the completion callbacks of every pending stream
    pub fn finish_all(&self) {
        let pending: Vec<_> = std::mem::take(&mut *self.pending.lock().unwrap());
        for done in pending {
            done();
        }
    }
}

impl AudioSink for RecordingSink {
    fn play(
        &self,
        _clip: Arc<AudioClip>,
        rate: f64,
        on_done: Box<dyn FnOnce() + Send>,
    ) -> Result<PlaybackHandle> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.rates.lock().unwrap().push(rate);

        let handle = PlaybackHandle::new(Arc::new(std::sync::atomic::AtomicBool::new(false)));
        self.handles.lock().unwrap().push(handle.clone());

        if self.auto_complete {
            on_done();
        } else {
            self.pending.lock().unwrap().push(on_done);
        }
        Ok(handle)
    }
}

/// Scripted recognition engine: counts starts/stops, optional failures
pub struct ScriptedEngine {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub supported: bool,
    pub fail_start_after: Option<usize>,
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        (
            Self {
                starts: Arc::clone(&starts),
                stops: Arc::clone(&stops),
                supported: true,
                fail_start_after: None,
            },
            starts,
            stops,
        )
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self) -> Result<()> {
        let n = self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start_after.is_some_and(|limit| n >= limit) {
            return Err(Error::Capture("engine gone".to_string()));
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A fully wired session over fakes, with handles to observe them
pub struct Harness {
    pub session: PracticeSession,
    pub sink: Arc<RecordingSink>,
    pub critic: Arc<FakeCritic>,
    pub illustrator: Arc<StubIllustrator>,
    pub engine_starts: Arc<AtomicUsize>,
    pub engine_stops: Arc<AtomicUsize>,
    /// Kept alive so the session's recognition channel stays open
    pub rec_tx: mpsc::UnboundedSender<RecognitionEvent>,
}

/// Build a harness over `n` levels
///
/// The autoplay timer is pushed far out so it never interferes; tests that
/// exercise autoplay pass their own config via [`harness_with`].
#[must_use]
pub fn harness(n: usize) -> Harness {
    harness_with(
        n,
        SessionConfig {
            autoplay_delay: Duration::from_secs(3600),
            playback_rate: 1.0,
        },
        false,
    )
}

/// Build a harness whose engine reports no recognition capability
#[must_use]
pub fn harness_unsupported(n: usize) -> Harness {
    let sink = Arc::new(RecordingSink::new(false));
    let critic = Arc::new(FakeCritic::new());
    let illustrator = Arc::new(StubIllustrator::new());
    let cache = Arc::new(MediaCache::new(
        Arc::new(SilentSynth),
        Arc::clone(&illustrator) as Arc<dyn ImageGenerator>,
        8,
    ));
    let (mut engine, engine_starts, engine_stops) = ScriptedEngine::new();
    engine.supported = false;
    let (rec_tx, rec_rx) = mpsc::unbounded_channel();

    let session = PracticeSession::new(
        levels(n),
        cache,
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        Arc::new(ToneFallback),
        Arc::clone(&critic) as Arc<dyn PronunciationCritic>,
        Box::new(engine),
        rec_rx,
        SessionConfig {
            autoplay_delay: Duration::from_secs(3600),
            playback_rate: 1.0,
        },
    )
    .expect("session over a non-empty course");

    Harness {
        session,
        sink,
        critic,
        illustrator,
        engine_starts,
        engine_stops,
        rec_tx,
    }
}

/// Build a harness with explicit session config and sink completion mode
#[must_use]
pub fn harness_with(n: usize, config: SessionConfig, auto_complete_audio: bool) -> Harness {
    let sink = Arc::new(RecordingSink::new(auto_complete_audio));
    let critic = Arc::new(FakeCritic::new());
    let illustrator = Arc::new(StubIllustrator::new());
    let cache = Arc::new(MediaCache::new(
        Arc::new(SilentSynth),
        Arc::clone(&illustrator) as Arc<dyn ImageGenerator>,
        8,
    ));
    let (engine, engine_starts, engine_stops) = ScriptedEngine::new();
    let (rec_tx, rec_rx) = mpsc::unbounded_channel();

    let session = PracticeSession::new(
        levels(n),
        cache,
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        Arc::new(ToneFallback),
        Arc::clone(&critic) as Arc<dyn PronunciationCritic>,
        Box::new(engine),
        rec_rx,
        config,
    )
    .expect("session over a non-empty course");

    Harness {
        session,
        sink,
        critic,
        illustrator,
        engine_starts,
        engine_stops,
        rec_tx,
    }
}

/// Shorthand for a finalized recognition fragment
#[must_use]
pub fn finalized(text: &str) -> RecognitionEvent {
    RecognitionEvent::Final {
        text: text.to_string(),
    }
}

/// Shorthand for an interim recognition fragment
#[must_use]
pub fn partial(text: &str) -> RecognitionEvent {
    RecognitionEvent::Partial {
        text: text.to_string(),
    }
}

/// Run a complete recorded attempt on the current level
pub async fn record_attempt(harness: &mut Harness, transcript: &str) {
    harness.session.start_recording();
    harness.session.handle_recognition(finalized(transcript));
    harness.session.stop_recording();
    harness
        .session
        .handle_recognition(RecognitionEvent::Ended);
    harness.session.settle().await;
}
