//! Practice-session integration tests
//!
//! Every collaborator is a scripted fake, so the state machines are
//! exercised without audio hardware, a recognizer, or network access.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;

use lingua_coach::Error;
use lingua_coach::providers::{ImageGenerator, PronunciationCritic};
use lingua_coach::session::{
    CaptureState, MediaCache, PlaybackState, PracticeSession, SessionConfig,
};
use lingua_coach::voice::{AudioSink, RecognitionEvent};

mod common;
use common::{
    FakeCritic, RecordingSink, ScriptedEngine, SilentSynth, StubIllustrator, ToneFallback,
    finalized, harness, harness_unsupported, harness_with, partial, record_attempt,
};

#[tokio::test]
async fn empty_course_is_rejected_at_construction() {
    let sink = Arc::new(RecordingSink::new(true));
    let critic = Arc::new(FakeCritic::new());
    let cache = Arc::new(MediaCache::new(
        Arc::new(SilentSynth),
        Arc::new(StubIllustrator::new()) as Arc<dyn ImageGenerator>,
        8,
    ));
    let (engine, _, _) = ScriptedEngine::new();
    let (_rec_tx, rec_rx) = mpsc::unbounded_channel();

    let result = PracticeSession::new(
        vec![],
        cache,
        sink as Arc<dyn AudioSink>,
        Arc::new(ToneFallback),
        critic as Arc<dyn PronunciationCritic>,
        Box::new(engine),
        rec_rx,
        SessionConfig::default(),
    );

    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn locked_jump_is_silently_rejected() {
    let mut h = harness(3);
    h.session.settle().await;

    h.session.jump(2);
    let view = h.session.view();
    assert_eq!(view.current, 0);
    assert_eq!(view.unlocked, 0);
    assert!(view.notice.is_none());
}

#[tokio::test]
async fn evaluation_is_stored_while_still_on_the_level() {
    let mut h = harness(3);
    h.session.settle().await;

    record_attempt(&mut h, "the quick fox").await;

    let view = h.session.view();
    assert!(view.analysis_visible);
    assert_eq!(view.evaluation.as_ref().unwrap().transcript, "the quick fox");
    assert!(h.session.tracker().result_for(0).is_some());
    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 1);
    assert!(!view.evaluating);
}

#[tokio::test]
async fn late_evaluation_for_an_abandoned_level_is_discarded() {
    let mut h = harness(3);
    h.session.settle().await;

    // Capture completes, but the user moves on before the critique lands
    h.session.start_recording();
    h.session.handle_recognition(finalized("abandoned attempt"));
    h.session.stop_recording();
    h.session.handle_recognition(RecognitionEvent::Ended);

    h.session.next();
    h.session.settle().await;

    // The call happened, the result was dropped
    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 1);
    assert!(h.session.tracker().result_for(0).is_none());
    assert!(h.session.view().evaluation.is_none());

    // Coming back shows no phantom result either
    h.session.jump(0);
    h.session.settle().await;
    let view = h.session.view();
    assert!(view.evaluation.is_none());
    assert!(!view.analysis_visible);
}

#[tokio::test]
async fn switching_levels_silences_playing_audio() {
    let mut h = harness(3);
    h.session.settle().await;

    h.session.play().await;
    assert_eq!(h.session.playback_state(), PlaybackState::Playing);

    h.session.next();
    h.session.settle().await;

    assert_eq!(h.session.playback_state(), PlaybackState::Idle);
    // The level-audio stream (first play) must be stopped
    assert!(h.sink.handles.lock().unwrap()[0].is_stopped());
}

#[tokio::test]
async fn switching_levels_aborts_capture_without_a_transcript() {
    let mut h = harness(3);
    h.session.settle().await;

    h.session.start_recording();
    h.session.handle_recognition(partial("half a sen"));
    h.session.handle_recognition(finalized("half a sentence"));

    h.session.next();
    assert_eq!(h.session.capture_state(), CaptureState::Idle);
    assert!(h.engine_stops.load(Ordering::SeqCst) >= 1);

    // The engine's trailing Ended arrives after the abort
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.settle().await;

    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.session.view().capture_preview, "");
    // No restart was attempted either
    assert_eq!(h.engine_starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_playback_is_idempotent_from_idle() {
    let mut h = harness(2);
    h.session.settle().await;

    assert_eq!(h.session.playback_state(), PlaybackState::Idle);
    h.session.stop_playback();
    h.session.stop_playback();
    assert_eq!(h.session.playback_state(), PlaybackState::Idle);
}

#[tokio::test]
async fn revisiting_a_level_redisplays_without_reevaluating() {
    let mut h = harness(3);
    h.session.settle().await;

    record_attempt(&mut h, "the quick fox").await;
    let stored = h.session.view().evaluation.unwrap();

    h.session.next();
    h.session.settle().await;
    assert!(h.session.view().evaluation.is_none());

    h.session.jump(0);
    h.session.settle().await;

    let view = h.session.view();
    assert!(view.analysis_visible);
    assert_eq!(
        view.evaluation.as_ref().unwrap().transcript,
        stored.transcript
    );
    // No second critique call was made
    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn three_level_walkthrough_reaches_completion() {
    let mut h = harness(3);
    h.session.settle().await;

    // Complete level 0 with a stored evaluation
    record_attempt(&mut h, "the quick fox").await;
    assert!(h.session.tracker().result_for(0).is_some());

    h.session.next();
    h.session.settle().await;
    assert_eq!(h.session.tracker().current(), 1);
    assert_eq!(h.session.tracker().unlocked(), 1);

    // Review level 0: stored result, no new critique
    h.session.jump(0);
    h.session.settle().await;
    assert!(h.session.view().analysis_visible);
    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 1);

    // Forward through the rest of the course
    h.session.next();
    h.session.settle().await;
    h.session.next();
    h.session.settle().await;
    assert_eq!(h.session.tracker().current(), 2);
    assert_eq!(h.session.tracker().unlocked(), 2);
    assert!(!h.session.is_completed());

    h.session.next();
    h.session.settle().await;
    assert!(h.session.is_completed());
    assert_eq!(h.session.tracker().current(), 2);
    assert_eq!(h.session.tracker().unlocked(), 2);
}

#[tokio::test]
async fn auto_restarted_capture_concatenates_all_segments() {
    let mut h = harness(2);
    h.session.settle().await;

    h.session.start_recording();
    h.session.handle_recognition(finalized("first segment"));
    // Engine-imposed silence stop; not user-intended
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.handle_recognition(finalized("second segment"));
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.handle_recognition(finalized("third segment"));
    h.session.stop_recording();
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.settle().await;

    let (_, transcript) = h.critic.last_call.lock().unwrap().clone().unwrap();
    assert_eq!(transcript, "first segment second segment third segment");
    // Initial start plus one restart per silence stop
    assert_eq!(h.engine_starts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn empty_capture_never_reaches_the_critic() {
    let mut h = harness(2);
    h.session.settle().await;

    h.session.start_recording();
    h.session.handle_recognition(partial("   "));
    h.session.stop_recording();
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.settle().await;

    assert_eq!(h.critic.calls.load(Ordering::SeqCst), 0);
    assert!(!h.session.view().evaluating);
}

#[tokio::test]
async fn playback_and_capture_exclude_each_other() {
    let mut h = harness(2);
    h.session.settle().await;

    // Recording first: playback must refuse
    h.session.start_recording();
    h.session.play().await;
    assert_eq!(h.sink.plays.load(Ordering::SeqCst), 0);
    assert_eq!(h.session.playback_state(), PlaybackState::Idle);

    // Wind the recording down
    h.session.stop_recording();
    h.session.handle_recognition(RecognitionEvent::Ended);
    h.session.settle().await;

    // Audio first: recording must refuse
    h.session.play().await;
    assert_eq!(h.session.playback_state(), PlaybackState::Playing);
    let starts_before = h.engine_starts.load(Ordering::SeqCst);
    h.session.start_recording();
    assert_eq!(h.engine_starts.load(Ordering::SeqCst), starts_before);
    assert_eq!(h.session.capture_state(), CaptureState::Idle);
}

#[tokio::test]
async fn unsupported_recognition_notifies_exactly_once() {
    let mut h = harness_unsupported(2);
    h.session.settle().await;

    h.session.start_recording();
    let first = h.session.view().notice;
    assert!(first.is_some());
    assert_eq!(h.engine_starts.load(Ordering::SeqCst), 0);

    // Level switch clears the notice; a second attempt stays quiet
    h.session.next();
    h.session.settle().await;
    h.session.start_recording();
    assert!(h.session.view().notice.is_none());
}

#[tokio::test]
async fn word_popover_resolves_error_then_vocabulary_then_token() {
    let mut h = harness(2);
    h.session.settle().await;
    record_attempt(&mut h, "the quick fox").await;

    // "fox" carries a pronunciation error and a vocabulary entry
    h.session.toggle_word("Fox!");
    let detail = h.session.view().open_word.unwrap();
    assert_eq!(detail.word, "fox");
    assert_eq!(detail.meaning.as_deref(), Some("a small wild canine"));
    assert_eq!(detail.ipa.as_deref(), Some("fɒks"));
    assert_eq!(
        detail.pronunciation.as_ref().map(|e| e.expected.as_str()),
        Some("ɒ")
    );

    // "quick" only has a token gloss; opening it closes "fox"
    h.session.toggle_word("quick");
    let detail = h.session.view().open_word.unwrap();
    assert_eq!(detail.word, "quick");
    assert_eq!(detail.meaning.as_deref(), Some("fast"));
    assert!(detail.pronunciation.is_none());

    // Toggling the same word closes it
    h.session.toggle_word("quick");
    assert!(h.session.view().open_word.is_none());

    // Background click closes whatever is open
    h.session.toggle_word("fox");
    h.session.close_popovers();
    assert!(h.session.view().open_word.is_none());
}

#[tokio::test]
async fn autoplay_fires_after_the_delay() {
    let mut h = harness_with(
        2,
        SessionConfig {
            autoplay_delay: Duration::ZERO,
            playback_rate: 1.25,
        },
        false,
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.session.settle().await;

    assert_eq!(h.session.playback_state(), PlaybackState::Playing);
    assert_eq!(h.sink.plays.load(Ordering::SeqCst), 1);
    assert!((h.sink.rates.lock().unwrap()[0] - 1.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn level_switch_cancels_the_pending_autoplay_timer() {
    let mut h = harness_with(
        3,
        SessionConfig {
            autoplay_delay: Duration::from_millis(40),
            playback_rate: 1.0,
        },
        false,
    );

    // Move on before level 0's timer fires
    h.session.next();
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.session.settle().await;

    // One chime from next() plus exactly one autoplay (level 1's)
    assert_eq!(h.sink.plays.load(Ordering::SeqCst), 2);
    assert_eq!(h.session.tracker().current(), 1);
}

#[tokio::test]
async fn images_load_for_current_and_prefetch_for_next() {
    let mut h = harness(3);
    h.session.settle().await;

    assert!(h.session.view().image.is_some());
    // Current level plus the speculative next
    assert_eq!(h.illustrator.calls.load(Ordering::SeqCst), 2);

    h.session.next();
    h.session.settle().await;

    // Level 1 was already cached; only level 2 is new
    assert!(h.session.view().image.is_some());
    assert_eq!(h.illustrator.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failed_critique_leaves_history_untouched_for_retry() {
    let mut h = harness(2);
    h.critic.fail.store(true, Ordering::SeqCst);
    h.session.settle().await;

    record_attempt(&mut h, "the quick fox").await;

    let view = h.session.view();
    assert!(h.session.tracker().result_for(0).is_none());
    assert!(!view.evaluating);
    assert!(view.notice.is_some());

    // Retry succeeds and overwrites nothing stale
    h.critic.fail.store(false, Ordering::SeqCst);
    record_attempt(&mut h, "the quick fox again").await;
    assert_eq!(
        h.session.view().evaluation.unwrap().transcript,
        "the quick fox again"
    );
}
