//! API endpoint integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use lingua_coach::Config;
use lingua_coach::api::{ApiState, health};
use lingua_coach::providers::openai::OpenAiSettings;
use lingua_coach::providers::{
    ContentGenerator, ImageGenerator, PronunciationCritic, SpeechSynthesizer,
};
use lingua_coach::voice::{AudioSink, FallbackSynth, NullSink};

mod common;
use common::{FakeCritic, FakeGenerator, NoFallback, SilentSynth, StubIllustrator, ToneFallback, levels};

/// Config with a key present, nothing read from disk or env
fn test_config(api_key: &str) -> Config {
    Config {
        provider: OpenAiSettings {
            base_url: "https://api.openai.com".to_string(),
            api_key: api_key.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            image_model: "dall-e-3".to_string(),
            target_language: "English".to_string(),
            native_language: "Spanish".to_string(),
        },
        autoplay_delay: Duration::from_millis(600),
        playback_rate: 1.0,
        audio_cache_size: 8,
        port: 0,
        audio_enabled: false,
    }
}

/// Build API state over scripted fakes
fn build_test_state(api_key: &str, fallback_available: bool) -> Arc<ApiState> {
    let fallback: Arc<dyn FallbackSynth> = if fallback_available {
        Arc::new(ToneFallback)
    } else {
        Arc::new(NoFallback)
    };

    Arc::new(ApiState {
        config: test_config(api_key),
        generator: Arc::new(FakeGenerator::new(levels(2))) as Arc<dyn ContentGenerator>,
        synth: Arc::new(SilentSynth) as Arc<dyn SpeechSynthesizer>,
        illustrator: Arc::new(StubIllustrator::new()) as Arc<dyn ImageGenerator>,
        critic: Arc::new(FakeCritic::new()) as Arc<dyn PronunciationCritic>,
        sink: Arc::new(NullSink) as Arc<dyn AudioSink>,
        fallback,
    })
}

/// Router with just the health endpoints, as the server assembles them
fn health_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(health::ready_router(state))
}

#[tokio::test]
async fn health_reports_ok_and_version() {
    let router = health_router(build_test_state("sk-test", true));

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ready_is_ok_with_provider_configured() {
    let router = health_router(build_test_state("sk-test", true));

    let response = router
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["provider"]["status"], "ok");
    assert_eq!(json["checks"]["local_synth"]["status"], "ok");
}

#[tokio::test]
async fn ready_degrades_without_an_api_key() {
    let router = health_router(build_test_state("", true));

    let response = router
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["provider"]["status"], "unavailable");
}

#[tokio::test]
async fn missing_fallback_synth_does_not_gate_readiness() {
    let router = health_router(build_test_state("sk-test", false));

    let response = router
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["checks"]["local_synth"]["status"], "unavailable");
}
