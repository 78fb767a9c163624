//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub provider: CheckResult,
    pub local_synth: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: "unavailable",
            message: Some(message.into()),
        }
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can the service run a practice session?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let provider = if state.config.provider.api_key.is_empty() {
        CheckResult::unavailable("no API key configured")
    } else {
        CheckResult::ok()
    };

    let local_synth = if state.fallback.available() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("no espeak/say binary on PATH")
    };

    // The fallback synthesizer is optional; only the provider gates readiness
    let all_ok = provider.status == "ok";
    let status = if all_ok { "ok" } else { "degraded" };
    let http_status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                provider,
                local_synth,
            },
        }),
    )
}

/// Liveness router (stateless)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
