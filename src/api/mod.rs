//! HTTP API server for the practice engine
//!
//! A browser front-end drives one practice session per WebSocket
//! connection; the engine owns all session state server-side.

pub mod health;
pub mod practice;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::providers::{
    ContentGenerator, ImageGenerator, OpenAiProvider, PronunciationCritic, SpeechSynthesizer,
};
use crate::voice::{AudioSink, CpalSink, FallbackSynth, LocalSynth, NullSink};
use crate::Result;

/// Shared state for API handlers
pub struct ApiState {
    pub config: Config,
    pub generator: Arc<dyn ContentGenerator>,
    pub synth: Arc<dyn SpeechSynthesizer>,
    pub illustrator: Arc<dyn ImageGenerator>,
    pub critic: Arc<dyn PronunciationCritic>,
    pub sink: Arc<dyn AudioSink>,
    pub fallback: Arc<dyn FallbackSynth>,
}

impl ApiState {
    /// Wire up providers and audio from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider cannot be constructed (missing API
    /// key). A missing audio device is not fatal: playback degrades to the
    /// null sink.
    pub fn from_config(config: Config) -> Result<Arc<Self>> {
        let provider = Arc::new(OpenAiProvider::new(config.provider.clone())?);

        let sink: Arc<dyn AudioSink> = if config.audio_enabled {
            match CpalSink::new() {
                Ok(sink) => Arc::new(sink),
                Err(e) => {
                    tracing::warn!(error = %e, "no audio device, playback disabled");
                    Arc::new(NullSink)
                }
            }
        } else {
            Arc::new(NullSink)
        };

        Ok(Arc::new(Self {
            config,
            generator: Arc::clone(&provider) as Arc<dyn ContentGenerator>,
            synth: Arc::clone(&provider) as Arc<dyn SpeechSynthesizer>,
            illustrator: Arc::clone(&provider) as Arc<dyn ImageGenerator>,
            critic: provider as Arc<dyn PronunciationCritic>,
            sink,
            fallback: Arc::new(LocalSynth::discover()),
        }))
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server over prepared state
    #[must_use]
    pub fn new(state: Arc<ApiState>) -> Self {
        let port = state.config.port;
        Self { state, port }
    }

    /// Build the router with all routes
    fn router(&self) -> Router {
        let router = Router::new()
            .nest("/ws", practice::router(Arc::clone(&self.state)))
            .merge(health::router())
            .merge(health::ready_router(Arc::clone(&self.state)));

        // CORS layer for cross-origin requests from the front-end
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
