//! WebSocket handler for driving a practice session from a browser
//!
//! One session per connection. The browser performs speech recognition and
//! forwards transcript events; the engine owns every piece of session
//! state and pushes renderable snapshots back. Capture start/stop prompts
//! flow to the client because the recognizer lives there.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::course::CourseInput;
use crate::session::{MediaCache, PracticeSession, SessionView};
use crate::voice::{CaptureCommand, ChannelRecognition, RecognitionEvent};
use crate::Error;

/// Incoming WebSocket message from the client
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Generate a course and start a session
    Generate { input: CourseInput },
    /// Play the current level's sentence
    Play,
    /// Stop level audio
    StopAudio,
    /// Begin recording an attempt
    RecordStart,
    /// Finish recording
    RecordStop,
    /// Complete the current level and move on
    Next,
    /// Navigate to an unlocked level
    Jump { index: usize },
    /// Toggle a word's detail popover
    WordClick { word: String },
    /// Background click: close popovers
    BackgroundClick,
    /// A recognition event from the browser's recognizer
    Recognition {
        #[serde(flatten)]
        event: RecognitionEvent,
    },
    /// Keep-alive
    Ping,
}

/// Outgoing WebSocket message to the client
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { session_id: String },
    /// Renderable session snapshot
    State { view: SessionView },
    /// Start the browser recognizer
    CaptureStart,
    /// Stop the browser recognizer
    CaptureStop,
    /// Inline user-facing message (validation/generation failures)
    Notice { message: String },
    /// Keep-alive response
    Pong,
}

/// Build the practice WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/practice", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// What one loop turn produced
enum Turn {
    Client(Option<String>),
    Closed,
    Pumped,
}

/// Handle one WebSocket connection
#[allow(clippy::too_many_lines)]
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    // Channel for messages flowing back to the client
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    // Capture prompts from the recognition engine toward the client
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<CaptureCommand>();
    // Recognition events from the client toward the session; replaced with
    // a fresh channel every time a course is generated
    let (mut rec_tx, _pre_session_rx) = mpsc::unbounded_channel::<RecognitionEvent>();

    if tx
        .send(ServerMessage::Connected {
            session_id: session_id.clone(),
        })
        .await
        .is_err()
    {
        return;
    }
    tracing::info!(session_id = %session_id, "practice WebSocket connected");

    // Forward outgoing messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Forward capture prompts
    let tx_for_commands = tx.clone();
    let mut command_task = tokio::spawn(async move {
        while let Some(command) = cmd_rx.recv().await {
            let msg = match command {
                CaptureCommand::Start => ServerMessage::CaptureStart,
                CaptureCommand::Stop => ServerMessage::CaptureStop,
            };
            if tx_for_commands.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut session: Option<PracticeSession> = None;

    loop {
        let turn = if let Some(active) = session.as_mut() {
            tokio::select! {
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => Turn::Client(Some(text.to_string())),
                    Some(Ok(Message::Close(_)) ) | None => Turn::Closed,
                    Some(Ok(_)) => Turn::Client(None),
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket receive error");
                        Turn::Closed
                    }
                },
                () = active.pump() => Turn::Pumped,
            }
        } else {
            match receiver.next().await {
                Some(Ok(Message::Text(text))) => Turn::Client(Some(text.to_string())),
                Some(Ok(Message::Close(_))) | None => Turn::Closed,
                Some(Ok(_)) => Turn::Client(None),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    Turn::Closed
                }
            }
        };

        match turn {
            Turn::Closed => break,
            Turn::Pumped => {
                push_state(&tx, session.as_ref()).await;
            }
            Turn::Client(None) => {}
            Turn::Client(Some(text)) => {
                let msg: ClientMessage = match serde_json::from_str(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        let _ = tx
                            .send(ServerMessage::Notice {
                                message: format!("unrecognized message: {e}"),
                            })
                            .await;
                        continue;
                    }
                };

                handle_message(msg, &state, &mut session, &cmd_tx, &mut rec_tx, &tx).await;
                push_state(&tx, session.as_ref()).await;
            }
        }
    }

    // Reset protocol on disconnect: stop streams, cancel timers
    if let Some(mut active) = session.take() {
        active.teardown();
    }
    send_task.abort();
    command_task.abort();
    tracing::info!(session_id = %session_id, "practice WebSocket closed");
}

/// Apply one client message to the session
async fn handle_message(
    msg: ClientMessage,
    state: &Arc<ApiState>,
    session: &mut Option<PracticeSession>,
    cmd_tx: &mpsc::UnboundedSender<CaptureCommand>,
    rec_tx: &mut mpsc::UnboundedSender<RecognitionEvent>,
    tx: &mpsc::Sender<ServerMessage>,
) {
    match msg {
        ClientMessage::Generate { input } => {
            let (new_tx, new_rx) = mpsc::unbounded_channel();
            match start_session(state, &input, cmd_tx, new_rx).await {
                Ok(new_session) => {
                    // Any prior session is torn down by drop
                    *session = Some(new_session);
                    *rec_tx = new_tx;
                }
                Err(e) => {
                    // Retryable: the client stays on the pre-generation screen
                    let message = match &e {
                        Error::Validation(m) => m.clone(),
                        other => format!("course generation failed: {other}"),
                    };
                    tracing::warn!(error = %e, "generation request failed");
                    let _ = tx.send(ServerMessage::Notice { message }).await;
                }
            }
        }
        ClientMessage::Play => {
            if let Some(active) = session.as_mut() {
                active.play().await;
            }
        }
        ClientMessage::StopAudio => {
            if let Some(active) = session.as_mut() {
                active.stop_playback();
            }
        }
        ClientMessage::RecordStart => {
            if let Some(active) = session.as_mut() {
                active.start_recording();
            }
        }
        ClientMessage::RecordStop => {
            if let Some(active) = session.as_mut() {
                active.stop_recording();
            }
        }
        ClientMessage::Next => {
            if let Some(active) = session.as_mut() {
                active.next();
            }
        }
        ClientMessage::Jump { index } => {
            if let Some(active) = session.as_mut() {
                active.jump(index);
            }
        }
        ClientMessage::WordClick { word } => {
            if let Some(active) = session.as_mut() {
                active.toggle_word(&word);
            }
        }
        ClientMessage::BackgroundClick => {
            if let Some(active) = session.as_mut() {
                active.close_popovers();
            }
        }
        ClientMessage::Recognition { event } => {
            // Through the channel so ordering matches the engine's view
            let _ = rec_tx.send(event);
        }
        ClientMessage::Ping => {
            let _ = tx.send(ServerMessage::Pong).await;
        }
    }
}

/// Validate input, generate the course, and assemble a session
async fn start_session(
    state: &Arc<ApiState>,
    input: &CourseInput,
    cmd_tx: &mpsc::UnboundedSender<CaptureCommand>,
    rec_rx: mpsc::UnboundedReceiver<RecognitionEvent>,
) -> crate::Result<PracticeSession> {
    input.validate()?;
    let levels = state.generator.generate(input).await?;

    let cache = Arc::new(MediaCache::new(
        Arc::clone(&state.synth),
        Arc::clone(&state.illustrator),
        state.config.audio_cache_size,
    ));

    PracticeSession::new(
        levels,
        cache,
        Arc::clone(&state.sink),
        Arc::clone(&state.fallback),
        Arc::clone(&state.critic),
        Box::new(ChannelRecognition::new(cmd_tx.clone())),
        rec_rx,
        state.config.session_config(),
    )
}

/// Push a snapshot when a session exists
async fn push_state(tx: &mpsc::Sender<ServerMessage>, session: Option<&PracticeSession>) {
    if let Some(active) = session {
        let _ = tx
            .send(ServerMessage::State {
                view: active.view(),
            })
            .await;
    }
}
