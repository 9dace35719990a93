use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use engine::SignalHandle;

use crate::AppState;

/// Text command that asks for the latest signals.
const GET_SIGNALS: &str = "get_signals";
const SNAPSHOT_SIZE: usize = 10;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// Message pushed to WebSocket clients.
#[derive(Serialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: T,
    timestamp: String,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn new(kind: &'static str, data: T) -> Self {
        Self {
            kind,
            data,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                warn!(error = %e, "Failed to encode WebSocket message");
                None
            }
        }
    }
}

/// WebSocket endpoint that pushes every new signal and answers `get_signals`.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let signals = state.signals.clone();
    ws.on_upgrade(move |socket| handle_ws(socket, signals))
}

/// Each client runs in its own task, so a slow or broken socket only
/// affects itself.
async fn handle_ws(mut socket: WebSocket, signals: SignalHandle) {
    let mut signal_rx = signals.subscribe();
    debug!("WebSocket client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text.trim() == GET_SIGNALS => {
                        let recent = signals.recent_signals(SNAPSHOT_SIZE).await;
                        if let Some(msg) = Envelope::new("signals", recent).to_message() {
                            if socket.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                }
            }

            pushed = signal_rx.recv() => {
                match pushed {
                    Ok(signal) => {
                        if let Some(msg) = Envelope::new("new_signal", signal).to_message() {
                            if socket.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(dropped = n, "WebSocket client lagged behind signal stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("WebSocket client disconnected");
}
