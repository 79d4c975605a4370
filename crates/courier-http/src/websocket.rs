//! WebSocket push channel for status events.
//!
//! Observers connect to `/ws/events` and receive every StatusEvent published
//! on the bus as `{topic, payload}` JSON. Delivery is best-effort: an
//! observer that falls behind skips ahead, and a closed socket simply drops
//! out of the observer set.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::SharedState;

/// Handler for GET /ws/events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.bus.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break; // observer went away
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("event stream observer lagged by {missed} events");
                }
                Err(RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {} // nothing inbound is meaningful
            },
        }
    }

    log::debug!("event stream observer disconnected");
}
