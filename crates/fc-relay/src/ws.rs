//! WebSocket gateway for relay peers.
//!
//! Each binary message is one protobuf `Envelope`. Decoded envelopes go to the
//! [`Hub`](crate::hub::Hub); whatever the hub queues for the peer is encoded
//! and written back by a dedicated send task.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use prost::Message as ProstMessage;
use tokio::sync::mpsc;
use uuid::Uuid;

use fc_protocol::Envelope;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(relay_ws_handler))
        .with_state(state)
}

/// Relay WebSocket upgrade.
pub async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let peer_id = Uuid::new_v4();
    let max_bytes = state.config.relay.max_message_bytes;

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    // Forward channel → WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let buf = envelope.encode_to_vec();
            if ws_sender.send(Message::Binary(buf.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    state.hub.join(peer_id, tx);

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => {
                if data.len() > max_bytes {
                    tracing::warn!(%peer_id, bytes = data.len(), max_bytes, "Dropping oversized message");
                    continue;
                }
                match Envelope::decode(data.as_ref()) {
                    Ok(envelope) => {
                        tracing::trace!(%peer_id, kind = envelope.kind(), "Envelope received");
                        state.hub.handle(peer_id, envelope);
                    }
                    Err(e) => {
                        tracing::warn!(%peer_id, "Failed to decode peer protobuf: {}", e);
                    }
                }
            }
            Ok(Message::Text(_)) => {
                tracing::debug!(%peer_id, "Ignoring text frame");
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(%peer_id, "WebSocket read error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    state.hub.leave(&peer_id);
    send_task.abort();
    tracing::info!(%peer_id, "Relay WebSocket disconnected");
}
