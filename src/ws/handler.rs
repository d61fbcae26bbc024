use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::gateway::BroadcastGateway;
use crate::models::{ClientMessage, ConnectionId};
use crate::state::AppState;
use crate::utils::ScopeGuard;

/// WebSocket handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    info!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, state.gateway))
}

/// Drive one channel until either side closes it
async fn handle_socket(socket: WebSocket, gateway: Arc<BroadcastGateway>) {
    let (connection_id, mut outbox) = gateway.connect();

    // Membership is cleaned up however this function is left, including abort
    let cleanup_gateway = gateway.clone();
    let _cleanup = ScopeGuard::new(move || {
        cleanup_gateway.on_disconnect(connection_id);
    });

    let (mut sender, mut receiver) = socket.split();

    // Drain the connection's outbox into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", connection_id, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Read events from the socket, one at a time so a sender's events keep their order
    let reader_gateway = gateway.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_text(&reader_gateway, connection_id, &text),
                Ok(Message::Close(_)) => break,
                // Pings are answered by axum; binary frames carry nothing for us
                Ok(_) => continue,
                Err(e) => {
                    debug!("Socket error on {}: {}", connection_id, e);
                    break;
                }
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };
    info!("WebSocket connection {} terminated", connection_id);
}

fn handle_text(gateway: &BroadcastGateway, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => {
            debug!("Received message from {}: {:?}", connection_id, message);
            gateway.dispatch(connection_id, message);
        }
        Err(e) => warn!("Ignoring malformed message from {}: {}", connection_id, e),
    }
}
