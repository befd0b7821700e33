//! Change notifications over WebSocket.
//!
//! Clients connecting to `/.notifications` first receive a `Connected` event
//! and then one `ResourceModified` event per resource any request modifies.

use crate::state::{AppState, Event};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

/// Path of the notification socket.
pub const NOTIFICATIONS_PATH: &str = "/.notifications";

pub fn router() -> Router<AppState> {
    Router::new().route(NOTIFICATIONS_PATH, get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!(client_id = %client_id, "Notification client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.broadcaster.subscribe();

    let hello = Event::Connected {
        client_id: client_id.clone(),
    };
    if let Err(e) = sender.send(Message::Text(hello.to_json().into())).await {
        error!(client_id = %client_id, "Failed to greet client: {}", e);
        state.broadcaster.unsubscribe();
        return;
    }

    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if sender
                        .send(Message::Text(event.to_json().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification client lagging, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!(client_id = %client_id, "Received: {}", text.as_str());
                if text.as_str() == "ping" {
                    state.broadcaster.broadcast(Event::Ping);
                }
            }
            Ok(Message::Close(_)) => {
                info!(client_id = %client_id, "Notification client closed");
                break;
            }
            Err(e) => {
                error!(client_id = %client_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.broadcaster.unsubscribe();
    info!(client_id = %client_id, "Notification client disconnected");
}
