//! Price stream: one task per subscriber, pushing full table snapshots.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::select;
use tokio::sync::broadcast::error::RecvError;

use crate::api::routes::AppState;
use crate::feed::PriceSnapshot;

// WebSocket handler - accepts upgrade and handles the connection
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut updates = state.feed.subscribe();

    // Initial snapshot; nothing is sent while the table is still empty.
    if let Some(snapshot) = state.feed.snapshot().await {
        if send_snapshot(&mut socket, &snapshot).await.is_err() {
            return;
        }
    }

    loop {
        select! {
            result = updates.recv() => {
                match result {
                    Ok(snapshot) => {
                        // A failed send drops the subscriber; the receiver is
                        // released when this task returns.
                        if send_snapshot(&mut socket, &snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "price stream subscriber lagging");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    // Clients only listen; ignore anything else they send.
                    _ => {}
                }
            }
        }
    }
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: &PriceSnapshot) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(snapshot.as_ref()) {
        Ok(json) => json,
        Err(_) => return Ok(()),
    };
    socket.send(Message::Text(json.into())).await
}
