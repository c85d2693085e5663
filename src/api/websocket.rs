use crate::api::rest::ApiState;
use crate::api::types::{TransferStatusResponse, WebSocketMessage};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use tokio::time::{interval, Duration};

/// Periodically pushes a `TransferStatus` snapshot for every active
/// transfer, in the same polling-push style as the rest of this crate's
/// status aggregation.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: WebSocket, state: ApiState) {
    let mut tick = interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let transfers: Vec<TransferStatusResponse> = state
                    .coordinator
                    .active_transfers()
                    .await
                    .into_iter()
                    .map(TransferStatusResponse::from)
                    .collect();

                let snapshot = WebSocketMessage::StatusSnapshot { transfers };
                let Ok(json) = serde_json::to_string(&snapshot) else { continue };
                if socket.send(Message::Text(json)).await.is_err() {
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => {}
                }
            }
        }
    }
}
