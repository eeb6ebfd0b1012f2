//! Log streaming over WebSocket
//!
//! Subscribers receive every log entry emitted after they connect, as JSON
//! text frames, optionally filtered to a single run. Entries are totally
//! ordered per run; slow subscribers that fall behind the broadcast buffer
//! miss the skipped entries and keep receiving from the current position.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    /// Restrict the stream to one run
    #[serde(default)]
    pub run_id: Option<Uuid>,
}

pub async fn logs_subscription(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| stream_logs(socket, state, query.run_id))
}

async fn stream_logs(mut socket: WebSocket, state: AppState, run_filter: Option<Uuid>) {
    let mut entries = state.logs.subscribe();

    loop {
        tokio::select! {
            entry = entries.recv() => {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "log subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if let Some(filter) = run_filter {
                    if entry.run_id != Some(filter) {
                        continue;
                    }
                }

                let text = match serde_json::to_string(&entry) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
