// WebSocket live feed: every newly captured record, as JSON.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::Record;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_latest(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.live_tx.subscribe();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_latest(socket, rx).await {
            tracing::info!("Live stream error: {}", e);
        }
    })
}

async fn stream_latest(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<Arc<Record>>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to live stream");
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                let record = match result {
                    Ok(r) => r,
                    // slow client: drop what it missed and carry on with the newest
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "live stream client lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let json = serde_json::to_string(record.as_ref())?;
                if !send(&mut socket, Message::Text(json.into())).await {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !send(&mut socket, Message::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    tracing::info!("Client disconnected from live stream");
    Ok(())
}

/// False when the client is gone or too slow to take the message.
async fn send(socket: &mut WebSocket, msg: Message) -> bool {
    matches!(timeout(WS_SEND_TIMEOUT, socket.send(msg)).await, Ok(Ok(())))
}
