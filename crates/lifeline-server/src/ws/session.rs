//! WebSocket session lifecycle — one connected client from upgrade through
//! disconnect.
//!
//! Identity is taken from the upgrade request's query string; there is no
//! in-band identification step. A request without a `user_id` is rejected
//! before the upgrade happens.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use lifeline_core::{ClientRole, OutboundEvent};

use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;

use super::connection::{ClientConnection, ClientIdentity};
use super::relay::handle_message;

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// User the connection acts as. Required.
    pub user_id: i64,
    /// Declared role; unknown or missing values fall back to `user`.
    pub role: Option<String>,
}

/// GET /ws — upgrade to a relay session.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    if state.registry.connection_count().await >= state.config.max_connections {
        warn!(
            max = state.config.max_connections,
            "rejecting upgrade, connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    let identity = ClientIdentity {
        user_id: params.user_id,
        role: params
            .role
            .as_deref()
            .map_or(ClientRole::User, ClientRole::parse_or_default),
    };
    ws.on_upgrade(move |socket| run_ws_session(socket, identity, state))
}

/// Run a relay session for a connected client.
///
/// 1. Registers with the connection registry (which starts the heartbeat)
/// 2. Sends the `connected` event
/// 3. Forwards outbound frames and periodic Ping frames
/// 4. Relays inbound frames through [`handle_message`]
/// 5. Unregisters on disconnect, timeout, or shutdown
#[instrument(skip_all, fields(user_id = identity.user_id))]
pub async fn run_ws_session(ws: WebSocket, identity: ClientIdentity, state: AppState) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let client_id = format!("conn_{}", Uuid::now_v7());
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.config.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(client_id.clone(), identity, send_tx));
    let cancel = connection.cancel_token();

    let connection_start = std::time::Instant::now();
    info!(client_id, role = identity.role.as_str(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    state.registry.add(connection.clone()).await;

    // The connected event goes out before anything else can be relayed.
    let connected = OutboundEvent::connected(&client_id).to_json();
    if ws_tx.send(Message::Text(connected.into())).await.is_err() {
        state.registry.remove(&client_id).await;
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
        return;
    }

    // Outbound forwarder with periodic Ping frames.
    let ping_interval = Duration::from_secs(state.config.heartbeat_interval_secs);
    let outbound_cancel = cancel.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Inbound loop — ends on close frame, socket error, heartbeat timeout,
    // or server shutdown.
    let shutdown = state.shutdown.token();
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = cancel.cancelled() => break,
            () = shutdown.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    debug!(client_id, len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!(client_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        // Any parseable traffic also counts as liveness.
        connection.mark_alive();
        handle_message(&text, &connection, &state.registry, &state.store).await;
    }

    info!(client_id, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => "closed").increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
    outbound.abort();
    state.registry.remove(&client_id).await;
}
