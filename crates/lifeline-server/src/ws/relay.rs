//! Inbound message handling — validate, persist, fan out.
//!
//! Failures are answered with a unicast `error` event on the offending
//! connection; the connection itself stays open. A bad frame from one client
//! never interrupts delivery to the others.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use lifeline_core::{parse_inbound, AlertSeverity, InboundMessage, OutboundEvent};
use lifeline_store::{CreateAlertOptions, DispatchStore};

use crate::metrics::{EMERGENCY_BROADCASTS_TOTAL, LOCATION_UPDATES_TOTAL, RELAY_ERRORS_TOTAL};

use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;

/// Handle one inbound text frame from a client.
pub async fn handle_message(
    text: &str,
    connection: &Arc<ClientConnection>,
    registry: &ConnectionRegistry,
    store: &DispatchStore,
) {
    let message = match parse_inbound(text) {
        Ok(msg) => msg,
        Err(err) => {
            debug!(conn_id = %connection.id, error = %err, "rejected inbound frame");
            counter!(RELAY_ERRORS_TOTAL, "kind" => "protocol").increment(1);
            let _ = connection.send_event(&OutboundEvent::error(err.to_string()));
            return;
        }
    };

    match message {
        InboundMessage::LocationUpdate {
            id,
            latitude,
            longitude,
            accuracy,
            role,
        } => {
            if id != connection.identity.user_id {
                reject_identity(connection, id);
                return;
            }
            let role = role.unwrap_or(connection.identity.role);
            let store = store.clone();
            let Some(result) = run_store_task(connection, move || {
                store.record_location(id, latitude, longitude, accuracy, role)
            })
            .await
            else {
                return;
            };
            match result {
                Ok(update) => {
                    counter!(LOCATION_UPDATES_TOTAL).increment(1);
                    let event = OutboundEvent::location_update(
                        update.subject_id,
                        update.latitude,
                        update.longitude,
                        update.accuracy,
                        update.source,
                    );
                    registry.broadcast_except(&event, &connection.id).await;
                }
                Err(err) => reject_store(connection, &err),
            }
        }
        InboundMessage::EmergencyBroadcast {
            user_id,
            location,
            emergency_type,
            description,
            severity,
        } => {
            if user_id != connection.identity.user_id {
                reject_identity(connection, user_id);
                return;
            }
            let opts = CreateAlertOptions {
                user_id,
                latitude: location.latitude,
                longitude: location.longitude,
                accuracy: location.accuracy,
                emergency_type,
                description,
                severity,
            };
            let store = store.clone();
            let Some(result) = run_store_task(connection, move || store.create_alert(&opts)).await
            else {
                return;
            };
            match result {
                Ok(alert) => {
                    let severity = severity.unwrap_or(AlertSeverity::Medium);
                    counter!(EMERGENCY_BROADCASTS_TOTAL, "severity" => severity.as_str())
                        .increment(1);
                    // The sender hears its own emergency back as confirmation.
                    registry
                        .broadcast_all(&OutboundEvent::emergency_broadcast(alert))
                        .await;
                }
                Err(err) => reject_store(connection, &err),
            }
        }
    }
}

/// Run a store call on the blocking pool so SQLite work never stalls the
/// relay's async executor. A panicked task answers the sender and yields
/// `None`.
async fn run_store_task<T, F>(
    connection: &Arc<ClientConnection>,
    task: F,
) -> Option<Result<T, lifeline_store::StoreError>>
where
    F: FnOnce() -> Result<T, lifeline_store::StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => Some(result),
        Err(err) => {
            warn!(conn_id = %connection.id, error = %err, "store task failed");
            counter!(RELAY_ERRORS_TOTAL, "kind" => "store").increment(1);
            let _ = connection.send_event(&OutboundEvent::error("internal error"));
            None
        }
    }
}

fn reject_identity(connection: &Arc<ClientConnection>, claimed: i64) {
    warn!(
        conn_id = %connection.id,
        bound = connection.identity.user_id,
        claimed,
        "message user id does not match bound identity"
    );
    counter!(RELAY_ERRORS_TOTAL, "kind" => "identity").increment(1);
    let _ = connection.send_event(&OutboundEvent::error(format!(
        "user id {claimed} does not match this connection"
    )));
}

fn reject_store(connection: &Arc<ClientConnection>, err: &lifeline_store::StoreError) {
    warn!(conn_id = %connection.id, error = %err, "persistence failed for inbound frame");
    counter!(RELAY_ERRORS_TOTAL, "kind" => "store").increment(1);
    let _ = connection.send_event(&OutboundEvent::error(err.to_string()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
