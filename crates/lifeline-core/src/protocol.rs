//! The relay wire protocol.
//!
//! Every frame is a JSON object with a `type` discriminator. Two inbound
//! types are meaningful (`location_update` and `emergency_broadcast`, the
//! latter also accepted under its older `emergency_alert` tag); everything
//! else is a parse error answered with a unicast `error` event.
//!
//! Outbound events are constructed through [`OutboundEvent`] so the relay,
//! the REST handlers, and the tests all produce identical shapes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;
use crate::types::{AlertStatus, AlertSeverity, ClientRole, EmergencyAlert};

/// Errors produced while parsing or validating an inbound frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or was missing a required field.
    #[error("invalid message: {0}")]
    Json(String),
    /// A numeric field was outside its legal range (or non-finite).
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Which field failed validation.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
    /// A required string field was present but empty.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Which field was empty.
        field: &'static str,
    },
}

/// A message received from a client over the WebSocket.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Position report for a user or unit.
    LocationUpdate {
        /// Subject the position belongs to (must match the bound identity).
        id: i64,
        /// Latitude in decimal degrees.
        latitude: f64,
        /// Longitude in decimal degrees.
        longitude: f64,
        /// Horizontal accuracy in meters.
        #[serde(default)]
        accuracy: Option<f64>,
        /// Role tag; defaults to the connection's bound role when absent.
        #[serde(default)]
        role: Option<ClientRole>,
    },
    /// Citizen-initiated emergency submission.
    #[serde(alias = "emergency_alert")]
    EmergencyBroadcast {
        /// Submitting user (must match the bound identity).
        #[serde(rename = "userId")]
        user_id: i64,
        /// Incident position.
        location: GeoPoint,
        /// Incident category (medical, accident, fire, ...).
        #[serde(rename = "emergencyType")]
        emergency_type: String,
        /// Optional free-form description.
        #[serde(default)]
        description: Option<String>,
        /// Reported severity; defaults to medium when absent.
        #[serde(default)]
        severity: Option<AlertSeverity>,
    },
}

/// Parse and validate one inbound frame.
///
/// Shape errors (bad JSON, unknown tag, missing field) and range errors both
/// surface as [`ProtocolError`] — the caller answers either with a unicast
/// `error` event and leaves the connection open.
pub fn parse_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    let msg: InboundMessage =
        serde_json::from_str(text).map_err(|e| ProtocolError::Json(e.to_string()))?;
    match &msg {
        InboundMessage::LocationUpdate {
            latitude,
            longitude,
            accuracy,
            ..
        } => {
            let point = GeoPoint {
                latitude: *latitude,
                longitude: *longitude,
                accuracy: *accuracy,
            };
            point.validate()?;
        }
        InboundMessage::EmergencyBroadcast {
            location,
            emergency_type,
            ..
        } => {
            location.validate()?;
            if emergency_type.trim().is_empty() {
                return Err(ProtocolError::EmptyField {
                    field: "emergencyType",
                });
            }
        }
    }
    Ok(msg)
}

/// Payload of a rebroadcast `location_update` event.
#[derive(Clone, Debug, Serialize)]
pub struct LocationEventData {
    /// Subject the position belongs to.
    pub id: i64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: Option<f64>,
    /// Role of the reporting client.
    pub role: ClientRole,
    /// Server receive time, RFC 3339.
    pub timestamp: String,
}

/// Payload of an `emergency_status_update` event.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateData {
    /// The alert whose status changed.
    pub alert_id: String,
    /// New status.
    pub status: AlertStatus,
    /// Assigned resource ids after the change.
    pub assigned_resource_ids: Vec<String>,
    /// Resolution time, once the alert is resolved.
    pub resolved_at: Option<String>,
    /// When the change was recorded, RFC 3339.
    pub timestamp: String,
}

/// An event the relay sends to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Sent once, immediately after the upgrade.
    Connected {
        /// Connection id and server time.
        data: ConnectedData,
    },
    /// Normalized position rebroadcast (sender excluded).
    LocationUpdate {
        /// Normalized position fields.
        data: LocationEventData,
    },
    /// Full persisted alert, fanned out to every open connection.
    EmergencyBroadcast {
        /// The persisted alert record.
        data: EmergencyAlert,
    },
    /// Status/assignment change produced by the REST surface.
    EmergencyStatusUpdate {
        /// Change summary.
        data: StatusUpdateData,
    },
    /// Unicast validation or persistence failure reply.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Payload of the `connected` event.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    /// The id assigned to this connection.
    pub client_id: String,
    /// Server time, RFC 3339.
    pub timestamp: String,
}

impl OutboundEvent {
    /// Build the post-upgrade `connected` event.
    pub fn connected(client_id: &str) -> Self {
        Self::Connected {
            data: ConnectedData {
                client_id: client_id.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Build a normalized `location_update` rebroadcast with server time.
    pub fn location_update(
        subject_id: i64,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        role: ClientRole,
    ) -> Self {
        Self::LocationUpdate {
            data: LocationEventData {
                id: subject_id,
                latitude,
                longitude,
                accuracy,
                role,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Build an `emergency_broadcast` carrying the persisted alert.
    pub fn emergency_broadcast(alert: EmergencyAlert) -> Self {
        Self::EmergencyBroadcast { data: alert }
    }

    /// Build an `emergency_status_update` from the updated alert.
    pub fn emergency_status_update(alert: &EmergencyAlert) -> Self {
        Self::EmergencyStatusUpdate {
            data: StatusUpdateData {
                alert_id: alert.id.clone(),
                status: alert.status,
                assigned_resource_ids: alert.assigned_resource_ids.clone(),
                resolved_at: alert.resolved_at.clone(),
                timestamp: alert.updated_at.clone(),
            },
        }
    }

    /// Build a unicast `error` reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to the wire string.
    ///
    /// Serialization of these shapes cannot fail in practice; a failure is
    /// reported as an empty-object frame rather than a panic.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_location_update() {
        let msg = parse_inbound(
            r#"{"type":"location_update","id":42,"latitude":-1.2921,"longitude":36.8219,"accuracy":15,"role":"user"}"#,
        )
        .unwrap();
        assert_matches!(
            msg,
            InboundMessage::LocationUpdate {
                id: 42,
                accuracy: Some(a),
                role: Some(ClientRole::User),
                ..
            } if (a - 15.0).abs() < f64::EPSILON
        );
    }

    #[test]
    fn location_update_without_optionals() {
        let msg = parse_inbound(
            r#"{"type":"location_update","id":7,"latitude":0.5,"longitude":1.5}"#,
        )
        .unwrap();
        assert_matches!(
            msg,
            InboundMessage::LocationUpdate {
                id: 7,
                accuracy: None,
                role: None,
                ..
            }
        );
    }

    #[test]
    fn missing_latitude_is_a_json_error() {
        let err = parse_inbound(r#"{"type":"location_update","id":42,"longitude":36.8}"#)
            .unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn non_numeric_latitude_is_a_json_error() {
        let err = parse_inbound(
            r#"{"type":"location_update","id":42,"latitude":"north","longitude":36.8}"#,
        )
        .unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn out_of_range_latitude_rejected() {
        let err = parse_inbound(
            r#"{"type":"location_update","id":42,"latitude":95.0,"longitude":36.8}"#,
        )
        .unwrap_err();
        assert_matches!(err, ProtocolError::OutOfRange { field: "latitude", .. });
    }

    #[test]
    fn parses_emergency_broadcast() {
        let msg = parse_inbound(
            r#"{"type":"emergency_broadcast","userId":42,"location":{"latitude":-1.3,"longitude":36.8,"accuracy":20},"emergencyType":"medical","description":"chest pain","severity":"critical"}"#,
        )
        .unwrap();
        assert_matches!(
            msg,
            InboundMessage::EmergencyBroadcast {
                user_id: 42,
                severity: Some(AlertSeverity::Critical),
                ..
            }
        );
    }

    #[test]
    fn emergency_alert_tag_alias_accepted() {
        let msg = parse_inbound(
            r#"{"type":"emergency_alert","userId":9,"location":{"latitude":1.0,"longitude":2.0},"emergencyType":"accident"}"#,
        )
        .unwrap();
        assert_matches!(msg, InboundMessage::EmergencyBroadcast { user_id: 9, .. });
    }

    #[test]
    fn emergency_broadcast_missing_user_rejected() {
        let err = parse_inbound(
            r#"{"type":"emergency_broadcast","location":{"latitude":1.0,"longitude":2.0},"emergencyType":"fire"}"#,
        )
        .unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn emergency_broadcast_empty_type_rejected() {
        let err = parse_inbound(
            r#"{"type":"emergency_broadcast","userId":1,"location":{"latitude":1.0,"longitude":2.0},"emergencyType":"  "}"#,
        )
        .unwrap_err();
        assert_matches!(err, ProtocolError::EmptyField { field: "emergencyType" });
    }

    #[test]
    fn unknown_type_tag_rejected() {
        let err = parse_inbound(r#"{"type":"chat_message","text":"hi"}"#).unwrap_err();
        assert_matches!(err, ProtocolError::Json(_));
    }

    #[test]
    fn not_json_rejected() {
        assert!(parse_inbound("not json at all").is_err());
        assert!(parse_inbound("").is_err());
        assert!(parse_inbound("[1,2,3]").is_err());
    }

    #[test]
    fn location_event_shape_matches_wire_contract() {
        let event =
            OutboundEvent::location_update(42, -1.2921, 36.8219, Some(15.0), ClientRole::User);
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "location_update");
        assert_eq!(json["data"]["id"], 42);
        assert!((json["data"]["latitude"].as_f64().unwrap() + 1.2921).abs() < 1e-9);
        assert!((json["data"]["longitude"].as_f64().unwrap() - 36.8219).abs() < 1e-9);
        assert_eq!(json["data"]["accuracy"], 15.0);
        assert_eq!(json["data"]["role"], "user");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn error_event_shape() {
        let event = OutboundEvent::error("latitude out of range: 95");
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "latitude out of range: 95");
    }

    #[test]
    fn connected_event_shape() {
        let event = OutboundEvent::connected("conn_1");
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["data"]["clientId"], "conn_1");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn status_update_event_shape() {
        let alert = EmergencyAlert {
            id: "alert_1".into(),
            user_id: 42,
            latitude: 1.0,
            longitude: 2.0,
            accuracy: None,
            emergency_type: "medical".into(),
            description: None,
            severity: AlertSeverity::Medium,
            status: AlertStatus::InProgress,
            assigned_resource_ids: vec!["res_a".into(), "res_b".into()],
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:05:00Z".into(),
            resolved_at: None,
        };
        let event = OutboundEvent::emergency_status_update(&alert);
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["type"], "emergency_status_update");
        assert_eq!(json["data"]["alertId"], "alert_1");
        assert_eq!(json["data"]["status"], "in_progress");
        assert_eq!(json["data"]["assignedResourceIds"][1], "res_b");
        assert!(json["data"]["resolvedAt"].is_null());
        assert_eq!(json["data"]["timestamp"], "2026-01-01T00:05:00Z");
    }

    #[test]
    fn status_update_carries_resolution_time() {
        let alert = EmergencyAlert {
            id: "alert_2".into(),
            user_id: 7,
            latitude: 1.0,
            longitude: 2.0,
            accuracy: None,
            emergency_type: "fire".into(),
            description: None,
            severity: AlertSeverity::High,
            status: AlertStatus::Resolved,
            assigned_resource_ids: vec![],
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T01:00:00Z".into(),
            resolved_at: Some("2026-01-01T01:00:00Z".into()),
        };
        let event = OutboundEvent::emergency_status_update(&alert);
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(json["data"]["alertId"], "alert_2");
        assert_eq!(json["data"]["status"], "resolved");
        assert_eq!(json["data"]["resolvedAt"], "2026-01-01T01:00:00Z");
    }
}
