//! Domain records and lifecycle status enums.
//!
//! These are the public API shapes — the raw database row structs live in
//! `lifeline-store` and are converted here at the repository boundary.
//! All wire serialization is camelCase to match the client protocol.

use serde::{Deserialize, Serialize};

/// Status of an emergency alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Submitted but not yet picked up by a dispatcher.
    Pending,
    /// Live emergency, dispatch underway.
    Active,
    /// Resources assigned and responding.
    InProgress,
    /// Closed out.
    Resolved,
}

impl AlertStatus {
    /// Wire string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    /// Parse a wire string; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// Reported severity of an emergency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Non-urgent.
    Low,
    /// Default when the client reports nothing.
    Medium,
    /// Urgent.
    High,
    /// Life-threatening.
    Critical,
}

impl AlertSeverity {
    /// Wire string for this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a wire string; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Status of a dispatchable resource (ambulance, fire unit, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Free for assignment.
    Available,
    /// Assigned to an active emergency.
    InUse,
    /// Out of service.
    Maintenance,
}

impl ResourceStatus {
    /// Wire string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in_use",
            Self::Maintenance => "maintenance",
        }
    }

    /// Parse a wire string; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "in_use" => Some(Self::InUse),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// Lifecycle of a single resource assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Created by the dispatcher.
    Assigned,
    /// Resource is on its way.
    EnRoute,
    /// Resource arrived.
    OnScene,
    /// Assignment finished; resource released.
    Completed,
}

impl AssignmentStatus {
    /// Wire string for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::EnRoute => "en_route",
            Self::OnScene => "on_scene",
            Self::Completed => "completed",
        }
    }

    /// Parse a wire string; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assigned" => Some(Self::Assigned),
            "en_route" => Some(Self::EnRoute),
            "on_scene" => Some(Self::OnScene),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Role a client declares when its connection is established.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Citizen app.
    #[default]
    User,
    /// Ambulance / field unit.
    Responder,
    /// Dispatch console.
    Dispatcher,
    /// Administration console.
    Admin,
}

impl ClientRole {
    /// Wire string for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Responder => "responder",
            Self::Dispatcher => "dispatcher",
            Self::Admin => "admin",
        }
    }

    /// Parse a wire string, falling back to [`ClientRole::User`].
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "responder" => Self::Responder,
            "dispatcher" => Self::Dispatcher,
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

/// An immutable, append-only position fact. Corrections are new rows with
/// later timestamps — an existing row is never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    /// Row id.
    pub id: i64,
    /// The user or unit this position belongs to.
    pub subject_id: i64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters.
    pub accuracy: Option<f64>,
    /// Role of the reporting client at the time of the update.
    pub source: ClientRole,
    /// Server-side receive time, RFC 3339.
    pub recorded_at: String,
}

/// A citizen-submitted emergency with its dispatch lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    /// Alert id (`alert_` + UUIDv7).
    pub id: String,
    /// Submitting user.
    pub user_id: i64,
    /// Latitude of the incident.
    pub latitude: f64,
    /// Longitude of the incident.
    pub longitude: f64,
    /// Reported position accuracy in meters.
    pub accuracy: Option<f64>,
    /// Free-form incident category (medical, accident, fire, ...).
    pub emergency_type: String,
    /// Optional description from the submitter.
    pub description: Option<String>,
    /// Reported severity.
    pub severity: AlertSeverity,
    /// Current lifecycle status.
    pub status: AlertStatus,
    /// Ids of resources assigned so far.
    pub assigned_resource_ids: Vec<String>,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Last modification time, RFC 3339.
    pub updated_at: String,
    /// Resolution time, if resolved.
    pub resolved_at: Option<String>,
}

/// A dispatchable unit with a last-known position.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Resource id (`res_` + UUIDv7).
    pub id: String,
    /// Display name (callsign).
    pub name: String,
    /// Unit kind (ambulance, fire_engine, ...).
    pub kind: String,
    /// Current availability.
    pub status: ResourceStatus,
    /// Last-known latitude.
    pub latitude: f64,
    /// Last-known longitude.
    pub longitude: f64,
    /// Last modification time, RFC 3339.
    pub updated_at: String,
}

/// Link record associating one resource with one emergency alert.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAssignment {
    /// Assignment id (`asgn_` + UUIDv7).
    pub id: String,
    /// The alert this assignment belongs to.
    pub alert_id: String,
    /// The assigned resource.
    pub resource_id: String,
    /// Assignment lifecycle status.
    pub status: AssignmentStatus,
    /// Creation time, RFC 3339.
    pub assigned_at: String,
    /// Last status change, RFC 3339.
    pub updated_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_status_roundtrip() {
        for s in [
            AlertStatus::Pending,
            AlertStatus::Active,
            AlertStatus::InProgress,
            AlertStatus::Resolved,
        ] {
            assert_eq!(AlertStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn alert_status_rejects_unknown() {
        assert_eq!(AlertStatus::parse("cancelled"), None);
        assert_eq!(AlertStatus::parse(""), None);
    }

    #[test]
    fn severity_roundtrip() {
        for s in [
            AlertSeverity::Low,
            AlertSeverity::Medium,
            AlertSeverity::High,
            AlertSeverity::Critical,
        ] {
            assert_eq!(AlertSeverity::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn resource_status_roundtrip() {
        for s in [
            ResourceStatus::Available,
            ResourceStatus::InUse,
            ResourceStatus::Maintenance,
        ] {
            assert_eq!(ResourceStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn assignment_status_roundtrip() {
        for s in [
            AssignmentStatus::Assigned,
            AssignmentStatus::EnRoute,
            AssignmentStatus::OnScene,
            AssignmentStatus::Completed,
        ] {
            assert_eq!(AssignmentStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn role_falls_back_to_user() {
        assert_eq!(ClientRole::parse_or_default("dispatcher"), ClientRole::Dispatcher);
        assert_eq!(ClientRole::parse_or_default("robot"), ClientRole::User);
        assert_eq!(ClientRole::default(), ClientRole::User);
    }

    #[test]
    fn alert_serializes_camel_case() {
        let alert = EmergencyAlert {
            id: "alert_1".into(),
            user_id: 42,
            latitude: -1.2921,
            longitude: 36.8219,
            accuracy: Some(15.0),
            emergency_type: "medical".into(),
            description: None,
            severity: AlertSeverity::High,
            status: AlertStatus::Active,
            assigned_resource_ids: vec![],
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            resolved_at: None,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["userId"], 42);
        assert_eq!(json["emergencyType"], "medical");
        assert_eq!(json["status"], "active");
        assert_eq!(json["severity"], "high");
        assert!(json["assignedResourceIds"].as_array().unwrap().is_empty());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_value(AlertStatus::InProgress).unwrap();
        assert_eq!(json, "in_progress");
        let back: AlertStatus = serde_json::from_value(json).unwrap();
        assert_eq!(back, AlertStatus::InProgress);
    }
}
