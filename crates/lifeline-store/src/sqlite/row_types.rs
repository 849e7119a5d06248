//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape — not the public API types.
//! Conversion to the public types in `lifeline-core` (status strings parsed
//! into enums, JSON list columns decoded) happens in the repository layer.

use lifeline_core::{
    AlertSeverity, AlertStatus, AssignmentStatus, ClientRole, EmergencyAlert, LocationUpdate,
    Resource, ResourceAssignment, ResourceStatus,
};

use crate::errors::{Result, StoreError};

/// Raw row from the `location_updates` table.
#[derive(Clone, Debug)]
pub struct LocationRow {
    /// Row id.
    pub id: i64,
    /// Subject id.
    pub subject_id: i64,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Accuracy in meters.
    pub accuracy: Option<f64>,
    /// Reporting role string.
    pub source: String,
    /// Receive timestamp.
    pub recorded_at: String,
}

impl LocationRow {
    /// Convert to the public type. The role string is tolerant (unknown
    /// roles fall back to `user`), matching what was accepted on ingest.
    pub fn into_update(self) -> LocationUpdate {
        LocationUpdate {
            id: self.id,
            subject_id: self.subject_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            source: ClientRole::parse_or_default(&self.source),
            recorded_at: self.recorded_at,
        }
    }
}

/// Raw row from the `emergency_alerts` table.
#[derive(Clone, Debug)]
pub struct AlertRow {
    /// Alert id.
    pub id: String,
    /// Submitting user id.
    pub user_id: i64,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Accuracy in meters.
    pub accuracy: Option<f64>,
    /// Incident category.
    pub emergency_type: String,
    /// Description.
    pub description: Option<String>,
    /// Severity string.
    pub severity: String,
    /// Status string.
    pub status: String,
    /// Assigned resource ids as a JSON array string.
    pub assigned_resource_ids: String,
    /// Creation timestamp.
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
    /// Resolution timestamp.
    pub resolved_at: Option<String>,
}

impl AlertRow {
    /// Convert to the public type; status/severity strings and the JSON
    /// list column must be well formed (the schema CHECKs them on write).
    pub fn into_alert(self) -> Result<EmergencyAlert> {
        let status = AlertStatus::parse(&self.status)
            .ok_or_else(|| StoreError::CorruptRow(format!("alert status: {}", self.status)))?;
        let severity = AlertSeverity::parse(&self.severity)
            .ok_or_else(|| StoreError::CorruptRow(format!("alert severity: {}", self.severity)))?;
        let assigned_resource_ids: Vec<String> =
            serde_json::from_str(&self.assigned_resource_ids)?;
        Ok(EmergencyAlert {
            id: self.id,
            user_id: self.user_id,
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            emergency_type: self.emergency_type,
            description: self.description,
            severity,
            status,
            assigned_resource_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
            resolved_at: self.resolved_at,
        })
    }
}

/// Raw row from the `resources` table.
#[derive(Clone, Debug)]
pub struct ResourceRow {
    /// Resource id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unit kind.
    pub kind: String,
    /// Status string.
    pub status: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Last modification timestamp.
    pub updated_at: String,
}

impl ResourceRow {
    /// Convert to the public type.
    pub fn into_resource(self) -> Result<Resource> {
        let status = ResourceStatus::parse(&self.status)
            .ok_or_else(|| StoreError::CorruptRow(format!("resource status: {}", self.status)))?;
        Ok(Resource {
            id: self.id,
            name: self.name,
            kind: self.kind,
            status,
            latitude: self.latitude,
            longitude: self.longitude,
            updated_at: self.updated_at,
        })
    }
}

/// Raw row from the `resource_assignments` table.
#[derive(Clone, Debug)]
pub struct AssignmentRow {
    /// Assignment id.
    pub id: String,
    /// Alert id.
    pub alert_id: String,
    /// Resource id.
    pub resource_id: String,
    /// Status string.
    pub status: String,
    /// Creation timestamp.
    pub assigned_at: String,
    /// Last status change timestamp.
    pub updated_at: String,
}

impl AssignmentRow {
    /// Convert to the public type.
    pub fn into_assignment(self) -> Result<ResourceAssignment> {
        let status = AssignmentStatus::parse(&self.status).ok_or_else(|| {
            StoreError::CorruptRow(format!("assignment status: {}", self.status))
        })?;
        Ok(ResourceAssignment {
            id: self.id,
            alert_id: self.alert_id,
            resource_id: self.resource_id,
            status,
            assigned_at: self.assigned_at,
            updated_at: self.updated_at,
        })
    }
}
