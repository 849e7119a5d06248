//! Alert repository — the single creation path for emergency alerts.
//!
//! Both the relay's `emergency_broadcast` handler and the REST endpoint go
//! through [`AlertRepo::create`], so there is exactly one validation and
//! default-status policy for new alerts.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use lifeline_core::{AlertSeverity, AlertStatus, EmergencyAlert};

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::AlertRow;

/// Fields for a new alert. Status is not a caller choice — every new alert
/// starts out `active`.
pub struct NewAlert<'a> {
    /// Submitting user.
    pub user_id: i64,
    /// Incident latitude.
    pub latitude: f64,
    /// Incident longitude.
    pub longitude: f64,
    /// Position accuracy in meters.
    pub accuracy: Option<f64>,
    /// Incident category.
    pub emergency_type: &'a str,
    /// Optional description.
    pub description: Option<&'a str>,
    /// Severity; `None` defaults to medium.
    pub severity: Option<AlertSeverity>,
}

/// Status every newly created alert starts in.
const DEFAULT_STATUS: AlertStatus = AlertStatus::Active;

/// Alert repository — stateless, every method takes `&Connection`.
pub struct AlertRepo;

impl AlertRepo {
    /// Create a new alert with the default status and an empty assignment
    /// list.
    pub fn create(conn: &Connection, new: &NewAlert<'_>) -> Result<EmergencyAlert> {
        let id = format!("alert_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let severity = new.severity.unwrap_or(AlertSeverity::Medium);

        let _ = conn.execute(
            "INSERT INTO emergency_alerts
             (id, user_id, latitude, longitude, accuracy, emergency_type, description,
              severity, status, assigned_resource_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '[]', ?10, ?10)",
            params![
                id,
                new.user_id,
                new.latitude,
                new.longitude,
                new.accuracy,
                new.emergency_type,
                new.description,
                severity.as_str(),
                DEFAULT_STATUS.as_str(),
                now,
            ],
        )?;

        Ok(EmergencyAlert {
            id,
            user_id: new.user_id,
            latitude: new.latitude,
            longitude: new.longitude,
            accuracy: new.accuracy,
            emergency_type: new.emergency_type.to_string(),
            description: new.description.map(String::from),
            severity,
            status: DEFAULT_STATUS,
            assigned_resource_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            resolved_at: None,
        })
    }

    /// Fetch one alert by id.
    pub fn get(conn: &Connection, id: &str) -> Result<EmergencyAlert> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM emergency_alerts WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::AlertNotFound(id.to_string()))?
            .into_alert()
    }

    /// Update an alert's status; resolving records `resolved_at`.
    ///
    /// Transition legality is not enforced — only status values unknown to
    /// the schema are rejected (by the CHECK constraint and the enum).
    pub fn set_status(
        conn: &Connection,
        id: &str,
        status: AlertStatus,
    ) -> Result<EmergencyAlert> {
        let now = chrono::Utc::now().to_rfc3339();
        let resolved_at = (status == AlertStatus::Resolved).then(|| now.clone());
        let changed = conn.execute(
            "UPDATE emergency_alerts
             SET status = ?2, updated_at = ?3,
                 resolved_at = COALESCE(?4, resolved_at)
             WHERE id = ?1",
            params![id, status.as_str(), now, resolved_at],
        )?;
        if changed == 0 {
            return Err(StoreError::AlertNotFound(id.to_string()));
        }
        Self::get(conn, id)
    }

    /// Append resource ids to the alert's assigned list (deduplicated).
    pub fn append_assigned_resources(
        conn: &Connection,
        id: &str,
        resource_ids: &[String],
    ) -> Result<EmergencyAlert> {
        let alert = Self::get(conn, id)?;
        let mut ids = alert.assigned_resource_ids;
        for rid in resource_ids {
            if !ids.contains(rid) {
                ids.push(rid.clone());
            }
        }
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "UPDATE emergency_alerts
             SET assigned_resource_ids = ?2, updated_at = ?3
             WHERE id = ?1",
            params![id, serde_json::to_string(&ids)?, now],
        )?;
        Self::get(conn, id)
    }

    /// List alerts, newest first, optionally filtered by status.
    pub fn list(
        conn: &Connection,
        status: Option<AlertStatus>,
        limit: i64,
    ) -> Result<Vec<EmergencyAlert>> {
        let mut out = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM emergency_alerts
                     WHERE status = ?1
                     ORDER BY created_at DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![status.as_str(), limit], map_row)?;
                for row in rows {
                    out.push(row?.into_alert()?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM emergency_alerts
                     ORDER BY created_at DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], map_row)?;
                for row in rows {
                    out.push(row?.into_alert()?);
                }
            }
        }
        Ok(out)
    }
}

const COLUMNS: &str = "id, user_id, latitude, longitude, accuracy, emergency_type, \
                       description, severity, status, assigned_resource_ids, \
                       created_at, updated_at, resolved_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        accuracy: row.get(4)?,
        emergency_type: row.get(5)?,
        description: row.get(6)?,
        severity: row.get(7)?,
        status: row.get(8)?,
        assigned_resource_ids: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        resolved_at: row.get(12)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
