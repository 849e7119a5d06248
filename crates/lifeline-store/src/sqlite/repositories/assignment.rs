//! Assignment repository — links between alerts and dispatched resources.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use lifeline_core::{AssignmentStatus, ResourceAssignment};

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::AssignmentRow;

/// Assignment repository — stateless, every method takes `&Connection`.
pub struct AssignmentRepo;

impl AssignmentRepo {
    /// Record a new assignment in the `assigned` state.
    ///
    /// The schema's UNIQUE (`alert_id`, `resource_id`) constraint rejects a
    /// second assignment of the same resource to the same alert.
    pub fn create(
        conn: &Connection,
        alert_id: &str,
        resource_id: &str,
    ) -> Result<ResourceAssignment> {
        let id = format!("asgn_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO resource_assignments
             (id, alert_id, resource_id, status, assigned_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id,
                alert_id,
                resource_id,
                AssignmentStatus::Assigned.as_str(),
                now
            ],
        )?;
        Ok(ResourceAssignment {
            id,
            alert_id: alert_id.to_string(),
            resource_id: resource_id.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_at: now.clone(),
            updated_at: now,
        })
    }

    /// Fetch one assignment by id.
    pub fn get(conn: &Connection, id: &str) -> Result<ResourceAssignment> {
        let row = conn
            .query_row(
                "SELECT id, alert_id, resource_id, status, assigned_at, updated_at
                 FROM resource_assignments WHERE id = ?1",
                params![id],
                map_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::AssignmentNotFound(id.to_string()))?
            .into_assignment()
    }

    /// All assignments for an alert, oldest first.
    pub fn list_for_alert(conn: &Connection, alert_id: &str) -> Result<Vec<ResourceAssignment>> {
        let mut stmt = conn.prepare(
            "SELECT id, alert_id, resource_id, status, assigned_at, updated_at
             FROM resource_assignments
             WHERE alert_id = ?1
             ORDER BY assigned_at, id",
        )?;
        let rows = stmt.query_map(params![alert_id], map_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_assignment()?);
        }
        Ok(out)
    }

    /// Advance an assignment's lifecycle status.
    pub fn set_status(
        conn: &Connection,
        id: &str,
        status: AssignmentStatus,
    ) -> Result<ResourceAssignment> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE resource_assignments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now],
        )?;
        if changed == 0 {
            return Err(StoreError::AssignmentNotFound(id.to_string()));
        }
        Self::get(conn, id)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        id: row.get(0)?,
        alert_id: row.get(1)?,
        resource_id: row.get(2)?,
        status: row.get(3)?,
        assigned_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
