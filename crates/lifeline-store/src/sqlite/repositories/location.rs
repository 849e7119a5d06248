//! Location repository — append-only position history.
//!
//! Rows are never updated or corrected in place; a correction is a new row
//! with a later `recorded_at`.

use rusqlite::{params, Connection, OptionalExtension};

use lifeline_core::{ClientRole, LocationUpdate};

use crate::errors::Result;
use crate::sqlite::row_types::LocationRow;

/// Location repository — stateless, every method takes `&Connection`.
pub struct LocationRepo;

impl LocationRepo {
    /// Append a position fact and return the persisted row.
    pub fn insert(
        conn: &Connection,
        subject_id: i64,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        source: ClientRole,
    ) -> Result<LocationUpdate> {
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO location_updates
             (subject_id, latitude, longitude, accuracy, source, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                subject_id,
                latitude,
                longitude,
                accuracy,
                source.as_str(),
                recorded_at
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(LocationUpdate {
            id,
            subject_id,
            latitude,
            longitude,
            accuracy,
            source,
            recorded_at,
        })
    }

    /// Most recent positions for a subject, newest first.
    pub fn list_for_subject(
        conn: &Connection,
        subject_id: i64,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>> {
        let mut stmt = conn.prepare(
            "SELECT id, subject_id, latitude, longitude, accuracy, source, recorded_at
             FROM location_updates
             WHERE subject_id = ?1
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![subject_id, limit], map_row)?;
        let mut updates = Vec::new();
        for row in rows {
            updates.push(row?.into_update());
        }
        Ok(updates)
    }

    /// Latest known position for a subject, if any.
    pub fn latest_for_subject(
        conn: &Connection,
        subject_id: i64,
    ) -> Result<Option<LocationUpdate>> {
        let row = conn
            .query_row(
                "SELECT id, subject_id, latitude, longitude, accuracy, source, recorded_at
                 FROM location_updates
                 WHERE subject_id = ?1
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
                params![subject_id],
                map_row,
            )
            .optional()?;
        Ok(row.map(LocationRow::into_update))
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocationRow> {
    Ok(LocationRow {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        accuracy: row.get(4)?,
        source: row.get(5)?,
        recorded_at: row.get(6)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::connection::{new_in_memory, ConnectionConfig, ConnectionPool};
    use crate::sqlite::migrations::run_migrations;

    fn test_pool() -> ConnectionPool {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = run_migrations(&conn).unwrap();
        }
        pool
    }

    #[test]
    fn insert_returns_persisted_fields() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let update = LocationRepo::insert(
            &conn,
            42,
            -1.2921,
            36.8219,
            Some(15.0),
            ClientRole::User,
        )
        .unwrap();
        assert!(update.id > 0);
        assert_eq!(update.subject_id, 42);
        assert_eq!(update.source, ClientRole::User);
        assert_eq!(update.accuracy, Some(15.0));
    }

    #[test]
    fn corrections_are_new_rows() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let first =
            LocationRepo::insert(&conn, 7, 1.0, 2.0, None, ClientRole::Responder).unwrap();
        let second =
            LocationRepo::insert(&conn, 7, 1.1, 2.1, None, ClientRole::Responder).unwrap();
        assert_ne!(first.id, second.id);

        let history = LocationRepo::list_for_subject(&conn, 7, 10).unwrap();
        assert_eq!(history.len(), 2);
        // Newest first
        assert_eq!(history[0].id, second.id);
    }

    #[test]
    fn latest_for_subject_returns_newest() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(LocationRepo::latest_for_subject(&conn, 9).unwrap().is_none());

        let _ = LocationRepo::insert(&conn, 9, 1.0, 2.0, None, ClientRole::User).unwrap();
        let newest = LocationRepo::insert(&conn, 9, 3.0, 4.0, None, ClientRole::User).unwrap();

        let latest = LocationRepo::latest_for_subject(&conn, 9).unwrap().unwrap();
        assert_eq!(latest.id, newest.id);
        assert!((latest.latitude - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn list_respects_limit_and_subject() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        for i in 0..5 {
            let _ = LocationRepo::insert(
                &conn,
                1,
                f64::from(i),
                0.0,
                None,
                ClientRole::User,
            )
            .unwrap();
        }
        let _ = LocationRepo::insert(&conn, 2, 9.0, 9.0, None, ClientRole::User).unwrap();

        let history = LocationRepo::list_for_subject(&conn, 1, 3).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|u| u.subject_id == 1));
    }
}
