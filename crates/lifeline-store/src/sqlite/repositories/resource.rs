//! Resource repository — emergency units and their availability.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use lifeline_core::geo::{latitude_delta_deg, longitude_delta_deg};
use lifeline_core::{GeoPoint, Resource, ResourceStatus};

use crate::errors::{Result, StoreError};
use crate::sqlite::row_types::ResourceRow;

/// A resource candidate from a proximity query, with its computed distance.
#[derive(Clone, Debug)]
pub struct ResourceWithDistance {
    /// The resource.
    pub resource: Resource,
    /// Great-circle distance from the query point in kilometers.
    pub distance_km: f64,
}

/// Resource repository — stateless, every method takes `&Connection`.
pub struct ResourceRepo;

impl ResourceRepo {
    /// Register a resource. New resources start out available.
    pub fn create(
        conn: &Connection,
        name: &str,
        kind: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Resource> {
        let id = format!("res_{}", Uuid::now_v7());
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO resources (id, name, kind, status, latitude, longitude, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                name,
                kind,
                ResourceStatus::Available.as_str(),
                latitude,
                longitude,
                now
            ],
        )?;
        Ok(Resource {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            status: ResourceStatus::Available,
            latitude,
            longitude,
            updated_at: now,
        })
    }

    /// Fetch one resource by id.
    pub fn get(conn: &Connection, id: &str) -> Result<Resource> {
        let row = conn
            .query_row(
                "SELECT id, name, kind, status, latitude, longitude, updated_at
                 FROM resources WHERE id = ?1",
                params![id],
                map_row,
            )
            .optional()?;
        row.ok_or_else(|| StoreError::ResourceNotFound(id.to_string()))?
            .into_resource()
    }

    /// Set a resource's availability status.
    pub fn set_status(conn: &Connection, id: &str, status: ResourceStatus) -> Result<Resource> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE resources SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now],
        )?;
        if changed == 0 {
            return Err(StoreError::ResourceNotFound(id.to_string()));
        }
        Self::get(conn, id)
    }

    /// List all resources, optionally filtered by status.
    pub fn list(conn: &Connection, status: Option<ResourceStatus>) -> Result<Vec<Resource>> {
        let mut out = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, kind, status, latitude, longitude, updated_at
                     FROM resources WHERE status = ?1 ORDER BY name",
                )?;
                let rows = stmt.query_map(params![status.as_str()], map_row)?;
                for row in rows {
                    out.push(row?.into_resource()?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, kind, status, latitude, longitude, updated_at
                     FROM resources ORDER BY name",
                )?;
                let rows = stmt.query_map([], map_row)?;
                for row in rows {
                    out.push(row?.into_resource()?);
                }
            }
        }
        Ok(out)
    }

    /// Available resources within `radius_km` of a point, nearest first.
    ///
    /// A bounding-box prefilter runs against the status+position index so the
    /// exact Haversine distance is only computed for plausible candidates.
    /// The box overshoots the circle at its corners; the distance check below
    /// discards those.
    pub fn find_available_near(
        conn: &Connection,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<ResourceWithDistance>> {
        let dlat = latitude_delta_deg(radius_km);
        let dlon = longitude_delta_deg(radius_km, latitude);

        let mut stmt = conn.prepare(
            "SELECT id, name, kind, status, latitude, longitude, updated_at
             FROM resources
             WHERE status = ?1
               AND latitude  BETWEEN ?2 AND ?3
               AND longitude BETWEEN ?4 AND ?5",
        )?;
        let rows = stmt.query_map(
            params![
                ResourceStatus::Available.as_str(),
                latitude - dlat,
                latitude + dlat,
                longitude - dlon,
                longitude + dlon,
            ],
            map_row,
        )?;

        let origin = GeoPoint::new(latitude, longitude);
        let mut candidates = Vec::new();
        for row in rows {
            let resource = row?.into_resource()?;
            let here = GeoPoint::new(resource.latitude, resource.longitude);
            let distance_km = origin.distance_km(&here);
            if distance_km <= radius_km {
                candidates.push(ResourceWithDistance {
                    resource,
                    distance_km,
                });
            }
        }
        candidates.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        candidates.truncate(limit);
        Ok(candidates)
    }
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourceRow> {
    Ok(ResourceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        status: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
