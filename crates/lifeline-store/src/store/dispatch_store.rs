//! The high-level persistence API the relay and REST layer call.
//!
//! [`DispatchStore`] owns the connection pool. Single-row operations check
//! out one connection; multi-row operations (resource assignment, assignment
//! completion) run inside one transaction so readers never observe partial
//! state.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use lifeline_core::{
    AlertStatus, AssignmentStatus, ClientRole, EmergencyAlert, LocationUpdate, Resource,
    ResourceAssignment, ResourceStatus,
};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::repositories::{
    AlertRepo, AssignmentRepo, LocationRepo, NewAlert, ResourceRepo,
};

/// Fields accepted when creating a new alert.
///
/// Status is deliberately absent: every new alert starts `active` no matter
/// which entry point (relay or REST) created it.
#[derive(Clone, Debug)]
pub struct CreateAlertOptions {
    /// Submitting user.
    pub user_id: i64,
    /// Incident latitude.
    pub latitude: f64,
    /// Incident longitude.
    pub longitude: f64,
    /// Position accuracy in meters.
    pub accuracy: Option<f64>,
    /// Incident category (non-empty).
    pub emergency_type: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Severity; defaults to medium when omitted.
    pub severity: Option<lifeline_core::AlertSeverity>,
}

/// An available resource near a query point.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyResource {
    /// The resource.
    #[serde(flatten)]
    pub resource: Resource,
    /// Great-circle distance from the query point in kilometers.
    pub distance_km: f64,
}

/// Pool-owning facade over the repositories. Cheap to clone.
#[derive(Clone)]
pub struct DispatchStore {
    pool: ConnectionPool,
}

impl DispatchStore {
    /// Wrap an initialized (migrated) connection pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    // ── Locations ────────────────────────────────────────────────────────────

    /// Append a location fact for a subject.
    pub fn record_location(
        &self,
        subject_id: i64,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        source: ClientRole,
    ) -> Result<LocationUpdate> {
        let conn = self.conn()?;
        LocationRepo::insert(&conn, subject_id, latitude, longitude, accuracy, source)
    }

    /// Recent position history for a subject, newest first.
    pub fn list_locations_for_subject(
        &self,
        subject_id: i64,
        limit: i64,
    ) -> Result<Vec<LocationUpdate>> {
        let conn = self.conn()?;
        LocationRepo::list_for_subject(&conn, subject_id, limit)
    }

    /// Latest known position for a subject, if any.
    pub fn latest_location_for_subject(&self, subject_id: i64) -> Result<Option<LocationUpdate>> {
        let conn = self.conn()?;
        LocationRepo::latest_for_subject(&conn, subject_id)
    }

    // ── Alerts ───────────────────────────────────────────────────────────────

    /// Create a new alert. This is the only alert-creation path.
    pub fn create_alert(&self, opts: &CreateAlertOptions) -> Result<EmergencyAlert> {
        if opts.emergency_type.trim().is_empty() {
            return Err(StoreError::InvalidOperation(
                "emergencyType must not be empty".to_string(),
            ));
        }
        let conn = self.conn()?;
        let alert = AlertRepo::create(
            &conn,
            &NewAlert {
                user_id: opts.user_id,
                latitude: opts.latitude,
                longitude: opts.longitude,
                accuracy: opts.accuracy,
                emergency_type: &opts.emergency_type,
                description: opts.description.as_deref(),
                severity: opts.severity,
            },
        )?;
        info!(
            alert_id = %alert.id,
            user_id = alert.user_id,
            emergency_type = %alert.emergency_type,
            "alert created"
        );
        Ok(alert)
    }

    /// Fetch one alert by id.
    pub fn get_alert(&self, id: &str) -> Result<EmergencyAlert> {
        let conn = self.conn()?;
        AlertRepo::get(&conn, id)
    }

    /// List alerts, newest first, optionally filtered by status.
    pub fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        limit: i64,
    ) -> Result<Vec<EmergencyAlert>> {
        let conn = self.conn()?;
        AlertRepo::list(&conn, status, limit)
    }

    /// Update an alert's status; resolving records `resolved_at`.
    pub fn update_alert_status(&self, id: &str, status: AlertStatus) -> Result<EmergencyAlert> {
        let conn = self.conn()?;
        let alert = AlertRepo::set_status(&conn, id, status)?;
        info!(alert_id = %alert.id, status = status.as_str(), "alert status updated");
        Ok(alert)
    }

    // ── Resources ────────────────────────────────────────────────────────────

    /// Register a resource. New resources start out available.
    pub fn create_resource(
        &self,
        name: &str,
        kind: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Resource> {
        let conn = self.conn()?;
        ResourceRepo::create(&conn, name, kind, latitude, longitude)
    }

    /// Fetch one resource by id.
    pub fn get_resource(&self, id: &str) -> Result<Resource> {
        let conn = self.conn()?;
        ResourceRepo::get(&conn, id)
    }

    /// List resources, optionally filtered by status.
    pub fn list_resources(&self, status: Option<ResourceStatus>) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        ResourceRepo::list(&conn, status)
    }

    /// Available resources within `radius_km` of a point, nearest first.
    pub fn find_available_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        limit: usize,
    ) -> Result<Vec<NearbyResource>> {
        let conn = self.conn()?;
        let found = ResourceRepo::find_available_near(&conn, latitude, longitude, radius_km, limit)?;
        Ok(found
            .into_iter()
            .map(|r| NearbyResource {
                resource: r.resource,
                distance_km: r.distance_km,
            })
            .collect())
    }

    // ── Assignments ──────────────────────────────────────────────────────────

    /// Assign resources to an alert — all or nothing.
    ///
    /// Inside one transaction: every resource must currently be available,
    /// assignment rows are written, the resources flip to `in_use`, and the
    /// ids land on the alert's assigned list. If any resource is taken the
    /// whole transaction rolls back and no resource is claimed.
    pub fn assign_resources(
        &self,
        alert_id: &str,
        resource_ids: &[String],
    ) -> Result<EmergencyAlert> {
        if resource_ids.is_empty() {
            return Err(StoreError::InvalidOperation(
                "resourceIds must not be empty".to_string(),
            ));
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let alert = Self::assign_in_tx(&tx, alert_id, resource_ids)?;

        tx.commit()?;
        info!(
            alert_id = %alert_id,
            resources = resource_ids.len(),
            "resources assigned"
        );
        Ok(alert)
    }

    fn assign_in_tx(
        tx: &Connection,
        alert_id: &str,
        resource_ids: &[String],
    ) -> Result<EmergencyAlert> {
        // Existence check first so a bad alert id never claims a resource.
        let _ = AlertRepo::get(tx, alert_id)?;

        for resource_id in resource_ids {
            let resource = ResourceRepo::get(tx, resource_id)?;
            if resource.status != ResourceStatus::Available {
                debug!(
                    resource_id = %resource_id,
                    status = resource.status.as_str(),
                    "assignment rejected, resource unavailable"
                );
                return Err(StoreError::ResourceUnavailable {
                    resource_id: resource_id.clone(),
                    status: resource.status.as_str().to_string(),
                });
            }
        }

        for resource_id in resource_ids {
            let _ = AssignmentRepo::create(tx, alert_id, resource_id)?;
            let _ = ResourceRepo::set_status(tx, resource_id, ResourceStatus::InUse)?;
        }

        AlertRepo::append_assigned_resources(tx, alert_id, resource_ids)
    }

    /// All assignments for an alert.
    pub fn list_assignments_for_alert(&self, alert_id: &str) -> Result<Vec<ResourceAssignment>> {
        let conn = self.conn()?;
        AssignmentRepo::list_for_alert(&conn, alert_id)
    }

    /// Advance an assignment's lifecycle status.
    ///
    /// Completing an assignment releases its resource back to `available`
    /// in the same transaction.
    pub fn update_assignment_status(
        &self,
        id: &str,
        status: AssignmentStatus,
    ) -> Result<ResourceAssignment> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let assignment = AssignmentRepo::set_status(&tx, id, status)?;
        if status == AssignmentStatus::Completed {
            let _ = ResourceRepo::set_status(
                &tx,
                &assignment.resource_id,
                ResourceStatus::Available,
            )?;
        }

        tx.commit()?;
        Ok(assignment)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::sqlite::connection::{new_in_memory, ConnectionConfig};
    use crate::sqlite::migrations::run_migrations;

    fn test_store() -> DispatchStore {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            let _ = run_migrations(&conn).unwrap();
        }
        DispatchStore::new(pool)
    }

    fn alert_opts() -> CreateAlertOptions {
        CreateAlertOptions {
            user_id: 42,
            latitude: -1.2921,
            longitude: 36.8219,
            accuracy: Some(15.0),
            emergency_type: "medical".to_string(),
            description: Some("chest pain".to_string()),
            severity: None,
        }
    }

    #[test]
    fn create_alert_rejects_empty_type() {
        let store = test_store();
        let result = store.create_alert(&CreateAlertOptions {
            emergency_type: "   ".to_string(),
            ..alert_opts()
        });
        assert_matches!(result, Err(StoreError::InvalidOperation(_)));
    }

    #[test]
    fn create_alert_starts_active() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        assert_eq!(alert.status, AlertStatus::Active);
        assert_eq!(store.get_alert(&alert.id).unwrap().id, alert.id);
    }

    #[test]
    fn record_and_query_location_history() {
        let store = test_store();
        let _ = store
            .record_location(7, 1.0, 2.0, None, ClientRole::User)
            .unwrap();
        let newest = store
            .record_location(7, 1.1, 2.1, Some(5.0), ClientRole::User)
            .unwrap();

        let history = store.list_locations_for_subject(7, 10).unwrap();
        assert_eq!(history.len(), 2);
        let latest = store.latest_location_for_subject(7).unwrap().unwrap();
        assert_eq!(latest.id, newest.id);
    }

    #[test]
    fn assign_resources_claims_units_and_updates_alert() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        let a = store.create_resource("Unit A", "ambulance", 0.0, 0.0).unwrap();
        let b = store.create_resource("Unit B", "ambulance", 0.0, 0.0).unwrap();

        let updated = store
            .assign_resources(&alert.id, &[a.id.clone(), b.id.clone()])
            .unwrap();
        assert_eq!(updated.assigned_resource_ids, vec![a.id.clone(), b.id.clone()]);

        assert_eq!(store.get_resource(&a.id).unwrap().status, ResourceStatus::InUse);
        assert_eq!(store.get_resource(&b.id).unwrap().status, ResourceStatus::InUse);
        assert_eq!(store.list_assignments_for_alert(&alert.id).unwrap().len(), 2);
    }

    #[test]
    fn assign_resources_rolls_back_when_any_unavailable() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        let free = store.create_resource("Free", "ambulance", 0.0, 0.0).unwrap();
        let busy = store.create_resource("Busy", "ambulance", 0.0, 0.0).unwrap();
        let other = store.create_alert(&alert_opts()).unwrap();
        let _ = store.assign_resources(&other.id, &[busy.id.clone()]).unwrap();

        let result = store.assign_resources(&alert.id, &[free.id.clone(), busy.id.clone()]);
        assert_matches!(result, Err(StoreError::ResourceUnavailable { .. }));

        // Nothing from the failed batch stuck.
        assert_eq!(
            store.get_resource(&free.id).unwrap().status,
            ResourceStatus::Available
        );
        assert!(store
            .get_alert(&alert.id)
            .unwrap()
            .assigned_resource_ids
            .is_empty());
        assert!(store.list_assignments_for_alert(&alert.id).unwrap().is_empty());
    }

    #[test]
    fn assign_resources_rejects_empty_batch() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        assert_matches!(
            store.assign_resources(&alert.id, &[]),
            Err(StoreError::InvalidOperation(_))
        );
    }

    #[test]
    fn assign_resources_unknown_alert_claims_nothing() {
        let store = test_store();
        let res = store.create_resource("Unit", "ambulance", 0.0, 0.0).unwrap();
        assert_matches!(
            store.assign_resources("alert_missing", &[res.id.clone()]),
            Err(StoreError::AlertNotFound(_))
        );
        assert_eq!(
            store.get_resource(&res.id).unwrap().status,
            ResourceStatus::Available
        );
    }

    #[test]
    fn completing_assignment_releases_resource() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        let res = store.create_resource("Unit", "ambulance", 0.0, 0.0).unwrap();
        let _ = store.assign_resources(&alert.id, &[res.id.clone()]).unwrap();

        let assignment = store.list_assignments_for_alert(&alert.id).unwrap().remove(0);
        let done = store
            .update_assignment_status(&assignment.id, AssignmentStatus::Completed)
            .unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert_eq!(
            store.get_resource(&res.id).unwrap().status,
            ResourceStatus::Available
        );
    }

    #[test]
    fn en_route_does_not_release_resource() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        let res = store.create_resource("Unit", "ambulance", 0.0, 0.0).unwrap();
        let _ = store.assign_resources(&alert.id, &[res.id.clone()]).unwrap();

        let assignment = store.list_assignments_for_alert(&alert.id).unwrap().remove(0);
        let _ = store
            .update_assignment_status(&assignment.id, AssignmentStatus::EnRoute)
            .unwrap();
        assert_eq!(
            store.get_resource(&res.id).unwrap().status,
            ResourceStatus::InUse
        );
    }

    #[test]
    fn nearby_resources_are_serializable_with_distance() {
        let store = test_store();
        let _ = store
            .create_resource("Close", "ambulance", -1.2950, 36.8250)
            .unwrap();
        let nearby = store
            .find_available_near(-1.2921, 36.8219, 20.0, 10)
            .unwrap();
        assert_eq!(nearby.len(), 1);
        let json = serde_json::to_value(&nearby[0]).unwrap();
        assert!(json.get("distanceKm").is_some());
        assert!(json.get("name").is_some());
    }

    #[test]
    fn resolving_alert_records_timestamp() {
        let store = test_store();
        let alert = store.create_alert(&alert_opts()).unwrap();
        let resolved = store
            .update_alert_status(&alert.id, AlertStatus::Resolved)
            .unwrap();
        assert!(resolved.resolved_at.is_some());
    }
}
