//! REST surface for dispatchers.
//!
//! Thin handlers over [`lifeline_store::DispatchStore`]; every mutation emits
//! the same outbound event the relay would, so WebSocket clients see REST
//! changes in real time.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use lifeline_core::{
    AlertSeverity, AlertStatus, AssignmentStatus, GeoPoint, OutboundEvent, ResourceStatus,
};
use lifeline_store::{CreateAlertOptions, StoreError};

use crate::metrics::{ALERT_STATUS_UPDATES_TOTAL, EMERGENCY_BROADCASTS_TOTAL};
use crate::server::AppState;

/// Default page size for list endpoints.
const DEFAULT_LIST_LIMIT: i64 = 50;

/// Default proximity query radius in kilometers.
const DEFAULT_NEARBY_RADIUS_KM: f64 = 10.0;

/// Default proximity query result cap.
const DEFAULT_NEARBY_LIMIT: usize = 20;

/// An API failure mapped onto an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    /// 400 — the request itself is malformed.
    BadRequest(String),
    /// 404 — the named record does not exist.
    NotFound(String),
    /// 409 — a resource in the batch is not available.
    Conflict(String),
    /// 500 — everything else.
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlertNotFound(_)
            | StoreError::ResourceNotFound(_)
            | StoreError::AssignmentNotFound(_) => Self::NotFound(err.to_string()),
            StoreError::ResourceUnavailable { .. } => Self::Conflict(err.to_string()),
            StoreError::InvalidOperation(_) => Self::BadRequest(err.to_string()),
            other => {
                warn!(error = %other, "store failure behind REST endpoint");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a store call on the blocking pool so SQLite work stays off the async
/// executor shared with the WebSocket fan-out.
async fn run_store<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

// ── Alerts ───────────────────────────────────────────────────────────────────

/// Body of `POST /api/alerts` — same shape as the WebSocket submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    /// Submitting user.
    pub user_id: i64,
    /// Incident position.
    pub location: GeoPoint,
    /// Incident category.
    pub emergency_type: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Reported severity.
    #[serde(default)]
    pub severity: Option<AlertSeverity>,
}

/// POST /api/alerts
pub async fn create_alert(
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> ApiResult<Response> {
    req.location
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let severity = req.severity.unwrap_or(AlertSeverity::Medium);
    let opts = CreateAlertOptions {
        user_id: req.user_id,
        latitude: req.location.latitude,
        longitude: req.location.longitude,
        accuracy: req.location.accuracy,
        emergency_type: req.emergency_type,
        description: req.description,
        severity: req.severity,
    };
    let store = state.store.clone();
    let alert = run_store(move || store.create_alert(&opts)).await?;

    counter!(EMERGENCY_BROADCASTS_TOTAL, "severity" => severity.as_str()).increment(1);
    state
        .registry
        .broadcast_all(&OutboundEvent::emergency_broadcast(alert.clone()))
        .await;

    Ok((StatusCode::CREATED, Json(alert)).into_response())
}

/// Query parameters of `GET /api/alerts`.
#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    /// Filter by status.
    pub status: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
}

/// GET /api/alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> ApiResult<Response> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            AlertStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {s}")))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let store = state.store.clone();
    let alerts = run_store(move || store.list_alerts(status, limit)).await?;
    Ok(Json(alerts).into_response())
}

/// GET /api/alerts/{id}
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    Ok(Json(run_store(move || store.get_alert(&id)).await?).into_response())
}

/// Body of `PATCH /api/alerts/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// The new status string.
    pub status: String,
}

/// PATCH /api/alerts/{id}/status
pub async fn update_alert_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Response> {
    let status = AlertStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {}", req.status)))?;
    let store = state.store.clone();
    let alert = run_store(move || store.update_alert_status(&id, status)).await?;

    counter!(ALERT_STATUS_UPDATES_TOTAL, "status" => status.as_str()).increment(1);
    state
        .registry
        .broadcast_all(&OutboundEvent::emergency_status_update(&alert))
        .await;

    Ok(Json(alert).into_response())
}

/// Body of `POST /api/alerts/{id}/resources`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResourcesRequest {
    /// Resources to assign; all must be available.
    pub resource_ids: Vec<String>,
}

/// POST /api/alerts/{id}/resources
pub async fn assign_resources(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignResourcesRequest>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    let alert = run_store(move || store.assign_resources(&id, &req.resource_ids)).await?;

    state
        .registry
        .broadcast_all(&OutboundEvent::emergency_status_update(&alert))
        .await;

    Ok(Json(alert).into_response())
}

/// GET /api/alerts/{id}/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let store = state.store.clone();
    let assignments = run_store(move || {
        // 404 for an unknown alert rather than an empty list.
        let _ = store.get_alert(&id)?;
        store.list_assignments_for_alert(&id)
    })
    .await?;
    Ok(Json(assignments).into_response())
}

// ── Assignments ──────────────────────────────────────────────────────────────

/// PATCH /api/assignments/{id}/status
pub async fn update_assignment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Response> {
    let status = AssignmentStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {}", req.status)))?;
    let store = state.store.clone();
    let assignment = run_store(move || store.update_assignment_status(&id, status)).await?;
    Ok(Json(assignment).into_response())
}

// ── Resources ────────────────────────────────────────────────────────────────

/// Body of `POST /api/resources`.
#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    /// Display name.
    pub name: String,
    /// Unit kind (ambulance, fire_truck, ...).
    pub kind: String,
    /// Current latitude.
    pub latitude: f64,
    /// Current longitude.
    pub longitude: f64,
}

/// POST /api/resources
pub async fn create_resource(
    State(state): State<AppState>,
    Json(req): Json<CreateResourceRequest>,
) -> ApiResult<Response> {
    GeoPoint::new(req.latitude, req.longitude)
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    let store = state.store.clone();
    let resource = run_store(move || {
        store.create_resource(&req.name, &req.kind, req.latitude, req.longitude)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(resource)).into_response())
}

/// Query parameters of `GET /api/resources`.
#[derive(Debug, Deserialize)]
pub struct ListResourcesQuery {
    /// Filter by status.
    pub status: Option<String>,
}

/// GET /api/resources
pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ListResourcesQuery>,
) -> ApiResult<Response> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => Some(
            ResourceStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {s}")))?,
        ),
    };
    let store = state.store.clone();
    Ok(Json(run_store(move || store.list_resources(status)).await?).into_response())
}

/// Query parameters of `GET /api/resources/nearby`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    /// Query point latitude.
    pub latitude: f64,
    /// Query point longitude.
    pub longitude: f64,
    /// Search radius in kilometers.
    pub radius_km: Option<f64>,
    /// Result cap.
    pub limit: Option<usize>,
}

/// GET /api/resources/nearby
pub async fn nearby_resources(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<Response> {
    GeoPoint::new(query.latitude, query.longitude)
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let radius = query.radius_km.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(ApiError::BadRequest(format!("invalid radius: {radius}")));
    }
    let limit = query.limit.unwrap_or(DEFAULT_NEARBY_LIMIT);
    let store = state.store.clone();
    let found = run_store(move || {
        store.find_available_near(query.latitude, query.longitude, radius, limit)
    })
    .await?;
    Ok(Json(found).into_response())
}

// ── Locations ────────────────────────────────────────────────────────────────

/// Query parameters of `GET /api/locations/{subject_id}`.
#[derive(Debug, Deserialize)]
pub struct LocationHistoryQuery {
    /// Page size.
    pub limit: Option<i64>,
}

/// GET /api/locations/{subject_id}
pub async fn location_history(
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Query(query): Query<LocationHistoryQuery>,
) -> ApiResult<Response> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let store = state.store.clone();
    let history = run_store(move || store.list_locations_for_subject(subject_id, limit)).await?;
    Ok(Json(history).into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
