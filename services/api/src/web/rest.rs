//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use classroom_cache_core::{
    transform::check_snapshot_owner, transform_snapshot, CacheError, CacheOrigin,
    ClassroomSnapshot, Course, EntryState, TeacherKey,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_classrooms_handler,
        cache_status_handler,
        cache_version_handler,
        clear_cache_handler,
        import_snapshot_handler,
    ),
    components(
        schemas(DashboardResponse, CacheStatusResponse, VersionResponse, ImportResponse)
    ),
    tags(
        (name = "Classroom Dashboard API", description = "Cached classroom data for teacher dashboards.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// The classrooms shown on a teacher's dashboard.
#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    version: String,
    /// How the data was obtained; absent when it could not be cached.
    #[schema(value_type = Object)]
    origin: Option<CacheOrigin>,
    timestamp: Option<DateTime<Utc>>,
    /// False when the data was rebuilt but the cache write failed.
    persisted: bool,
    #[schema(value_type = Vec<Object>)]
    classrooms: Vec<Course>,
}

#[derive(Serialize, ToSchema)]
pub struct CacheStatusResponse {
    version: String,
    #[schema(value_type = Object)]
    entry: EntryState,
}

#[derive(Serialize, ToSchema)]
pub struct VersionResponse {
    version: String,
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    courses: usize,
}

/// Maps a cache failure onto the status code the dashboard expects.
fn cache_error_response(e: CacheError) -> (StatusCode, String) {
    let status = match &e {
        CacheError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CacheError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CacheError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the teacher's classrooms, rebuilding the cache if needed.
#[utoipa::path(
    get,
    path = "/dashboard/classrooms",
    responses(
        (status = 200, description = "Classrooms for the dashboard", body = DashboardResponse),
        (status = 401, description = "Missing teacher identity"),
        (status = 422, description = "The imported snapshot is malformed"),
        (status = 503, description = "No snapshot could be fetched")
    ),
    params(
        ("x-teacher-email" = String, Header, description = "The signed-in teacher.")
    )
)]
pub async fn get_classrooms_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(teacher): Extension<TeacherKey>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cache = &app_state.cache;
    match cache.load_detailed(&teacher).await {
        Ok(load) => Ok(Json(DashboardResponse {
            version: load.version,
            origin: Some(load.origin),
            timestamp: Some(load.timestamp),
            persisted: true,
            classrooms: load.classrooms,
        })),
        Err(CacheError::Persistence {
            reason,
            computed: Some(classrooms),
        }) => {
            warn!(teacher = %teacher, "Serving uncached classrooms: {}", reason);
            Ok(Json(DashboardResponse {
                version: cache.current_version().to_string(),
                origin: None,
                timestamp: None,
                persisted: false,
                classrooms,
            }))
        }
        Err(e) => Err(cache_error_response(e)),
    }
}

/// Report what the cache holds for the teacher without rebuilding it.
#[utoipa::path(
    get,
    path = "/cache/status",
    responses(
        (status = 200, description = "Cache entry state", body = CacheStatusResponse),
        (status = 401, description = "Missing teacher identity")
    ),
    params(
        ("x-teacher-email" = String, Header, description = "The signed-in teacher.")
    )
)]
pub async fn cache_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(teacher): Extension<TeacherKey>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entry = app_state
        .cache
        .entry_state(&teacher)
        .await
        .map_err(cache_error_response)?;

    Ok(Json(CacheStatusResponse {
        version: app_state.cache.current_version().to_string(),
        entry,
    }))
}

/// The cache version entries must carry to be served.
#[utoipa::path(
    get,
    path = "/cache/version",
    responses(
        (status = 200, description = "Current cache version", body = VersionResponse)
    ),
    params(
        ("x-teacher-email" = String, Header, description = "The signed-in teacher.")
    )
)]
pub async fn cache_version_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(VersionResponse {
        version: app_state.cache.current_version().to_string(),
    })
}

/// Drop the teacher's cache entry so the next load rebuilds it.
#[utoipa::path(
    delete,
    path = "/cache",
    responses(
        (status = 204, description = "Cache cleared"),
        (status = 401, description = "Missing teacher identity"),
        (status = 500, description = "The cache store rejected the delete")
    ),
    params(
        ("x-teacher-email" = String, Header, description = "The signed-in teacher.")
    )
)]
pub async fn clear_cache_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(teacher): Extension<TeacherKey>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .cache
        .clear(&teacher)
        .await
        .map_err(cache_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import a classroom snapshot for the teacher.
///
/// The snapshot is validated before it is stored, and the teacher's cache is
/// cleared afterwards so the next dashboard load reflects the new data.
#[utoipa::path(
    post,
    path = "/snapshots",
    request_body(content_type = "application/json", description = "The classroom snapshot export."),
    responses(
        (status = 202, description = "Snapshot imported", body = ImportResponse),
        (status = 401, description = "Missing teacher identity"),
        (status = 422, description = "The snapshot is malformed or belongs to another teacher"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-teacher-email" = String, Header, description = "The signed-in teacher.")
    )
)]
pub async fn import_snapshot_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(teacher): Extension<TeacherKey>,
    Json(snapshot): Json<ClassroomSnapshot>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_snapshot_owner(&snapshot, &teacher).map_err(cache_error_response)?;
    let courses = transform_snapshot(&snapshot)
        .map_err(cache_error_response)?
        .len();

    app_state
        .snapshots
        .save_snapshot(&teacher, &snapshot)
        .await
        .map_err(|e| {
            error!(teacher = %teacher, "Failed to save snapshot: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save snapshot".to_string(),
            )
        })?;

    app_state
        .cache
        .clear(&teacher)
        .await
        .map_err(cache_error_response)?;

    info!(teacher = %teacher, courses, "Imported classroom snapshot");
    Ok((StatusCode::ACCEPTED, Json(ImportResponse { courses })))
}
