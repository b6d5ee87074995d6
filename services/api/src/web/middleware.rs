//! services/api/src/web/middleware.rs
//!
//! Teacher identity middleware for protecting routes.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use classroom_cache_core::TeacherKey;
use tracing::warn;

/// The header the upstream authentication layer sets to the signed-in teacher's email.
pub const TEACHER_HEADER: &str = "x-teacher-email";

/// Middleware that resolves the teacher identity for the request.
///
/// If present and non-blank, inserts the `TeacherKey` into request extensions
/// for handlers to use. Otherwise returns 401 Unauthorized.
pub async fn require_teacher(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let raw = req
        .headers()
        .get(TEACHER_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let teacher = TeacherKey::parse(raw).map_err(|e| {
        warn!("Rejected teacher identity: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(teacher);
    Ok(next.run(req).await)
}
