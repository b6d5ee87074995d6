//! crates/classroom_cache_core/src/error.rs
//!
//! The error taxonomy surfaced by the cache core to its callers.

use crate::domain::Course;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Malformed input. Not retried.
    #[error("Invalid {record}: {reason}")]
    Validation { record: String, reason: String },

    /// The snapshot source could not deliver a snapshot. Safe to retry.
    #[error("Snapshot source unavailable: {0}")]
    SourceUnavailable(String),

    /// The cache store rejected a write or delete, or a teacher's cache was
    /// cleared while the result was being rebuilt.
    ///
    /// When the failure happened after a successful rebuild, `computed` holds
    /// the freshly transformed classrooms so the caller can still serve them
    /// for this one request.
    #[error("Cache persistence failed: {reason}")]
    Persistence {
        reason: String,
        computed: Option<Vec<Course>>,
    },
}

impl CacheError {
    /// Recovers the classrooms computed before a failed write, if any.
    pub fn into_computed(self) -> Option<Vec<Course>> {
        match self {
            CacheError::Persistence { computed, .. } => computed,
            _ => None,
        }
    }
}
