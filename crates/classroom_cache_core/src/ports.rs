//! crates/classroom_cache_core/src/ports.rs
//!
//! Defines the service contracts (traits) the cache core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of where snapshots come from and where entries are kept.

use crate::domain::{CacheEntry, ClassroomSnapshot, TeacherKey};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, files).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The stored data could be read but is not a valid snapshot document.
    #[error("Malformed data: {0}")]
    Malformed(String),
    /// A conditional write lost to a newer generation.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Produces classroom snapshots for a teacher.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, teacher: &TeacherKey) -> PortResult<ClassroomSnapshot>;
}

/// Accepts imported snapshots, replacing whatever was held for the teacher.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save_snapshot(
        &self,
        teacher: &TeacherKey,
        snapshot: &ClassroomSnapshot,
    ) -> PortResult<()>;
}

/// Key-value persistence for cache entries, one entry per teacher.
///
/// Each teacher also has a generation counter, starting at zero, that only
/// `delete` advances.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, teacher: &TeacherKey) -> PortResult<Option<CacheEntry>>;

    /// The teacher's current generation.
    async fn generation(&self, teacher: &TeacherKey) -> PortResult<u64>;

    /// Overwrites any existing entry for the teacher, provided
    /// `entry.generation` is still the current generation. Otherwise nothing
    /// is written and the call fails with [`PortError::Conflict`].
    async fn put(&self, teacher: &TeacherKey, entry: &CacheEntry) -> PortResult<()>;

    /// Removes the entry and advances the generation. Deleting an absent
    /// entry succeeds.
    async fn delete(&self, teacher: &TeacherKey) -> PortResult<()>;
}
