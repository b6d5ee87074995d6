//! crates/classroom_cache_core/src/domain.rs
//!
//! Defines the core data structures for the classroom cache: the snapshot shape
//! produced by the external classroom service, the transformed course records
//! served to dashboards, and the per-teacher cache entry.

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The cache version entries must carry to be served without a rebuild.
///
/// Bump this (or override it through configuration) to invalidate every
/// cached entry lazily, teacher by teacher, on their next load.
pub const CURRENT_CACHE_VERSION: &str = "1.1.0";

//=========================================================================================
// Teacher Identity
//=========================================================================================

/// Identifies the teacher a snapshot and cache entry belong to.
///
/// Teacher identities are email addresses, so keys are trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TeacherKey(String);

impl TeacherKey {
    pub fn parse(raw: &str) -> Result<Self, CacheError> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(CacheError::Validation {
                record: "teacher key".to_string(),
                reason: "must not be blank".to_string(),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeacherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Snapshot (input, produced by the classroom service)
//=========================================================================================

/// A full export of one teacher's classroom data at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassroomSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher: Option<SnapshotTeacher>,
    /// Raw course records, decoded one by one during transformation so a bad
    /// record can be reported by position. A null list counts as empty.
    #[serde(alias = "courses", deserialize_with = "null_as_empty")]
    pub classrooms: Vec<Value>,
    /// Fields the cache does not interpret (stats, export metadata, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotTeacher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A course record as it appears in a snapshot. Every field may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotCourse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignments: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

//=========================================================================================
// Cached Records
//=========================================================================================

/// A transformed course as stored in the cache and served to dashboards.
///
/// The nested collections are not optional: a course always has them, and
/// they are only ever empty when the snapshot had nothing to carry over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub assignments: Vec<Value>,
    pub students: Vec<Value>,
    pub submissions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One teacher's cached dashboard data.
///
/// `generation` is the store generation the entry was built against. Stores
/// advance a teacher's generation on every clear and refuse entries built
/// against an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub generation: u64,
    pub classrooms: Vec<Course>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current instant, at generation zero.
    pub fn new(version: impl Into<String>, classrooms: Vec<Course>) -> Self {
        Self {
            version: version.into(),
            timestamp: Utc::now(),
            generation: 0,
            classrooms,
        }
    }

    pub fn for_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// An entry is only valid for the exact version it was built under.
    pub fn is_valid_for(&self, version: &str) -> bool {
        self.version == version
    }
}

//=========================================================================================
// Load Reporting
//=========================================================================================

/// What the store currently holds for a teacher, observed without rebuilding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryState {
    Absent,
    Valid { timestamp: DateTime<Utc> },
    Stale { version: String },
}

/// How a load was satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheOrigin {
    /// The stored entry was valid and served as-is.
    Hit,
    /// No entry existed; this was the teacher's first load.
    Built,
    /// The stored entry carried an old version and was replaced.
    Rebuilt { stale_version: String },
}

/// The result of a load together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLoad {
    pub classrooms: Vec<Course>,
    pub origin: CacheOrigin,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
