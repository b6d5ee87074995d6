//! services/api/src/adapters/db.rs
//!
//! This module contains the Postgres adapter, the concrete implementation of the
//! `SnapshotSource`, `SnapshotSink` and `CacheStore` ports from the core crate.
//! Snapshots and cache entries are kept as JSONB documents keyed by teacher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use classroom_cache_core::{
    CacheEntry, CacheStore, ClassroomSnapshot, Course, PortError, PortResult, SnapshotSink,
    SnapshotSource, TeacherKey,
};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the snapshot and cache ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SnapshotRecord {
    snapshot: Json<Value>,
}
impl SnapshotRecord {
    fn to_domain(self) -> PortResult<ClassroomSnapshot> {
        serde_json::from_value(self.snapshot.0)
            .map_err(|e| PortError::Malformed(format!("Stored snapshot is not valid: {}", e)))
    }
}

#[derive(FromRow)]
struct CacheEntryRecord {
    version: String,
    refreshed_at: DateTime<Utc>,
    generation: i64,
    classrooms: Json<Vec<Course>>,
}
impl CacheEntryRecord {
    fn to_domain(self) -> CacheEntry {
        CacheEntry {
            version: self.version,
            timestamp: self.refreshed_at,
            generation: self.generation as u64,
            classrooms: self.classrooms.0,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Snapshot Ports
//=========================================================================================

#[async_trait]
impl SnapshotSource for DbAdapter {
    async fn fetch_snapshot(&self, teacher: &TeacherKey) -> PortResult<ClassroomSnapshot> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT snapshot FROM classroom_snapshots WHERE teacher_key = $1",
        )
        .bind(teacher.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record
            .ok_or_else(|| PortError::NotFound(format!("No snapshot imported for {}", teacher)))?
            .to_domain()
    }
}

#[async_trait]
impl SnapshotSink for DbAdapter {
    async fn save_snapshot(
        &self,
        teacher: &TeacherKey,
        snapshot: &ClassroomSnapshot,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO classroom_snapshots (id, teacher_key, snapshot) VALUES ($1, $2, $3) \
             ON CONFLICT (teacher_key) DO UPDATE SET snapshot = EXCLUDED.snapshot, imported_at = now()",
        )
        .bind(Uuid::new_v4())
        .bind(teacher.as_str())
        .bind(Json(snapshot))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `CacheStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CacheStore for DbAdapter {
    async fn get(&self, teacher: &TeacherKey) -> PortResult<Option<CacheEntry>> {
        let record = sqlx::query_as::<_, CacheEntryRecord>(
            "SELECT version, refreshed_at, generation, classrooms FROM classroom_cache_entries \
             WHERE teacher_key = $1",
        )
        .bind(teacher.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.map(CacheEntryRecord::to_domain))
    }

    async fn generation(&self, teacher: &TeacherKey) -> PortResult<u64> {
        let generation: Option<i64> = sqlx::query_scalar(
            "SELECT generation FROM classroom_cache_generations WHERE teacher_key = $1",
        )
        .bind(teacher.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(generation.unwrap_or(0) as u64)
    }

    async fn put(&self, teacher: &TeacherKey, entry: &CacheEntry) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Lock the teacher's generation row so a concurrent delete waits for us.
        sqlx::query(
            "INSERT INTO classroom_cache_generations (teacher_key) VALUES ($1) \
             ON CONFLICT (teacher_key) DO NOTHING",
        )
        .bind(teacher.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        let current: i64 = sqlx::query_scalar(
            "SELECT generation FROM classroom_cache_generations WHERE teacher_key = $1 FOR UPDATE",
        )
        .bind(teacher.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        if current as u64 != entry.generation {
            return Err(PortError::Conflict(format!(
                "entry built at generation {}, store is at {}",
                entry.generation, current
            )));
        }

        sqlx::query(
            "INSERT INTO classroom_cache_entries (teacher_key, version, refreshed_at, generation, classrooms) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (teacher_key) DO UPDATE SET version = EXCLUDED.version, \
             refreshed_at = EXCLUDED.refreshed_at, generation = EXCLUDED.generation, \
             classrooms = EXCLUDED.classrooms",
        )
        .bind(teacher.as_str())
        .bind(&entry.version)
        .bind(entry.timestamp)
        .bind(entry.generation as i64)
        .bind(Json(&entry.classrooms))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn delete(&self, teacher: &TeacherKey) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO classroom_cache_generations (teacher_key, generation) VALUES ($1, 1) \
             ON CONFLICT (teacher_key) DO UPDATE \
             SET generation = classroom_cache_generations.generation + 1",
        )
        .bind(teacher.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        sqlx::query("DELETE FROM classroom_cache_entries WHERE teacher_key = $1")
            .bind(teacher.as_str())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }
}
