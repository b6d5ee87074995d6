//! services/api/src/adapters/fixtures.rs
//!
//! A snapshot adapter backed by JSON files on disk, one per teacher, named
//! `classroom-snapshot-<teacher>.json`. Handy for local development against
//! anonymized fixtures instead of a live import.

use async_trait::async_trait;
use classroom_cache_core::{
    ClassroomSnapshot, PortError, PortResult, SnapshotSink, SnapshotSource, TeacherKey,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct FixtureSnapshotSource {
    dir: PathBuf,
}

impl FixtureSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The fixture path for a teacher. Keys that could escape the directory are refused.
    fn path_for(&self, teacher: &TeacherKey) -> PortResult<PathBuf> {
        let key = teacher.as_str();
        let safe = !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '+' | '-'));
        if !safe {
            return Err(PortError::Unexpected(format!(
                "Teacher key {:?} cannot be used as a fixture name",
                key
            )));
        }
        Ok(self.dir.join(format!("classroom-snapshot-{}.json", key)))
    }
}

#[async_trait]
impl SnapshotSource for FixtureSnapshotSource {
    async fn fetch_snapshot(&self, teacher: &TeacherKey) -> PortResult<ClassroomSnapshot> {
        let path = self.path_for(teacher)?;
        debug!("Reading snapshot fixture {}", path.display());

        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                PortError::NotFound(format!("No snapshot fixture at {}", path.display()))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            PortError::Malformed(format!("Snapshot fixture {} is not valid: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl SnapshotSink for FixtureSnapshotSource {
    async fn save_snapshot(
        &self,
        teacher: &TeacherKey,
        snapshot: &ClassroomSnapshot,
    ) -> PortResult<()> {
        let path = self.path_for(teacher)?;
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
