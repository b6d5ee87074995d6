//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the cache and snapshot ports. Used when the
//! service runs with `CACHE_STORE=memory`, and by the handler tests.

use async_trait::async_trait;
use classroom_cache_core::{
    CacheEntry, CacheStore, ClassroomSnapshot, PortError, PortResult, SnapshotSink,
    SnapshotSource, TeacherKey,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Cache entries held in a map; lost when the process exits.
#[derive(Default)]
pub struct InMemoryCacheStore {
    slots: RwLock<HashMap<TeacherKey, Slot>>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    entry: Option<CacheEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, teacher: &TeacherKey) -> PortResult<Option<CacheEntry>> {
        Ok(self
            .slots
            .read()
            .await
            .get(teacher)
            .and_then(|slot| slot.entry.clone()))
    }

    async fn generation(&self, teacher: &TeacherKey) -> PortResult<u64> {
        Ok(self
            .slots
            .read()
            .await
            .get(teacher)
            .map_or(0, |slot| slot.generation))
    }

    async fn put(&self, teacher: &TeacherKey, entry: &CacheEntry) -> PortResult<()> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(teacher.clone()).or_default();
        if slot.generation != entry.generation {
            return Err(PortError::Conflict(format!(
                "entry built at generation {}, store is at {}",
                entry.generation, slot.generation
            )));
        }
        slot.entry = Some(entry.clone());
        Ok(())
    }

    async fn delete(&self, teacher: &TeacherKey) -> PortResult<()> {
        let mut slots = self.slots.write().await;
        let slot = slots.entry(teacher.clone()).or_default();
        slot.generation += 1;
        slot.entry = None;
        Ok(())
    }
}

/// The latest imported snapshot per teacher, held in a map.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<TeacherKey, ClassroomSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotSource for InMemorySnapshotStore {
    async fn fetch_snapshot(&self, teacher: &TeacherKey) -> PortResult<ClassroomSnapshot> {
        self.snapshots
            .read()
            .await
            .get(teacher)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No snapshot imported for {}", teacher)))
    }
}

#[async_trait]
impl SnapshotSink for InMemorySnapshotStore {
    async fn save_snapshot(
        &self,
        teacher: &TeacherKey,
        snapshot: &ClassroomSnapshot,
    ) -> PortResult<()> {
        self.snapshots
            .write()
            .await
            .insert(teacher.clone(), snapshot.clone());
        Ok(())
    }
}
