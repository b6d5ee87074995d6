//! crates/classroom_cache_core/src/cache.rs
//!
//! The cache manager: decides whether a teacher's stored entry is still valid,
//! rebuilds it from a fresh snapshot when it is not, and serves the result.

use crate::domain::{
    CacheEntry, CacheLoad, CacheOrigin, Course, EntryState, TeacherKey, CURRENT_CACHE_VERSION,
};
use crate::error::CacheError;
use crate::ports::{CacheStore, PortError, SnapshotSource};
use crate::transform::{check_snapshot_owner, transform_snapshot};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Serves per-teacher classroom data from a version-gated cache.
///
/// Rebuilds are not serialized: two concurrent loads for the same teacher may
/// both rebuild, and the store keeps whichever write lands last. A rebuild
/// that started before a [`CacheManager::clear`] is never stored.
#[derive(Clone)]
pub struct CacheManager {
    source: Arc<dyn SnapshotSource>,
    store: Arc<dyn CacheStore>,
    version: String,
}

impl CacheManager {
    /// Creates a manager gated on [`CURRENT_CACHE_VERSION`].
    pub fn new(source: Arc<dyn SnapshotSource>, store: Arc<dyn CacheStore>) -> Self {
        Self::with_version(source, store, CURRENT_CACHE_VERSION)
    }

    /// Creates a manager gated on an operator-supplied version.
    pub fn with_version(
        source: Arc<dyn SnapshotSource>,
        store: Arc<dyn CacheStore>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            version: version.into(),
        }
    }

    pub fn current_version(&self) -> &str {
        &self.version
    }

    /// Returns the teacher's classrooms, rebuilding the entry first if it is
    /// absent or was built under another version.
    pub async fn load(&self, teacher: &TeacherKey) -> Result<Vec<Course>, CacheError> {
        Ok(self.load_detailed(teacher).await?.classrooms)
    }

    /// Like [`CacheManager::load`], but also reports how the load was satisfied.
    pub async fn load_detailed(&self, teacher: &TeacherKey) -> Result<CacheLoad, CacheError> {
        // A store that cannot be read is treated like a miss; the rebuild will
        // surface a persistence error if the store is really down.
        let stored = match self.store.get(teacher).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(teacher = %teacher, "Failed to read cache entry, rebuilding: {}", e);
                None
            }
        };

        let origin = match stored {
            Some(entry) if entry.is_valid_for(&self.version) => {
                debug!(teacher = %teacher, version = %entry.version, "Classroom cache hit");
                return Ok(CacheLoad {
                    classrooms: entry.classrooms,
                    origin: CacheOrigin::Hit,
                    version: entry.version,
                    timestamp: entry.timestamp,
                });
            }
            Some(entry) => {
                info!(
                    teacher = %teacher,
                    stale_version = %entry.version,
                    current_version = %self.version,
                    "Classroom cache is stale"
                );
                CacheOrigin::Rebuilt {
                    stale_version: entry.version,
                }
            }
            None => {
                info!(teacher = %teacher, "No classroom cache entry yet");
                CacheOrigin::Built
            }
        };

        let entry = self.rebuild(teacher).await?;
        Ok(CacheLoad {
            classrooms: entry.classrooms,
            origin,
            version: entry.version,
            timestamp: entry.timestamp,
        })
    }

    /// Deletes the teacher's entry. Clearing an absent entry is a no-op.
    pub async fn clear(&self, teacher: &TeacherKey) -> Result<(), CacheError> {
        self.store.delete(teacher).await.map_err(|e| {
            error!(teacher = %teacher, "Failed to clear classroom cache: {}", e);
            CacheError::Persistence {
                reason: e.to_string(),
                computed: None,
            }
        })?;
        info!(teacher = %teacher, "Cleared classroom cache");
        Ok(())
    }

    /// Reports what the store holds for the teacher without rebuilding anything.
    pub async fn entry_state(&self, teacher: &TeacherKey) -> Result<EntryState, CacheError> {
        let stored = self
            .store
            .get(teacher)
            .await
            .map_err(|e| CacheError::Persistence {
                reason: e.to_string(),
                computed: None,
            })?;

        Ok(match stored {
            None => EntryState::Absent,
            Some(entry) if entry.is_valid_for(&self.version) => EntryState::Valid {
                timestamp: entry.timestamp,
            },
            Some(entry) => EntryState::Stale {
                version: entry.version,
            },
        })
    }

    /// Fetches, transforms and persists. Nothing is written unless the fetch
    /// and the transform both succeed, and the store generation read before
    /// the fetch is still current.
    async fn rebuild(&self, teacher: &TeacherKey) -> Result<CacheEntry, CacheError> {
        let generation = self.store.generation(teacher).await;

        let snapshot = self
            .source
            .fetch_snapshot(teacher)
            .await
            .map_err(|e| match e {
                PortError::Malformed(reason) => CacheError::Validation {
                    record: "snapshot".to_string(),
                    reason,
                },
                e => {
                    error!(teacher = %teacher, "Failed to fetch classroom snapshot: {}", e);
                    CacheError::SourceUnavailable(e.to_string())
                }
            })?;

        check_snapshot_owner(&snapshot, teacher)?;
        let classrooms = transform_snapshot(&snapshot)?;

        let generation = match generation {
            Ok(generation) => generation,
            Err(e) => {
                error!(teacher = %teacher, "Failed to read cache generation: {}", e);
                return Err(CacheError::Persistence {
                    reason: e.to_string(),
                    computed: Some(classrooms),
                });
            }
        };
        let entry = CacheEntry::new(self.version.clone(), classrooms).for_generation(generation);

        match self.store.put(teacher, &entry).await {
            Ok(()) => {}
            Err(PortError::Conflict(reason)) => {
                info!(teacher = %teacher, "Cache cleared during rebuild, result not stored: {}", reason);
                return Err(CacheError::Persistence {
                    reason,
                    computed: Some(entry.classrooms),
                });
            }
            Err(e) => {
                error!(teacher = %teacher, "Failed to persist rebuilt classroom cache: {}", e);
                return Err(CacheError::Persistence {
                    reason: e.to_string(),
                    computed: Some(entry.classrooms),
                });
            }
        }

        info!(
            teacher = %teacher,
            version = %entry.version,
            generation = entry.generation,
            courses = entry.classrooms.len(),
            "Rebuilt classroom cache"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClassroomSnapshot;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    //=====================================================================================
    // Mock Collaborators
    //=====================================================================================

    struct MockSource {
        snapshot: Mutex<serde_json::Value>,
        fetches: AtomicUsize,
        unavailable: AtomicBool,
    }

    impl MockSource {
        fn new(snapshot: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                snapshot: Mutex::new(snapshot),
                fetches: AtomicUsize::new(0),
                unavailable: AtomicBool::new(false),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn go_down(&self) {
            self.unavailable.store(true, Ordering::SeqCst);
        }

        fn replace(&self, snapshot: serde_json::Value) {
            *self.snapshot.lock().unwrap() = snapshot;
        }
    }

    #[async_trait]
    impl SnapshotSource for MockSource {
        async fn fetch_snapshot(&self, _teacher: &TeacherKey) -> PortResult<ClassroomSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("upstream is down".to_string()));
            }
            let value = self.snapshot.lock().unwrap().clone();
            serde_json::from_value(value).map_err(|e| PortError::Malformed(e.to_string()))
        }
    }

    /// Holds its first fetch open, after reading the snapshot, until released.
    struct GatedSource {
        inner: Arc<MockSource>,
        hold_next: AtomicBool,
        fetched: Notify,
        release: Notify,
    }

    impl GatedSource {
        fn new(inner: Arc<MockSource>) -> Arc<Self> {
            Arc::new(Self {
                inner,
                hold_next: AtomicBool::new(true),
                fetched: Notify::new(),
                release: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl SnapshotSource for GatedSource {
        async fn fetch_snapshot(&self, teacher: &TeacherKey) -> PortResult<ClassroomSnapshot> {
            let snapshot = self.inner.fetch_snapshot(teacher).await;
            if self.hold_next.swap(false, Ordering::SeqCst) {
                self.fetched.notify_one();
                self.release.notified().await;
            }
            snapshot
        }
    }

    #[derive(Default)]
    struct MockStore {
        entries: Mutex<HashMap<TeacherKey, CacheEntry>>,
        generations: Mutex<HashMap<TeacherKey, u64>>,
        reject_writes: AtomicBool,
        reject_reads: AtomicBool,
    }

    impl MockStore {
        fn entry(&self, teacher: &TeacherKey) -> Option<CacheEntry> {
            self.entries.lock().unwrap().get(teacher).cloned()
        }
    }

    #[async_trait]
    impl CacheStore for MockStore {
        async fn get(&self, teacher: &TeacherKey) -> PortResult<Option<CacheEntry>> {
            if self.reject_reads.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("read refused".to_string()));
            }
            Ok(self.entry(teacher))
        }

        async fn generation(&self, teacher: &TeacherKey) -> PortResult<u64> {
            Ok(self.generations.lock().unwrap().get(teacher).copied().unwrap_or(0))
        }

        async fn put(&self, teacher: &TeacherKey, entry: &CacheEntry) -> PortResult<()> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(PortError::Unexpected("write refused".to_string()));
            }
            let current = self.generations.lock().unwrap().get(teacher).copied().unwrap_or(0);
            if entry.generation != current {
                return Err(PortError::Conflict(format!(
                    "entry built at generation {}, store is at {}",
                    entry.generation, current
                )));
            }
            self.entries
                .lock()
                .unwrap()
                .insert(teacher.clone(), entry.clone());
            Ok(())
        }

        async fn delete(&self, teacher: &TeacherKey) -> PortResult<()> {
            self.entries.lock().unwrap().remove(teacher);
            *self
                .generations
                .lock()
                .unwrap()
                .entry(teacher.clone())
                .or_insert(0) += 1;
            Ok(())
        }
    }

    fn teacher() -> TeacherKey {
        TeacherKey::parse("teacher@school.example").unwrap()
    }

    fn one_course_snapshot() -> serde_json::Value {
        json!({
            "courses": [{
                "id": "c1",
                "assignments": [{ "id": "a1" }],
                "students": [],
                "submissions": []
            }]
        })
    }

    fn manager(source: &Arc<MockSource>, store: &Arc<MockStore>, version: &str) -> CacheManager {
        CacheManager::with_version(source.clone(), store.clone(), version)
    }

    //=====================================================================================
    // Tests
    //=====================================================================================

    #[tokio::test]
    async fn first_load_builds_and_returns_transformed_courses() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        let loaded = cache.load_detailed(&teacher()).await.unwrap();

        assert_eq!(loaded.origin, CacheOrigin::Built);
        assert_eq!(
            serde_json::to_value(&loaded.classrooms).unwrap(),
            json!([{ "id": "c1", "assignments": [{ "id": "a1" }], "students": [], "submissions": [] }])
        );
        let stored = store.entry(&teacher()).unwrap();
        assert_eq!(stored.version, "1.0.0");
        assert_eq!(stored.classrooms, loaded.classrooms);
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        let first = cache.load(&teacher()).await.unwrap();
        let second = cache.load_detailed(&teacher()).await.unwrap();

        assert_eq!(source.fetches(), 1);
        assert_eq!(second.origin, CacheOrigin::Hit);
        assert_eq!(second.classrooms, first);
    }

    #[tokio::test]
    async fn version_bump_triggers_exactly_one_rebuild() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        manager(&source, &store, "1.0.0").load(&teacher()).await.unwrap();

        let bumped = manager(&source, &store, "1.1.0");
        let rebuilt = bumped.load_detailed(&teacher()).await.unwrap();
        let again = bumped.load_detailed(&teacher()).await.unwrap();

        assert_eq!(
            rebuilt.origin,
            CacheOrigin::Rebuilt {
                stale_version: "1.0.0".to_string()
            }
        );
        assert_eq!(again.origin, CacheOrigin::Hit);
        assert_eq!(source.fetches(), 2);
        assert_eq!(store.entry(&teacher()).unwrap().version, "1.1.0");
    }

    #[tokio::test]
    async fn clear_then_load_rebuilds() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        cache.load(&teacher()).await.unwrap();
        cache.clear(&teacher()).await.unwrap();
        let loaded = cache.load_detailed(&teacher()).await.unwrap();

        assert_eq!(loaded.origin, CacheOrigin::Built);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn clearing_an_absent_entry_is_not_an_error() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        cache.clear(&teacher()).await.unwrap();
        cache.clear(&teacher()).await.unwrap();
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn source_outage_keeps_serving_a_current_entry() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");
        let original = cache.load(&teacher()).await.unwrap();

        source.go_down();

        assert_eq!(cache.load(&teacher()).await.unwrap(), original);
    }

    #[tokio::test]
    async fn source_outage_after_version_bump_fails_and_leaves_entry_untouched() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        manager(&source, &store, "1.0.0").load(&teacher()).await.unwrap();
        let before = store.entry(&teacher()).unwrap();

        source.go_down();
        let result = manager(&source, &store, "2.0.0").load(&teacher()).await;

        assert!(matches!(result, Err(CacheError::SourceUnavailable(_))));
        assert_eq!(store.entry(&teacher()).unwrap(), before);
    }

    #[tokio::test]
    async fn failed_write_still_returns_computed_classrooms_once() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        store.reject_writes.store(true, Ordering::SeqCst);
        let cache = manager(&source, &store, "1.0.0");

        let err = cache.load(&teacher()).await.unwrap_err();
        assert!(matches!(err, CacheError::Persistence { .. }));
        let computed = err.into_computed().unwrap();
        assert_eq!(computed[0].id, "c1");
        assert!(store.entry(&teacher()).is_none());

        let _ = cache.load(&teacher()).await;
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn invalid_snapshot_does_not_overwrite_existing_entry() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        manager(&source, &store, "1.0.0").load(&teacher()).await.unwrap();
        let before = store.entry(&teacher()).unwrap();

        source.replace(json!({ "classrooms": [{ "name": "no id" }] }));
        let result = manager(&source, &store, "1.1.0").load(&teacher()).await;

        assert!(matches!(result, Err(CacheError::Validation { .. })));
        assert_eq!(store.entry(&teacher()).unwrap(), before);
    }

    #[tokio::test]
    async fn malformed_course_record_is_a_validation_error() {
        let source = MockSource::new(json!({
            "classrooms": [{ "id": "c1" }, { "id": 42, "name": "Physics" }]
        }));
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        match cache.load(&teacher()).await {
            Err(CacheError::Validation { record, .. }) => assert_eq!(record, "course #1 (Physics)"),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(store.entry(&teacher()).is_none());
    }

    #[tokio::test]
    async fn undecodable_snapshot_is_a_validation_error() {
        let source = MockSource::new(json!({ "classrooms": "not a list" }));
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        assert!(matches!(
            cache.load(&teacher()).await,
            Err(CacheError::Validation { record, .. }) if record == "snapshot"
        ));
    }

    #[tokio::test]
    async fn clear_during_rebuild_discards_the_outdated_result() {
        let source = MockSource::new(json!({ "classrooms": [{ "id": "old" }] }));
        let gated = GatedSource::new(source.clone());
        let store = Arc::new(MockStore::default());
        let cache = CacheManager::with_version(gated.clone(), store.clone(), "1.0.0");

        let in_flight = tokio::spawn({
            let cache = cache.clone();
            async move { cache.load(&teacher()).await }
        });
        gated.fetched.notified().await;

        source.replace(json!({ "classrooms": [{ "id": "new1" }, { "id": "new2" }] }));
        cache.clear(&teacher()).await.unwrap();
        gated.release.notify_one();

        let computed = in_flight.await.unwrap().unwrap_err().into_computed().unwrap();
        assert_eq!(computed[0].id, "old");
        assert!(store.entry(&teacher()).is_none());

        let loaded = cache.load_detailed(&teacher()).await.unwrap();
        let ids: Vec<_> = loaded.classrooms.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(loaded.origin, CacheOrigin::Built);
        assert_eq!(ids, ["new1", "new2"]);
        assert_eq!(store.entry(&teacher()).unwrap().generation, 1);
    }

    #[tokio::test]
    async fn snapshot_for_another_teacher_is_rejected() {
        let source = MockSource::new(json!({
            "teacher": { "email": "other@school.example" },
            "classrooms": [{ "id": "c1" }]
        }));
        let store = Arc::new(MockStore::default());
        let cache = manager(&source, &store, "1.0.0");

        let result = cache.load(&teacher()).await;

        assert!(matches!(result, Err(CacheError::Validation { .. })));
        assert!(store.entry(&teacher()).is_none());
    }

    #[tokio::test]
    async fn unreadable_store_falls_back_to_rebuild() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        store.reject_reads.store(true, Ordering::SeqCst);
        let cache = manager(&source, &store, "1.0.0");

        let loaded = cache.load_detailed(&teacher()).await.unwrap();

        assert_eq!(loaded.origin, CacheOrigin::Built);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn entry_state_tracks_the_lifecycle() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let v1 = manager(&source, &store, "1.0.0");
        let v2 = manager(&source, &store, "2.0.0");

        assert_eq!(v1.entry_state(&teacher()).await.unwrap(), EntryState::Absent);

        v1.load(&teacher()).await.unwrap();
        assert!(matches!(
            v1.entry_state(&teacher()).await.unwrap(),
            EntryState::Valid { .. }
        ));
        assert_eq!(
            v2.entry_state(&teacher()).await.unwrap(),
            EntryState::Stale {
                version: "1.0.0".to_string()
            }
        );
        assert_eq!(source.fetches(), 1);
    }

    #[test]
    fn default_manager_uses_the_compiled_version() {
        let source = MockSource::new(one_course_snapshot());
        let store = Arc::new(MockStore::default());
        let cache = CacheManager::new(source, store);
        assert_eq!(cache.current_version(), CURRENT_CACHE_VERSION);
    }
}
