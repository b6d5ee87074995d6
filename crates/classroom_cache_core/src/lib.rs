pub mod anonymize;
pub mod cache;
pub mod domain;
pub mod error;
pub mod ports;
pub mod transform;

pub use cache::CacheManager;
pub use domain::{
    CacheEntry, CacheLoad, CacheOrigin, ClassroomSnapshot, Course, EntryState, SnapshotCourse,
    SnapshotTeacher, TeacherKey, CURRENT_CACHE_VERSION,
};
pub use error::CacheError;
pub use ports::{CacheStore, PortError, PortResult, SnapshotSink, SnapshotSource};
pub use transform::transform_snapshot;
