pub mod db;
pub mod fixtures;
pub mod memory;

pub use db::DbAdapter;
pub use fixtures::FixtureSnapshotSource;
pub use memory::{InMemoryCacheStore, InMemorySnapshotStore};
