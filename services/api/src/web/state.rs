//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use classroom_cache_core::{CacheManager, SnapshotSink};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub snapshots: Arc<dyn SnapshotSink>,
}
