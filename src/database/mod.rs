pub mod connection;
pub mod engine;
pub mod error;
pub mod keys;
pub mod operations;
pub mod schema;

use std::path::PathBuf;

pub use engine::{StorageEngine, StorageHandle};
pub use error::StorageError;
pub use operations::{PointsQuery, RetentionSweep, Store};
pub use schema::SchemaVersion;

/// Settings for opening a store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub path: PathBuf,
    /// Size of the time windows points are partitioned into.
    pub window_size: time::Duration,
    /// Windows older than this are removed; zero disables retention.
    pub retention: time::Duration,
    /// Permits rewriting a legacy layout into the current one.
    pub allow_rewrite: bool,
    /// How long to wait for another process to release the file lock.
    pub lock_timeout: std::time::Duration,
}

impl StoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            window_size: time::Duration::days(1),
            retention: time::Duration::ZERO,
            allow_rewrite: false,
            lock_timeout: std::time::Duration::from_secs(1),
        }
    }
}
