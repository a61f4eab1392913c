//! Store fixtures with automatic cleanup.
//!
//! Provides convenience constructors for in-memory and log-backed
//! stores plus pre-populated scenarios for query and index tests.

use docbase_core::{DocumentStore, EngineConfig, InsertOptions, TenantId};
use docbase_storage::{InMemoryBackend, LogBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: DocumentStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory test store with default configuration.
    pub fn memory() -> Self {
        Self::memory_with(EngineConfig::default())
    }

    /// Creates an in-memory test store with the given configuration.
    pub fn memory_with(config: EngineConfig) -> Self {
        Self {
            store: DocumentStore::new(Arc::new(InMemoryBackend::new()), config),
            _temp_dir: None,
        }
    }

    /// Creates a log-backed test store in a temporary directory.
    pub fn log() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let backend = LogBackend::open(temp_dir.path()).expect("failed to open log backend");
        Self {
            store: DocumentStore::new(Arc::new(backend), EngineConfig::default()),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if log-backed, `None` if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }
}

impl std::ops::Deref for TestStore {
    type Target = DocumentStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use docbase_testkit::with_temp_store;
///
/// #[test]
/// fn my_test() {
///     with_temp_store(|store| {
///         // ... store operations
///     });
/// }
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&DocumentStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary log-backed store.
pub fn with_log_store<F, R>(f: F) -> R
where
    F: FnOnce(&DocumentStore, &std::path::Path) -> R,
{
    let test_store = TestStore::log();
    let path = test_store.path().expect("log store should have a path");
    f(&test_store.store, &path)
}

/// The tenant used by scenario fixtures.
pub fn scenario_tenant() -> TenantId {
    TenantId::new("fixture-tenant")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use serde_json::json;

    /// Creates a store pre-populated with `count` documents in the
    /// `items` collection.
    ///
    /// Documents carry a sequential `seq` number, a `bucket` string
    /// cycling through `a`/`b`/`c`, and an `even` boolean, giving
    /// filter and sort tests a predictable shape.
    pub fn populated_store(count: usize) -> TestStore {
        let test_store = TestStore::memory();
        let tenant = scenario_tenant();
        let options = InsertOptions::new();

        for seq in 0..count {
            let bucket = ["a", "b", "c"][seq % 3];
            test_store
                .store
                .insert(
                    &tenant,
                    "items",
                    json!({"seq": seq, "bucket": bucket, "even": seq % 2 == 0}),
                    &options,
                )
                .expect("failed to seed document");
        }

        test_store
    }
}
