//! In-memory storage backend for testing.

use crate::backend::{StorageBackend, WriteMode};
use crate::error::{StorageError, StorageResult};
use crate::keyspace::Keyspace;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral engines that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use docbase_storage::{InMemoryBackend, Keyspace, StorageBackend, WriteMode};
///
/// let backend = InMemoryBackend::new();
/// let ks = Keyspace::new("acme", "orders");
/// backend.put(&ks, "o-1", b"{}", WriteMode::Insert).unwrap();
/// assert_eq!(backend.get(&ks, "o-1").unwrap(), Some(b"{}".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<HashMap<Keyspace, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn put(
        &self,
        keyspace: &Keyspace,
        key: &str,
        value: &[u8],
        mode: WriteMode,
    ) -> StorageResult<()> {
        let mut data = self.data.write();
        let space = data.entry(keyspace.clone()).or_default();

        if mode == WriteMode::Insert && space.contains_key(key) {
            return Err(StorageError::key_exists(key));
        }

        space.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let data = self.data.read();
        Ok(data.get(keyspace).and_then(|space| space.get(key).cloned()))
    }

    fn delete(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut data = self.data.write();
        let Some(space) = data.get_mut(keyspace) else {
            return Ok(None);
        };

        let prior = space.remove(key);
        if space.is_empty() {
            data.remove(keyspace);
        }
        Ok(prior)
    }

    fn scan(&self, keyspace: &Keyspace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .get(keyspace)
            .map(|space| {
                space
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&self, keyspace: &Keyspace) -> StorageResult<usize> {
        let data = self.data.read();
        Ok(data.get(keyspace).map_or(0, BTreeMap::len))
    }

    fn keyspaces(&self) -> StorageResult<Vec<Keyspace>> {
        let data = self.data.read();
        let mut spaces: Vec<Keyspace> = data.keys().cloned().collect();
        spaces.sort();
        Ok(spaces)
    }

    fn flush(&self) -> StorageResult<()> {
        // In-memory backend has no pending writes
        Ok(())
    }
}
