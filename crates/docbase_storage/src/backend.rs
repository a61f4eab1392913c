//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::keyspace::Keyspace;

/// Write behavior for [`StorageBackend::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with `KeyExists` if the key is already present.
    Insert,
    /// Replace any existing value for the key.
    Upsert,
}

/// A low-level document storage backend for docbase.
///
/// Storage backends are **opaque byte stores** keyed by `(keyspace, key)`.
/// They provide atomic per-key operations and know nothing about document
/// structure, schemas, or indexes - the engine owns all interpretation of
/// the stored bytes.
///
/// # Invariants
///
/// - `put` with [`WriteMode::Insert`] either stores the value or fails
///   without modifying anything
/// - `get` returns exactly the bytes most recently stored for the key
/// - `scan` returns entries in ascending key order
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For tests and ephemeral engines
/// - [`super::LogBackend`] - For persistent append-only storage
pub trait StorageBackend: Send + Sync {
    /// Stores `value` under `key` within `keyspace`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key already exists and `mode` is [`WriteMode::Insert`]
    /// - An I/O error occurs
    fn put(
        &self,
        keyspace: &Keyspace,
        key: &str,
        value: &[u8],
        mode: WriteMode,
    ) -> StorageResult<()>;

    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn get(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Removes the value stored under `key`.
    ///
    /// Returns the bytes that were stored, or `None` if the key was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn delete(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns all entries in `keyspace` in ascending key order.
    ///
    /// An empty or unknown keyspace yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn scan(&self, keyspace: &Keyspace) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Returns the number of entries in `keyspace`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn count(&self, keyspace: &Keyspace) -> StorageResult<usize>;

    /// Returns every keyspace that currently holds at least one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn keyspaces(&self) -> StorageResult<Vec<Keyspace>>;

    /// Flushes all pending writes to durable storage.
    ///
    /// After this returns successfully, all previously written data
    /// is guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;
}
