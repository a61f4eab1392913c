//! # docbase Storage
//!
//! Storage backend trait and implementations for docbase.
//!
//! This crate provides the lowest-level storage abstraction for docbase.
//! Storage backends are **opaque byte stores** keyed by `(keyspace, key)` -
//! they do not interpret the data they store.
//!
//! ## Design Principles
//!
//! - Backends expose atomic per-key operations (put, get, delete, scan)
//! - Entries are namespaced by [`Keyspace`] (tenant + collection)
//! - No knowledge of document structure, schemas, or indexes
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral engines
//! - [`LogBackend`] - Persistent append-only record log
//!
//! ## Example
//!
//! ```rust
//! use docbase_storage::{InMemoryBackend, Keyspace, StorageBackend, WriteMode};
//!
//! let backend = InMemoryBackend::new();
//! let ks = Keyspace::new("acme", "orders");
//! backend.put(&ks, "o-1", b"{}", WriteMode::Insert).unwrap();
//! assert_eq!(backend.get(&ks, "o-1").unwrap(), Some(b"{}".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod keyspace;
mod log;
mod memory;

pub use backend::{StorageBackend, WriteMode};
pub use error::{StorageError, StorageResult};
pub use keyspace::Keyspace;
pub use log::{read_log, LogBackend, LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use memory::InMemoryBackend;
