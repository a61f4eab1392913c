//! Append-only log backend for persistent storage.
//!
//! The data log is a sequence of framed records, one per mutation:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK         # Advisory lock for single-writer
//! └─ data.log     # Append-only record log
//! ```
//!
//! On open, the log is replayed into an in-memory table. Replay is
//! truncation-tolerant: a partial record at the tail (for example after
//! a crash mid-append) is discarded and the log is trimmed back to the
//! last complete record.

use crate::backend::{StorageBackend, WriteMode};
use crate::error::{StorageError, StorageResult};
use crate::keyspace::Keyspace;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a docbase data log.
pub const LOG_MAGIC: [u8; 4] = *b"DLOG";

/// Current data log format version.
pub const LOG_VERSION: u16 = 1;

/// File names within the data directory.
const LOG_FILE: &str = "data.log";
const LOCK_FILE: &str = "LOCK";

/// Upper bound on a single stored value, used to reject garbage lengths
/// during replay before attempting a huge allocation.
const MAX_VALUE_LEN: u32 = 64 * 1024 * 1024;

/// Type of data log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Store a value under a key.
    Put = 1,
    /// Remove a key.
    Delete = 2,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single data log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Store a value under a key.
    Put {
        /// Keyspace the entry belongs to.
        keyspace: Keyspace,
        /// Entry key.
        key: String,
        /// Entry value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Keyspace the entry belongs to.
        keyspace: Keyspace,
        /// Entry key.
        key: String,
    },
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Put { .. } => LogRecordType::Put,
            Self::Delete { .. } => LogRecordType::Delete,
        }
    }

    /// Returns the keyspace this record addresses.
    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        match self {
            Self::Put { keyspace, .. } | Self::Delete { keyspace, .. } => keyspace,
        }
    }

    /// Returns the key this record addresses.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    /// Encodes the record into its framed byte representation.
    ///
    /// Frame layout, all integers little-endian:
    ///
    /// ```text
    /// tag(1) | tenant_len(u16) | collection_len(u16) | key_len(u16) | value_len(u32)
    ///        | tenant | collection | key | value
    /// ```
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let (keyspace, key, value) = match self {
            Self::Put {
                keyspace,
                key,
                value,
            } => (keyspace, key.as_str(), value.as_slice()),
            Self::Delete { keyspace, key } => (keyspace, key.as_str(), &[][..]),
        };

        let tenant = keyspace.tenant.as_bytes();
        let collection = keyspace.collection.as_bytes();
        let key_bytes = key.as_bytes();

        let mut buf =
            Vec::with_capacity(11 + tenant.len() + collection.len() + key_bytes.len() + value.len());
        buf.push(self.record_type().as_byte());
        buf.extend_from_slice(&(tenant.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(collection.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(key_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(tenant);
        buf.extend_from_slice(collection);
        buf.extend_from_slice(key_bytes);
        buf.extend_from_slice(value);
        buf
    }

    /// Decodes one record from the front of `data`.
    ///
    /// Returns the record and the number of bytes consumed, or `None` if
    /// `data` holds only a partial record (truncated tail).
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the bytes are complete but not a valid record.
    pub fn decode(data: &[u8]) -> StorageResult<Option<(Self, usize)>> {
        const HEADER_LEN: usize = 11;

        if data.len() < HEADER_LEN {
            return Ok(None);
        }

        let tag = data[0];
        let record_type = LogRecordType::from_byte(tag)
            .ok_or_else(|| StorageError::corrupted(format!("unknown record tag {tag}")))?;

        let tenant_len = u16::from_le_bytes([data[1], data[2]]) as usize;
        let collection_len = u16::from_le_bytes([data[3], data[4]]) as usize;
        let key_len = u16::from_le_bytes([data[5], data[6]]) as usize;
        let value_len = u32::from_le_bytes([data[7], data[8], data[9], data[10]]);

        if value_len > MAX_VALUE_LEN {
            return Err(StorageError::corrupted(format!(
                "value length {value_len} exceeds maximum {MAX_VALUE_LEN}"
            )));
        }
        if record_type == LogRecordType::Delete && value_len != 0 {
            return Err(StorageError::corrupted(
                "delete record carries a value payload",
            ));
        }

        let total = HEADER_LEN + tenant_len + collection_len + key_len + value_len as usize;
        if data.len() < total {
            return Ok(None);
        }

        let mut pos = HEADER_LEN;
        let mut take = |len: usize| {
            let slice = &data[pos..pos + len];
            pos += len;
            slice
        };

        let tenant = str_field(take(tenant_len), "tenant")?;
        let collection = str_field(take(collection_len), "collection")?;
        let key = str_field(take(key_len), "key")?;
        let keyspace = Keyspace::new(tenant, collection);

        let record = match record_type {
            LogRecordType::Put => Self::Put {
                keyspace,
                key,
                value: take(value_len as usize).to_vec(),
            },
            LogRecordType::Delete => Self::Delete { keyspace, key },
        };

        Ok(Some((record, total)))
    }
}

fn str_field(bytes: &[u8], name: &str) -> StorageResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| StorageError::corrupted(format!("{name} field is not valid UTF-8")))
}

/// Reads all complete records from a data log file.
///
/// A partial record at the tail is ignored, matching replay behavior.
/// This is the read path used by `docbase inspect`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the header is not a
/// docbase data log, or a complete record fails to decode.
pub fn read_log(path: &Path) -> StorageResult<Vec<LogRecord>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let (records, _) = decode_all(&data)?;
    Ok(records)
}

/// Decodes the header and all complete records, returning the records and
/// the byte offset of the last complete record's end.
fn decode_all(data: &[u8]) -> StorageResult<(Vec<LogRecord>, u64)> {
    const FILE_HEADER_LEN: usize = 6;

    if data.is_empty() {
        return Ok((Vec::new(), 0));
    }
    if data.len() < FILE_HEADER_LEN || data[0..4] != LOG_MAGIC {
        return Err(StorageError::corrupted("missing data log header"));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    if version != LOG_VERSION {
        return Err(StorageError::corrupted(format!(
            "unsupported data log version {version}"
        )));
    }

    let mut records = Vec::new();
    let mut offset = FILE_HEADER_LEN;
    while let Some((record, consumed)) = LogRecord::decode(&data[offset..])? {
        records.push(record);
        offset += consumed;
    }

    Ok((records, offset as u64))
}

/// A persistent storage backend built on an append-only record log.
///
/// Every mutation appends one framed record to `data.log`. The full
/// table is kept in memory and rebuilt by replaying the log on open.
///
/// # Thread Safety
///
/// The backend is thread-safe. An advisory `LOCK` file guarantees a
/// single writing process per data directory.
///
/// # Example
///
/// ```no_run
/// use docbase_storage::{Keyspace, LogBackend, StorageBackend, WriteMode};
/// use std::path::Path;
///
/// let backend = LogBackend::open(Path::new("data")).unwrap();
/// let ks = Keyspace::new("acme", "orders");
/// backend.put(&ks, "o-1", b"{}", WriteMode::Insert).unwrap();
/// backend.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct LogBackend {
    path: PathBuf,
    file: Mutex<File>,
    state: RwLock<HashMap<Keyspace, BTreeMap<String, Vec<u8>>>>,
    _lock_file: File,
}

impl LogBackend {
    /// Opens or creates a data directory and replays its log.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory
    /// - Another process holds the directory lock (`DirectoryLocked`)
    /// - The log header or a complete record is corrupted
    /// - An I/O error occurs
    pub fn open(dir: &Path) -> StorageResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        if !dir.is_dir() {
            return Err(StorageError::invalid_directory(format!(
                "path is not a directory: {}",
                dir.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::DirectoryLocked);
        }

        let log_path = dir.join(LOG_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&log_path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let mut state: HashMap<Keyspace, BTreeMap<String, Vec<u8>>> = HashMap::new();
        let valid_len = if data.is_empty() {
            // Fresh log, write the header
            file.write_all(&LOG_MAGIC)?;
            file.write_all(&LOG_VERSION.to_le_bytes())?;
            6
        } else {
            let (records, valid_len) = decode_all(&data)?;
            for record in records {
                match record {
                    LogRecord::Put {
                        keyspace,
                        key,
                        value,
                    } => {
                        state.entry(keyspace).or_default().insert(key, value);
                    }
                    LogRecord::Delete { keyspace, key } => {
                        if let Some(space) = state.get_mut(&keyspace) {
                            space.remove(&key);
                            if space.is_empty() {
                                state.remove(&keyspace);
                            }
                        }
                    }
                }
            }
            valid_len
        };

        // Trim a partial tail record so appends resume on a frame boundary
        if valid_len < data.len() as u64 {
            file.set_len(valid_len)?;
        }
        file.sync_all()?;

        Ok(Self {
            path: dir.to_path_buf(),
            file: Mutex::new(file),
            state: RwLock::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the log file inside a data directory.
    #[must_use]
    pub fn log_path(dir: &Path) -> PathBuf {
        dir.join(LOG_FILE)
    }

    fn append(&self, record: &LogRecord) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.write_all(&record.encode())?;
        Ok(())
    }
}

impl StorageBackend for LogBackend {
    fn put(
        &self,
        keyspace: &Keyspace,
        key: &str,
        value: &[u8],
        mode: WriteMode,
    ) -> StorageResult<()> {
        let mut state = self.state.write();
        let space = state.entry(keyspace.clone()).or_default();

        if mode == WriteMode::Insert && space.contains_key(key) {
            return Err(StorageError::key_exists(key));
        }

        self.append(&LogRecord::Put {
            keyspace: keyspace.clone(),
            key: key.to_string(),
            value: value.to_vec(),
        })?;

        space.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let state = self.state.read();
        Ok(state
            .get(keyspace)
            .and_then(|space| space.get(key).cloned()))
    }

    fn delete(&self, keyspace: &Keyspace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let mut state = self.state.write();
        let Some(space) = state.get_mut(keyspace) else {
            return Ok(None);
        };
        if !space.contains_key(key) {
            return Ok(None);
        }

        self.append(&LogRecord::Delete {
            keyspace: keyspace.clone(),
            key: key.to_string(),
        })?;

        let prior = space.remove(key);
        if space.is_empty() {
            state.remove(keyspace);
        }
        Ok(prior)
    }

    fn scan(&self, keyspace: &Keyspace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let state = self.state.read();
        Ok(state
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
        let state = self.state.read();
        Ok(state.get(keyspace).map_or(0, BTreeMap::len))
    }

    fn keyspaces(&self) -> StorageResult<Vec<Keyspace>> {
        let state = self.state.read();
        let mut spaces: Vec<Keyspace> = state.keys().cloned().collect();
        spaces.sort();
        Ok(spaces)
    }

    fn flush(&self) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ks() -> Keyspace {
        Keyspace::new("acme", "orders")
    }

    #[test]
    fn log_open_creates_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        let backend = LogBackend::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(backend.path(), dir);
        assert!(LogBackend::log_path(&dir).exists());
    }

    #[test]
    fn log_lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        let _first = LogBackend::open(&dir).unwrap();
        let result = LogBackend::open(&dir);
        assert!(matches!(result, Err(StorageError::DirectoryLocked)));
    }

    #[test]
    fn log_lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        {
            let _backend = LogBackend::open(&dir).unwrap();
        }
        let _reopened = LogBackend::open(&dir).unwrap();
    }

    #[test]
    fn log_put_get_delete() {
        let temp = tempdir().unwrap();
        let backend = LogBackend::open(&temp.path().join("data")).unwrap();

        backend.put(&ks(), "o-1", b"alpha", WriteMode::Insert).unwrap();
        assert_eq!(backend.get(&ks(), "o-1").unwrap(), Some(b"alpha".to_vec()));

        assert_eq!(backend.delete(&ks(), "o-1").unwrap(), Some(b"alpha".to_vec()));
        assert_eq!(backend.get(&ks(), "o-1").unwrap(), None);
    }

    #[test]
    fn log_insert_mode_rejects_duplicate() {
        let temp = tempdir().unwrap();
        let backend = LogBackend::open(&temp.path().join("data")).unwrap();

        backend.put(&ks(), "o-1", b"first", WriteMode::Insert).unwrap();
        let result = backend.put(&ks(), "o-1", b"second", WriteMode::Insert);
        assert!(matches!(result, Err(StorageError::KeyExists { .. })));
    }

    #[test]
    fn log_state_survives_reopen() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        {
            let backend = LogBackend::open(&dir).unwrap();
            backend.put(&ks(), "o-1", b"alpha", WriteMode::Insert).unwrap();
            backend.put(&ks(), "o-2", b"beta", WriteMode::Insert).unwrap();
            backend.put(&ks(), "o-1", b"gamma", WriteMode::Upsert).unwrap();
            backend.delete(&ks(), "o-2").unwrap();
            backend.flush().unwrap();
        }

        let backend = LogBackend::open(&dir).unwrap();
        assert_eq!(backend.get(&ks(), "o-1").unwrap(), Some(b"gamma".to_vec()));
        assert_eq!(backend.get(&ks(), "o-2").unwrap(), None);
        assert_eq!(backend.count(&ks()).unwrap(), 1);
    }

    #[test]
    fn log_partial_tail_record_is_discarded() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        {
            let backend = LogBackend::open(&dir).unwrap();
            backend.put(&ks(), "o-1", b"alpha", WriteMode::Insert).unwrap();
            backend.flush().unwrap();
        }

        // Simulate a crash mid-append: a record header with no payload
        {
            let mut file = OpenOptions::new()
                .append(true)
                .open(LogBackend::log_path(&dir))
                .unwrap();
            file.write_all(&[LogRecordType::Put.as_byte(), 4, 0]).unwrap();
        }

        let backend = LogBackend::open(&dir).unwrap();
        assert_eq!(backend.get(&ks(), "o-1").unwrap(), Some(b"alpha".to_vec()));

        // The trimmed log accepts appends again and replays cleanly
        backend.put(&ks(), "o-2", b"beta", WriteMode::Insert).unwrap();
        backend.flush().unwrap();
        drop(backend);

        let backend = LogBackend::open(&dir).unwrap();
        assert_eq!(backend.count(&ks()).unwrap(), 2);
    }

    #[test]
    fn log_corrupt_header_is_rejected() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");
        fs::create_dir_all(&dir).unwrap();
        fs::write(LogBackend::log_path(&dir), b"not a data log").unwrap();

        let result = LogBackend::open(&dir);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn log_read_log_lists_records() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("data");

        {
            let backend = LogBackend::open(&dir).unwrap();
            backend.put(&ks(), "o-1", b"alpha", WriteMode::Insert).unwrap();
            backend.delete(&ks(), "o-1").unwrap();
            backend.flush().unwrap();
        }

        let records = read_log(&LogBackend::log_path(&dir)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type(), LogRecordType::Put);
        assert_eq!(records[1].record_type(), LogRecordType::Delete);
        assert_eq!(records[0].key(), "o-1");
        assert_eq!(records[0].keyspace(), &ks());
    }

    #[test]
    fn record_encode_decode_round_trip() {
        let record = LogRecord::Put {
            keyspace: ks(),
            key: "o-1".to_string(),
            value: b"payload".to_vec(),
        };

        let encoded = record.encode();
        let (decoded, consumed) = LogRecord::decode(&encoded).unwrap().unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn record_decode_partial_returns_none() {
        let record = LogRecord::Put {
            keyspace: ks(),
            key: "o-1".to_string(),
            value: b"payload".to_vec(),
        };
        let encoded = record.encode();

        assert!(LogRecord::decode(&encoded[..5]).unwrap().is_none());
        assert!(LogRecord::decode(&encoded[..encoded.len() - 1])
            .unwrap()
            .is_none());
    }

    #[test]
    fn record_decode_unknown_tag_fails() {
        let mut encoded = LogRecord::Delete {
            keyspace: ks(),
            key: "o-1".to_string(),
        }
        .encode();
        encoded[0] = 0xFF;

        let result = LogRecord::decode(&encoded);
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }
}
