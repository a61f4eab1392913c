//! Inspect command implementation.

use docbase_core::Document;
use docbase_storage::{read_log, LogBackend, LogRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store directory path.
    pub path: String,
    /// Data log size in bytes.
    pub log_size: u64,
    /// Number of log records.
    pub record_count: usize,
    /// Number of put records.
    pub put_count: usize,
    /// Number of delete records.
    pub delete_count: usize,
    /// Number of live documents after replay.
    pub live_documents: usize,
    /// Number of live values that do not decode as documents.
    pub malformed_documents: usize,
    /// Per-collection statistics (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<CollectionStats>>,
}

/// Statistics for a single tenant collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Owning tenant.
    pub tenant: String,
    /// Collection name.
    pub collection: String,
    /// Number of live documents.
    pub document_count: usize,
    /// Total live data size in bytes.
    pub data_size: usize,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    show_collections: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_path = LogBackend::log_path(path);
    if !log_path.exists() {
        return Err(format!("No store found at {:?}", path).into());
    }

    let log_size = std::fs::metadata(&log_path)?.len();
    let records = read_log(&log_path)?;
    tracing::debug!(records = records.len(), "replayed data log");

    let mut put_count = 0;
    let mut delete_count = 0;
    // Latest state per key after replay; None means deleted.
    let mut live: BTreeMap<(String, String, String), Option<Vec<u8>>> = BTreeMap::new();

    for record in &records {
        let slot = (
            record.keyspace().tenant.clone(),
            record.keyspace().collection.clone(),
            record.key().to_string(),
        );
        match record {
            LogRecord::Put { value, .. } => {
                put_count += 1;
                live.insert(slot, Some(value.clone()));
            }
            LogRecord::Delete { .. } => {
                delete_count += 1;
                live.insert(slot, None);
            }
        }
    }

    let mut live_documents = 0;
    let mut malformed_documents = 0;
    let mut collection_stats: BTreeMap<(String, String), (usize, usize)> = BTreeMap::new();

    for ((tenant, collection, _), value) in &live {
        let Some(bytes) = value else { continue };
        live_documents += 1;
        if Document::from_bytes(bytes).is_err() {
            malformed_documents += 1;
        }
        if show_collections {
            let entry = collection_stats
                .entry((tenant.clone(), collection.clone()))
                .or_insert((0, 0));
            entry.0 += 1;
            entry.1 += bytes.len();
        }
    }

    let result = InspectResult {
        path: path.display().to_string(),
        log_size,
        record_count: records.len(),
        put_count,
        delete_count,
        live_documents,
        malformed_documents,
        collections: show_collections.then(|| {
            collection_stats
                .into_iter()
                .map(|((tenant, collection), (count, size))| CollectionStats {
                    tenant,
                    collection,
                    document_count: count,
                    data_size: size,
                })
                .collect()
        }),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("docbase Store Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Data log:");
    println!("  Size:    {}", format_size(result.log_size));
    println!("  Records: {}", result.record_count);
    println!("  Puts:    {}", result.put_count);
    println!("  Deletes: {}", result.delete_count);
    println!();
    println!("Documents:");
    println!("  Live:      {}", result.live_documents);
    println!("  Malformed: {}", result.malformed_documents);

    if let Some(collections) = &result.collections {
        println!();
        println!("Collections:");
        for col in collections {
            println!(
                "  {}/{}: {} documents, {} bytes",
                col.tenant, col.collection, col.document_count, col.data_size
            );
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbase_storage::{Keyspace, StorageBackend, WriteMode};

    #[test]
    fn inspect_replays_a_seeded_log() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = LogBackend::open(dir.path()).unwrap();
            let keyspace = Keyspace::new("acme", "users");
            backend
                .put(&keyspace, "u1", br#"{"_id":"u1"}"#, WriteMode::Insert)
                .unwrap();
            backend
                .put(&keyspace, "u2", br#"{"_id":"u2"}"#, WriteMode::Insert)
                .unwrap();
            backend.delete(&keyspace, "u2").unwrap();
            backend.flush().unwrap();
        }

        run(dir.path(), true, "json").unwrap();
    }

    #[test]
    fn inspect_rejects_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), false, "text").is_err());
    }
}
