//! JSON-file backed record store.
//!
//! Each table is one pretty-printed JSON array at `<data_dir>/<table>.json`.
//! Writes go through [`crate::atomic::write_atomic`], staging at
//! `<data_dir>/<table>.json.tmp`.
//!
//! # Concurrency
//!
//! Every mutation is a read-modify-write of the whole table with no
//! cross-process locking: two writers racing on the same table both read the
//! same state and the later rename wins. Deploy a single writing process per
//! data directory. Inside one process, writes to the same table take a
//! per-table async mutex for the staging/rename step only, so concurrent
//! writers never interleave bytes in the shared staging file.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use intake_core::{
    has_id, is_valid_table_name, merge_patch, stamp_created, Record, StorageError, StorageResult,
};
use tokio::fs;

use crate::atomic::{write_atomic, RetryPolicy, WriteFailure};
use crate::TableStore;

/// Default number of write attempts before a write error is surfaced.
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 3;

/// Default backoff step between write attempts.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Configuration for [`FileRecordStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the table files. Created on first write.
    pub data_dir: PathBuf,

    /// Total write attempts for transient errors (default: 3)
    pub write_attempts: u32,

    /// Linear backoff step between attempts (default: 100ms)
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl StoreConfig {
    /// Default settings rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.write_attempts,
            backoff: self.retry_backoff,
        }
    }
}

/// Table store persisting each table as an atomically replaced JSON file.
#[derive(Debug)]
pub struct FileRecordStore {
    config: StoreConfig,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileRecordStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Store rooted at `data_dir` with default retry settings.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Canonical path of a table file.
    pub fn table_path(&self, table: &str) -> StorageResult<PathBuf> {
        check_table_name(table)?;
        Ok(self.config.data_dir.join(format!("{table}.json")))
    }

    fn staging_path(&self, table: &str) -> PathBuf {
        self.config.data_dir.join(format!("{table}.json.tmp"))
    }

    fn write_lock(&self, table: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(table.to_string()).or_default())
    }

    async fn read_table(&self, table: &str) -> StorageResult<Vec<Record>> {
        let path = self.table_path(table)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    table: table.to_string(),
                    path,
                    source,
                })
            }
        };

        match serde_json::from_slice::<Vec<Record>>(&bytes) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(
                    table,
                    path = %path.display(),
                    error = %e,
                    "Malformed table file, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn write_table(&self, table: &str, records: &[Record]) -> StorageResult<()> {
        let path = self.table_path(table)?;
        let body = serde_json::to_vec_pretty(records).map_err(|source| {
            StorageError::Serialization {
                table: table.to_string(),
                source,
            }
        })?;

        let lock = self.write_lock(table);
        let _guard = lock.lock().await;

        fs::create_dir_all(&self.config.data_dir)
            .await
            .map_err(|source| StorageError::Io {
                table: table.to_string(),
                path: self.config.data_dir.clone(),
                source,
            })?;

        write_atomic(
            &self.staging_path(table),
            &path,
            &body,
            self.config.retry_policy(),
        )
        .await
        .map_err(|failure| write_failed(table, failure))?;

        tracing::trace!(table, records = records.len(), "Table written");
        Ok(())
    }
}

fn write_failed(table: &str, failure: WriteFailure) -> StorageError {
    tracing::error!(
        table,
        attempts = failure.attempts,
        error = %failure.source,
        "Table write failed"
    );
    StorageError::WriteFailed {
        table: table.to_string(),
        attempts: failure.attempts,
        source: failure.source,
    }
}

fn check_table_name(table: &str) -> StorageResult<()> {
    if is_valid_table_name(table) {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName {
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl TableStore for FileRecordStore {
    async fn get_all(&self, table: &str) -> StorageResult<Vec<Record>> {
        self.read_table(table).await
    }

    async fn append(&self, table: &str, mut record: Record) -> StorageResult<Record> {
        let mut records = self.read_table(table).await?;
        stamp_created(&mut record);
        records.push(record.clone());
        self.write_table(table, &records).await?;
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> StorageResult<Record> {
        let mut records = self.read_table(table).await?;
        let Some(existing) = records.iter_mut().find(|r| has_id(r, id)) else {
            return Err(StorageError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        };
        merge_patch(existing, patch);
        let merged = existing.clone();
        self.write_table(table, &records).await?;
        Ok(merged)
    }

    async fn delete(&self, table: &str, id: &str) -> StorageResult<bool> {
        let mut records = self.read_table(table).await?;
        let before = records.len();
        records.retain(|r| !has_id(r, id));
        if records.len() == before {
            return Ok(false);
        }
        self.write_table(table, &records).await?;
        Ok(true)
    }

    async fn ensure_table_exists(&self, table: &str) -> StorageResult<()> {
        let path = self.table_path(table)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(table, "Creating empty table file");
                self.write_table(table, &[]).await
            }
            Err(source) => Err(StorageError::Io {
                table: table.to_string(),
                path,
                source,
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
