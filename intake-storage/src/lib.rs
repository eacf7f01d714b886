//! Intake Storage - Table Store Trait and Implementations
//!
//! Table-like CRUD over named collections of schema-agnostic records.
//! [`FileRecordStore`] persists each table as a JSON file with atomic,
//! crash-safe replacement; [`MockTableStore`] keeps tables in memory for tests.

pub mod atomic;
pub mod file_store;

pub use atomic::{is_transient, write_atomic, RetryPolicy, WriteFailure};
pub use file_store::{
    FileRecordStore, StoreConfig, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_WRITE_ATTEMPTS,
};

use async_trait::async_trait;
use intake_core::{has_id, merge_patch, stamp_created, Record, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Predicate used by [`TableStore::filter`].
pub type RecordPredicate<'a> = &'a (dyn Fn(&Record) -> bool + Send + Sync);

// ============================================================================
// TABLE STORE TRAIT
// ============================================================================

/// Table store for intake records.
///
/// Tables are created lazily on first write. Read paths never fail because a
/// table is missing or corrupted; they return an empty table instead.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// All records of a table in insertion order.
    async fn get_all(&self, table: &str) -> StorageResult<Vec<Record>>;

    /// Append a record, stamping `createdAt` if absent. Returns the stored record.
    async fn append(&self, table: &str, record: Record) -> StorageResult<Record>;

    /// Shallow-merge `patch` onto the record with `id` and stamp `updatedAt`.
    async fn update(&self, table: &str, id: &str, patch: Record) -> StorageResult<Record>;

    /// Remove the record with `id`. Returns whether a record was removed.
    async fn delete(&self, table: &str, id: &str) -> StorageResult<bool>;

    /// Create an empty table if none exists.
    async fn ensure_table_exists(&self, table: &str) -> StorageResult<()>;

    /// First record whose `id` equals `id`.
    async fn find_by_id(&self, table: &str, id: &str) -> StorageResult<Option<Record>> {
        Ok(self
            .get_all(table)
            .await?
            .into_iter()
            .find(|r| has_id(r, id)))
    }

    /// Records matching `predicate`, in insertion order.
    async fn filter(
        &self,
        table: &str,
        predicate: RecordPredicate<'_>,
    ) -> StorageResult<Vec<Record>> {
        Ok(self
            .get_all(table)
            .await?
            .into_iter()
            .filter(|r| predicate(r))
            .collect())
    }
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    async fn get_all(&self, table: &str) -> StorageResult<Vec<Record>> {
        (**self).get_all(table).await
    }

    async fn append(&self, table: &str, record: Record) -> StorageResult<Record> {
        (**self).append(table, record).await
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> StorageResult<Record> {
        (**self).update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &str) -> StorageResult<bool> {
        (**self).delete(table, id).await
    }

    async fn ensure_table_exists(&self, table: &str) -> StorageResult<()> {
        (**self).ensure_table_exists(table).await
    }
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// In-memory table store for testing.
#[derive(Debug, Default)]
pub struct MockTableStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl MockTableStore {
    /// Create a new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored tables.
    pub fn clear(&self) {
        self.tables.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    /// Number of records in a table.
    pub fn record_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(table)
            .map_or(0, Vec::len)
    }

    /// Whether the table has been created.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(table)
    }
}

#[async_trait]
impl TableStore for MockTableStore {
    async fn get_all(&self, table: &str) -> StorageResult<Vec<Record>> {
        let tables = self.tables.read().unwrap_or_else(|p| p.into_inner());
        Ok(tables.get(table).cloned().unwrap_or_default())
    }

    async fn append(&self, table: &str, mut record: Record) -> StorageResult<Record> {
        stamp_created(&mut record);
        let mut tables = self.tables.write().unwrap_or_else(|p| p.into_inner());
        tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> StorageResult<Record> {
        let mut tables = self.tables.write().unwrap_or_else(|p| p.into_inner());
        let existing = tables
            .get_mut(table)
            .and_then(|records| records.iter_mut().find(|r| has_id(r, id)))
            .ok_or_else(|| StorageError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        merge_patch(existing, patch);
        Ok(existing.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> StorageResult<bool> {
        let mut tables = self.tables.write().unwrap_or_else(|p| p.into_inner());
        let Some(records) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| !has_id(r, id));
        Ok(records.len() != before)
    }

    async fn ensure_table_exists(&self, table: &str) -> StorageResult<()> {
        self.tables
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry(table.to_string())
            .or_default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_mock_store_crud() {
        let store = MockTableStore::new();
        assert!(!store.has_table("t"));

        store
            .append("t", record(json!({"id": "1", "name": "A"})))
            .await
            .expect("append");
        assert_eq!(store.record_count("t"), 1);

        let merged = store
            .update("t", "1", record(json!({"name": "B"})))
            .await
            .expect("update");
        assert_eq!(merged["name"], json!("B"));

        let err = store
            .update("t", "2", record(json!({})))
            .await
            .expect_err("missing id");
        assert!(err.is_not_found());

        assert!(store.delete("t", "1").await.expect("delete"));
        assert!(!store.delete("t", "1").await.expect("delete again"));
        assert_eq!(store.record_count("t"), 0);
    }

    #[tokio::test]
    async fn test_arc_store_delegates() {
        let store: Arc<dyn TableStore> = Arc::new(MockTableStore::new());
        store.ensure_table_exists("t").await.expect("ensure");
        store
            .append("t", record(json!({"id": "9"})))
            .await
            .expect("append");
        let found = store.find_by_id("t", "9").await.expect("find");
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_mock_clear() {
        let store = MockTableStore::new();
        store.ensure_table_exists("t").await.expect("ensure");
        store.clear();
        assert!(!store.has_table("t"));
    }
}
