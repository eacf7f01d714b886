//! Property-Based Tests for the File Record Store
//!
//! **Property 1: Round-trip**
//!
//! For any record `r`, `append(t, r)` followed by `get_all(t)` yields a table
//! containing `r` plus an injected `createdAt`.
//!
//! **Property 2: Idempotent absence**
//!
//! Deleting or updating an id that is not in the table leaves the table file
//! byte-for-byte unchanged.

use intake_storage::{FileRecordStore, TableStore};
use intake_test_utils::{assertions, fixtures, generators, Record, CREATED_AT_FIELD};
use proptest::prelude::*;
use serde_json::json;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn table_bytes(store: &FileRecordStore, table: &str) -> Option<Vec<u8>> {
    let path = store.table_path(table).ok()?;
    std::fs::read(path).ok()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_append_then_get_all_round_trips(records in prop::collection::vec(generators::arb_record(), 1..6)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, _dir) = fixtures::temp_file_store();

            for record in &records {
                store
                    .append("t", record.clone())
                    .await
                    .map_err(|e| TestCaseError::fail(format!("append failed: {}", e)))?;
            }

            let stored = store
                .get_all("t")
                .await
                .map_err(|e| TestCaseError::fail(format!("get_all failed: {}", e)))?;
            prop_assert_eq!(stored.len(), records.len());
            for (stored, expected) in stored.iter().zip(records.iter()) {
                assertions::assert_stored_as(stored, expected);
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_missing_id_leaves_table_unchanged(
        records in prop::collection::vec(generators::arb_record(), 0..5),
        missing in "[A-Z]{4,8}",
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, _dir) = fixtures::temp_file_store();
            for record in &records {
                store
                    .append("t", record.clone())
                    .await
                    .map_err(|e| TestCaseError::fail(format!("append failed: {}", e)))?;
            }
            let before = table_bytes(&store, "t");

            // Generated ids are lowercase, so an uppercase id is never present.
            let removed = store
                .delete("t", &missing)
                .await
                .map_err(|e| TestCaseError::fail(format!("delete failed: {}", e)))?;
            prop_assert!(!removed);

            let patch: Record = fixtures::record(json!({"name": "changed"}));
            let update = store.update("t", &missing, patch).await;
            prop_assert!(matches!(update, Err(ref e) if e.is_not_found()));

            prop_assert_eq!(table_bytes(&store, "t"), before);
            Ok(())
        })?;
    }

    #[test]
    fn prop_created_at_is_preserved_when_supplied(record in generators::arb_record()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (store, _dir) = fixtures::temp_file_store();
            let mut supplied = record.clone();
            supplied.insert(CREATED_AT_FIELD.to_string(), json!("2021-06-01T12:00:00.000Z"));

            let stored = store
                .append("t", supplied.clone())
                .await
                .map_err(|e| TestCaseError::fail(format!("append failed: {}", e)))?;
            prop_assert_eq!(stored, supplied);
            Ok(())
        })?;
    }
}
