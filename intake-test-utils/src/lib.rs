//! Intake Test Utilities
//!
//! Centralized test infrastructure for the intake workspace:
//! - Proptest generators for records and report payloads
//! - Mock report creator for driving the ingestion queue
//! - Test fixtures for stores and queue files
//! - Custom assertions and polling helpers

// Re-export mock storage from its source crate
pub use intake_storage::{FileRecordStore, MockTableStore, StoreConfig, TableStore};

// Re-export core types for convenience
pub use intake_core::{
    IntakeError, IntakeResult, Record, ReportCreator, StorageError, ValidationError,
    CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MOCK REPORT CREATOR
// ============================================================================

/// A call observed by [`MockReportCreator`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateCall {
    pub origin: String,
    pub payload: Value,
}

/// Report creator that records every call and can be told to fail.
///
/// Tracks how many calls are in flight at once so tests can check the
/// queue never processes two items concurrently.
#[derive(Debug, Default)]
pub struct MockReportCreator {
    calls: Mutex<Vec<CreateCall>>,
    failing: AtomicBool,
    panic_next: AtomicBool,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockReportCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creator that fails every call until [`Self::set_failing`] flips it.
    pub fn failing() -> Self {
        let creator = Self::default();
        creator.failing.store(true, Ordering::SeqCst);
        creator
    }

    /// Creator whose first call panics; later calls behave normally.
    pub fn panicking_once() -> Self {
        let creator = Self::default();
        creator.panic_next.store(true, Ordering::SeqCst);
        creator
    }

    /// Creator that sleeps for `delay` inside every call.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All calls so far, in the order they started.
    pub fn calls(&self) -> Vec<CreateCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Origins of all calls so far.
    pub fn origins(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.origin).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Highest number of concurrent calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportCreator for MockReportCreator {
    async fn create_report(&self, payload: Value, origin: &str) -> IntakeResult<Record> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            self.calls
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(CreateCall {
                    origin: origin.to_string(),
                    payload,
                });
            panic!("mock creator panicked on {origin}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(CreateCall {
                origin: origin.to_string(),
                payload: payload.clone(),
            });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ValidationError::InvalidValue {
                field: "payload".to_string(),
                reason: "mock creator configured to fail".to_string(),
            }
            .into());
        }

        let mut record = payload.as_object().cloned().unwrap_or_default();
        record.insert(ID_FIELD.to_string(), Value::String(origin.to_string()));
        Ok(record)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating records and report payloads.

    use super::*;
    use proptest::prelude::*;

    /// Generate a scalar JSON value (no floats, so equality is exact).
    pub fn arb_json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 _.-]{0,16}".prop_map(Value::String),
        ]
    }

    /// Generate a nested JSON value up to three levels deep.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        arb_json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Generate a record id.
    pub fn arb_record_id() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,12}"
    }

    /// Generate a record with a string `id` and no store-managed timestamps.
    pub fn arb_record() -> impl Strategy<Value = Record> {
        (
            arb_record_id(),
            prop::collection::btree_map("[a-z][a-zA-Z0-9]{0,10}", arb_json_value(), 0..6),
        )
            .prop_map(|(id, fields)| {
                let mut record: Record = fields
                    .into_iter()
                    .filter(|(k, _)| {
                        k != ID_FIELD && k != CREATED_AT_FIELD && k != UPDATED_AT_FIELD
                    })
                    .collect();
                record.insert(ID_FIELD.to_string(), Value::String(id));
                record
            })
    }

    /// Generate a report submission that passes domain validation.
    pub fn arb_report_payload() -> impl Strategy<Value = Value> {
        (
            "[A-Z][a-z]{2,12}",
            "[a-z]{3}[a-z ]{0,37}",
            prop::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
            prop::option::of("[A-Z][a-z]{2,10}"),
        )
            .prop_map(|(school, description, email, city)| {
                let mut payload = json!({
                    "schoolName": format!("{school} Driving School"),
                    "description": description,
                });
                if let Some(email) = email {
                    payload["reporterEmail"] = json!(email);
                }
                if let Some(city) = city {
                    payload["location"] = json!(city);
                }
                payload
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use tempfile::TempDir;

    /// A valid report submission for `school`.
    pub fn report_payload(school: &str) -> Value {
        json!({
            "schoolName": school,
            "description": "Offers lessons without a licence plate on the car",
            "location": "Springfield",
            "reporterEmail": "citizen@example.com",
        })
    }

    /// A submission missing the required `schoolName`.
    pub fn invalid_report_payload() -> Value {
        json!({
            "description": "No school name given",
        })
    }

    /// Convert a JSON object literal into a [`Record`].
    pub fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    /// A file store rooted in a fresh temporary directory with fast retries.
    pub fn temp_file_store() -> (FileRecordStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = FileRecordStore::new(StoreConfig {
            data_dir: temp_dir.path().join("data"),
            write_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        });
        (store, temp_dir)
    }

    /// Drop a payload into `dir` the way a well-behaved producer does:
    /// write a staging file, then rename it to `name`.
    pub fn write_queue_file(dir: &Path, name: &str, payload: &Value) -> PathBuf {
        let staging = dir.join(format!(".{name}.tmp"));
        let target = dir.join(name);
        let body = serde_json::to_vec_pretty(payload).expect("payload serializes");
        std::fs::write(&staging, body).expect("write staging file");
        std::fs::rename(&staging, &target).expect("rename into queue");
        target
    }

    /// Drop raw bytes into `dir` atomically.
    pub fn write_raw_queue_file(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let staging = dir.join(format!(".{name}.tmp"));
        let target = dir.join(name);
        std::fs::write(&staging, body).expect("write staging file");
        std::fs::rename(&staging, &target).expect("rename into queue");
        target
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion and polling helpers for intake tests.

    use super::*;

    /// Poll `condition` every 10ms until it holds or `timeout` elapses.
    pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Sorted names of `*.json` files directly inside `dir`.
    pub fn json_files_in(dir: &Path) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        names.sort();
        names
    }

    /// Assert that a result is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &IntakeResult<T>) {
        match result {
            Err(IntakeError::Storage(StorageError::NotFound { .. })) => {}
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    /// Assert that a result is a validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &IntakeResult<T>) {
        match result {
            Err(IntakeError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a stored record carries a `createdAt` stamp and otherwise
    /// equals `expected`.
    #[track_caller]
    pub fn assert_stored_as(stored: &Record, expected: &Record) {
        assert!(
            stored.get(CREATED_AT_FIELD).is_some_and(Value::is_string),
            "record is missing createdAt: {:?}",
            stored
        );
        let mut without_stamp = stored.clone();
        if !expected.contains_key(CREATED_AT_FIELD) {
            without_stamp.remove(CREATED_AT_FIELD);
        }
        assert_eq!(&without_stamp, expected);
    }
}

// ============================================================================
// TESTS
// ============================================================================
