//! Property-Based Tests for the Report Service
//!
//! **Property 1: Accepted submissions keep their fields**
//!
//! For any valid payload `p`, `create_report(p, origin)` stores a report with
//! every field of `p`, status `open`, the given origin and a fresh id.
//!
//! **Property 2: Rejected submissions store nothing**
//!
//! Removing a required field from a valid payload makes `create_report` fail
//! with a validation error and leaves the table empty.

use intake_api::ReportService;
use intake_core::{record_id, ReportCreator, ReportStatus, REPORTS_TABLE};
use intake_test_utils::{assertions, generators, MockTableStore, TableStore};
use proptest::prelude::*;
use serde_json::Value;
use tokio::runtime::Runtime;

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_valid_payload_is_stored_open(
        payload in generators::arb_report_payload(),
        origin in "[0-9]{4}-[a-z]{4}\\.json",
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let service = ReportService::new(MockTableStore::new());
            let report = service
                .create_report(payload.clone(), &origin)
                .await
                .map_err(|e| TestCaseError::fail(format!("create_report failed: {}", e)))?;

            if let Value::Object(fields) = &payload {
                for (key, value) in fields {
                    prop_assert_eq!(report.get(key), Some(value));
                }
            }
            prop_assert_eq!(report["status"].as_str(), Some(ReportStatus::Open.as_str()));
            prop_assert_eq!(report["origin"].as_str(), Some(origin.as_str()));
            prop_assert!(record_id(&report).is_some());

            let stored = service
                .store()
                .get_all(REPORTS_TABLE)
                .await
                .map_err(|e| TestCaseError::fail(format!("get_all failed: {}", e)))?;
            prop_assert_eq!(stored.len(), 1);
            prop_assert_eq!(&stored[0], &report);
            Ok(())
        })?;
    }

    #[test]
    fn prop_missing_required_field_is_rejected(
        payload in generators::arb_report_payload(),
        drop_school in any::<bool>(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let service = ReportService::new(MockTableStore::new());
            let mut payload = payload;
            let field = if drop_school { "schoolName" } else { "description" };
            if let Value::Object(fields) = &mut payload {
                fields.remove(field);
            }

            let result = service.create_report(payload, "0001-x.json").await;
            assertions::assert_validation_error(&result);
            prop_assert_eq!(service.store().record_count(REPORTS_TABLE), 0);
            Ok(())
        })?;
    }
}
