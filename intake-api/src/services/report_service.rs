//! Report Service
//!
//! Validation and status transitions for compliance reports stored in the
//! `reports` table. The ingestion queue reaches this service through the
//! [`ReportCreator`] trait; administrators use the remaining operations.

use async_trait::async_trait;
use intake_core::{
    timestamp_now, IntakeResult, Record, ReportCreator, ReportStatus, StorageError,
    ValidationError, ID_FIELD, REPORTS_TABLE,
};
use intake_storage::TableStore;
use serde_json::{json, Value};
use uuid::Uuid;

const SCHOOL_NAME_FIELD: &str = "schoolName";
const DESCRIPTION_FIELD: &str = "description";
const REPORTER_EMAIL_FIELD: &str = "reporterEmail";
const STATUS_FIELD: &str = "status";
const ORIGIN_FIELD: &str = "origin";
const NOTES_FIELD: &str = "notes";
const RESOLUTION_FIELD: &str = "resolution";
const CLOSED_AT_FIELD: &str = "closedAt";

/// Report operations over any [`TableStore`].
#[derive(Debug, Clone)]
pub struct ReportService<S> {
    store: S,
}

impl<S: TableStore> ReportService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch one report.
    ///
    /// # Errors
    /// `StorageError::NotFound` if no report has this id.
    pub async fn get_report(&self, id: &str) -> IntakeResult<Record> {
        self.store
            .find_by_id(REPORTS_TABLE, id)
            .await?
            .ok_or_else(|| not_found(id).into())
    }

    /// All reports in submission order.
    pub async fn list_reports(&self) -> IntakeResult<Vec<Record>> {
        Ok(self.store.get_all(REPORTS_TABLE).await?)
    }

    /// Reports currently in `status`.
    pub async fn list_by_status(&self, status: ReportStatus) -> IntakeResult<Vec<Record>> {
        let wanted = status.as_str();
        Ok(self
            .store
            .filter(REPORTS_TABLE, &|r: &Record| {
                r.get(STATUS_FIELD).and_then(Value::as_str) == Some(wanted)
            })
            .await?)
    }

    /// Open -> InReview transition.
    pub async fn start_review(&self, id: &str) -> IntakeResult<Record> {
        let report = self.get_report(id).await?;
        let current = status_of(&report);
        if current != Some(ReportStatus::Open) {
            return Err(invalid_transition(id, current, ReportStatus::InReview).into());
        }

        let patch = object(json!({ STATUS_FIELD: ReportStatus::InReview.as_str() }));
        let updated = self.store.update(REPORTS_TABLE, id, patch).await?;
        tracing::info!(report_id = id, "Report moved to review");
        Ok(updated)
    }

    /// Append an administrator note.
    pub async fn add_note(&self, id: &str, author: &str, text: &str) -> IntakeResult<Record> {
        require_text("author", author)?;
        require_text("text", text)?;

        let report = self.get_report(id).await?;
        let mut notes = report
            .get(NOTES_FIELD)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        notes.push(json!({
            "author": author,
            "text": text,
            "createdAt": timestamp_now(),
        }));

        let patch = object(json!({ NOTES_FIELD: notes }));
        let updated = self.store.update(REPORTS_TABLE, id, patch).await?;
        tracing::debug!(report_id = id, author, "Note added to report");
        Ok(updated)
    }

    /// Close a report with a resolution. Open and in-review reports can be
    /// closed; closing twice is rejected.
    pub async fn close_report(&self, id: &str, resolution: &str) -> IntakeResult<Record> {
        require_text(RESOLUTION_FIELD, resolution)?;

        let report = self.get_report(id).await?;
        let current = status_of(&report);
        if !matches!(current, Some(ReportStatus::Open | ReportStatus::InReview)) {
            return Err(invalid_transition(id, current, ReportStatus::Closed).into());
        }

        let patch = object(json!({
            STATUS_FIELD: ReportStatus::Closed.as_str(),
            RESOLUTION_FIELD: resolution,
            CLOSED_AT_FIELD: timestamp_now(),
        }));
        let updated = self.store.update(REPORTS_TABLE, id, patch).await?;
        tracing::info!(report_id = id, "Report closed");
        Ok(updated)
    }
}

#[async_trait]
impl<S: TableStore> ReportCreator for ReportService<S> {
    async fn create_report(&self, payload: Value, origin: &str) -> IntakeResult<Record> {
        let Value::Object(mut report) = payload else {
            return Err(ValidationError::InvalidValue {
                field: "payload".to_string(),
                reason: "must be a JSON object".to_string(),
            }
            .into());
        };

        required_string(&report, SCHOOL_NAME_FIELD)?;
        required_string(&report, DESCRIPTION_FIELD)?;
        if let Some(email) = report.get(REPORTER_EMAIL_FIELD) {
            validate_email(email)?;
        }

        report.insert(ID_FIELD.to_string(), Value::String(Uuid::now_v7().to_string()));
        report.insert(
            STATUS_FIELD.to_string(),
            Value::String(ReportStatus::Open.as_str().to_string()),
        );
        report.insert(ORIGIN_FIELD.to_string(), Value::String(origin.to_string()));
        report.insert(NOTES_FIELD.to_string(), Value::Array(Vec::new()));

        let stored = self.store.append(REPORTS_TABLE, report).await?;
        tracing::debug!(origin, "Report created");
        Ok(stored)
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn required_string(report: &Record, field: &str) -> Result<(), ValidationError> {
    match report.get(field) {
        None | Some(Value::Null) => Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must be a string".to_string(),
        }),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_email(value: &Value) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidValue {
        field: REPORTER_EMAIL_FIELD.to_string(),
        reason: reason.to_string(),
    };
    let email = value.as_str().ok_or_else(|| invalid("must be a string"))?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(invalid("must look like name@domain")),
    }
}

fn status_of(report: &Record) -> Option<ReportStatus> {
    report
        .get(STATUS_FIELD)
        .and_then(Value::as_str)
        .and_then(ReportStatus::parse)
}

fn invalid_transition(id: &str, from: Option<ReportStatus>, to: ReportStatus) -> ValidationError {
    ValidationError::InvalidTransition {
        id: id.to_string(),
        from: from.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
        to: to.to_string(),
    }
}

fn not_found(id: &str) -> StorageError {
    StorageError::NotFound {
        table: REPORTS_TABLE.to_string(),
        id: id.to_string(),
    }
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
