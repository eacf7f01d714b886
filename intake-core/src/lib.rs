//! Intake Core - Records, Errors and Collaborator Traits
//!
//! Shared vocabulary for the compliance intake portal. Every other crate in
//! the workspace depends on this one; it holds no I/O.

pub mod error;
pub mod record;
pub mod report;

pub use error::{
    ConfigError, IntakeError, IntakeResult, QueueError, QueueResult, StorageError, StorageResult,
    ValidationError,
};
pub use record::{
    has_id, is_valid_table_name, merge_patch, record_id, stamp_created, timestamp_now, Record,
    CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD,
};
pub use report::{ReportCreator, ReportStatus, REPORTS_TABLE};
