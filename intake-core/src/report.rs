//! Report collaborator traits and status vocabulary.
//!
//! The ingestion queue only knows how to hand a payload to something that can
//! turn it into a stored report. Implementations live in intake-api.

use async_trait::async_trait;
use serde_json::Value;

use crate::{IntakeResult, Record};

/// Table holding submitted reports.
pub const REPORTS_TABLE: &str = "reports";

/// Lifecycle status of a compliance report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    /// Submitted, not yet looked at.
    Open,
    /// An administrator is reviewing it.
    InReview,
    /// Resolved and closed.
    Closed,
}

impl ReportStatus {
    /// Stored string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InReview => "in_review",
            Self::Closed => "closed",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "in_review" => Some(Self::InReview),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a raw submission and persists it as a report.
///
/// `origin` identifies where the payload came from (the queue passes the
/// payload's file name). Any error is treated by callers as a processing
/// failure.
#[async_trait]
pub trait ReportCreator: Send + Sync {
    async fn create_report(&self, payload: Value, origin: &str) -> IntakeResult<Record>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [ReportStatus::Open, ReportStatus::InReview, ReportStatus::Closed] {
            assert_eq!(ReportStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReportStatus::parse("archived"), None);
        assert_eq!(ReportStatus::InReview.to_string(), "in_review");
    }
}
