//! Service Layer
//!
//! Business logic over the record store. Services validate input and own
//! status transitions; storage stays schema-agnostic.

mod report_service;

pub use report_service::*;
