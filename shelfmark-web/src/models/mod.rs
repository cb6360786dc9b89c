//! Data models for shelfmark-web

pub mod import_job;
pub mod import_options;
pub mod library;

pub use import_job::{ImportIssue, ImportJob, ImportStatus, IssueSeverity};
pub use import_options::{ImportOptions, RatingAction};
pub use library::{Judgment, ReadingEntry, ToReadEntry};
