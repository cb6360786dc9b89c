//! The import pipeline
//!
//! One CSV export becomes durable library records through four stages:
//! row planning (pure classification), identity resolution (ordered
//! lookup chain against the catalog), metadata hydration (best-effort
//! detail fetch with fallback seeding), and the worker that drives all
//! three per row while keeping the job record's counters current.

pub mod hydrator;
pub mod identity_resolver;
pub mod row_planner;
pub mod worker;

pub use hydrator::{HydrationOutcome, MetadataHydrator};
pub use identity_resolver::{resolve, LookupOutcome, LookupReason, LookupStrategy, Resolution};
pub use row_planner::{plan, normalize_isbn, RawRow, RowPlan, TargetBucket};
pub use worker::ImportWorker;
