//! Report export
//!
//! Writes per-request CPU attribution, long-operation diagnostics and tag
//! hotspots as one JSON document.

pub mod report;

pub use report::{ReportExporter, RunSummary};
