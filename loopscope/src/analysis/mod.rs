//! Analysis of collected diagnostics
//!
//! Pure aggregation logic, separated from printing and export.

pub mod long_operations;

pub use long_operations::{analyze_long_operations, LongOperationStats, TagHotspot, UNTAGGED};
