//! Hotspot analysis for long-operation diagnostics.
//!
//! Aggregates [`LongOperation`]s by tag to show which kinds of work blocked
//! the loop the most. An operation with several tags counts toward each of
//! them; one with no tags counts toward [`UNTAGGED`].
//!
//! # Architecture
//!
//! - **`LongOperationStats`** - incremental aggregation as diagnostics arrive
//! - **`analyze_long_operations()`** - batch analysis of a finished run

// Percentage calculations intentionally convert to f64
#![allow(clippy::cast_precision_loss)]

use crate::diagnostics::LongOperation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Hotspot name for operations nobody tagged
pub const UNTAGGED: &str = "<untagged>";

/// A tag hotspot with aggregated statistics.
///
/// ```text
/// HOTSPOTS
/// ─────────────────────────────────────────────
///   serialize      3 ops   450.00ms   71.4%  max 150.00ms
///   decrypt        1 op    180.00ms   28.6%  max 180.00ms
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagHotspot {
    pub tag: String,
    pub count: usize,
    pub total_ms: f64,
    pub max_ms: f64,
    /// Share of all long-operation time (0.0 - 100.0)
    pub percentage: f64,
    /// Distinct request roots that hit this hotspot
    pub request_roots: usize,
}

#[derive(Debug, Default)]
pub struct LongOperationStats {
    tags: HashMap<String, TagStats>,
    /// Sum of every operation's duration, counted once per operation
    total_ms: f64,
    operations: usize,
}

#[derive(Debug, Default, Clone)]
struct TagStats {
    count: usize,
    total_ms: f64,
    max_ms: f64,
    roots: BTreeSet<u64>,
}

impl LongOperationStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, op: &LongOperation) {
        self.operations += 1;
        self.total_ms += op.duration_ms;

        if op.tags.is_empty() {
            self.bump(UNTAGGED, op);
        } else {
            for tag in &op.tags {
                self.bump(tag, op);
            }
        }
    }

    fn bump(&mut self, tag: &str, op: &LongOperation) {
        let stats = self.tags.entry(tag.to_string()).or_default();
        stats.count += 1;
        stats.total_ms += op.duration_ms;
        stats.max_ms = stats.max_ms.max(op.duration_ms);
        if let Some(root) = op.request_root_id {
            stats.roots.insert(root);
        }
    }

    #[must_use]
    pub fn operations(&self) -> usize {
        self.operations
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    /// Hotspots sorted by total time, largest first; ties by tag name
    #[must_use]
    pub fn to_hotspots(&self) -> Vec<TagHotspot> {
        let mut hotspots: Vec<TagHotspot> = self
            .tags
            .iter()
            .map(|(tag, stats)| TagHotspot {
                tag: tag.clone(),
                count: stats.count,
                total_ms: stats.total_ms,
                max_ms: stats.max_ms,
                percentage: if self.total_ms > 0.0 {
                    (stats.total_ms / self.total_ms) * 100.0
                } else {
                    0.0
                },
                request_roots: stats.roots.len(),
            })
            .collect();

        hotspots.sort_by(|a, b| b.total_ms.total_cmp(&a.total_ms).then_with(|| a.tag.cmp(&b.tag)));
        hotspots
    }
}

/// Batch form of [`LongOperationStats`]
#[must_use]
pub fn analyze_long_operations(ops: &[LongOperation]) -> Vec<TagHotspot> {
    let mut stats = LongOperationStats::new();
    for op in ops {
        stats.record(op);
    }
    stats.to_hotspots()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(root: Option<u64>, duration_ms: f64, tags: &[&str]) -> LongOperation {
        LongOperation {
            offset_ms: 0.0,
            request_root_id: root,
            request_id: None,
            task_id: 1,
            duration_ms,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[test]
    fn test_aggregates_by_tag_sorted_by_total() {
        let hotspots = analyze_long_operations(&[
            op(Some(4), 150.0, &["serialize"]),
            op(Some(8), 150.0, &["serialize"]),
            op(Some(4), 200.0, &["decrypt"]),
        ]);
        assert_eq!(hotspots.len(), 2);
        assert_eq!(hotspots[0].tag, "serialize");
        assert_eq!(hotspots[0].count, 2);
        assert_eq!(hotspots[0].total_ms, 300.0);
        assert_eq!(hotspots[0].request_roots, 2);
        assert!((hotspots[0].percentage - 60.0).abs() < 1e-9);
        assert_eq!(hotspots[1].tag, "decrypt");
        assert_eq!(hotspots[1].max_ms, 200.0);
    }

    #[test]
    fn test_untagged_operations_are_grouped() {
        let hotspots = analyze_long_operations(&[op(None, 120.0, &[]), op(None, 130.0, &[])]);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].tag, UNTAGGED);
        assert_eq!(hotspots[0].count, 2);
        assert_eq!(hotspots[0].request_roots, 0);
    }

    #[test]
    fn test_multi_tag_operation_counts_once_in_total() {
        let mut stats = LongOperationStats::new();
        stats.record(&op(Some(1), 100.0, &["decrypt", "serialize"]));
        assert_eq!(stats.operations(), 1);
        assert_eq!(stats.total_ms(), 100.0);
        let hotspots = stats.to_hotspots();
        assert_eq!(hotspots.len(), 2);
        // Equal totals fall back to name order
        assert_eq!(hotspots[0].tag, "decrypt");
        assert_eq!(hotspots[0].percentage, 100.0);
    }

    #[test]
    fn test_empty_stats_have_no_hotspots() {
        assert!(LongOperationStats::new().to_hotspots().is_empty());
    }
}
