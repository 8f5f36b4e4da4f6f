//! Causality graph store.
//!
//! Maps every live task to the task that scheduled it and to its kind. The
//! graph is a forest: a parent must already exist when its child is created,
//! so cycles cannot form from a well-behaved host.
//!
//! # Owning request lookup
//!
//! ```text
//! request-root (R1)
//!     ├── timer (T2)
//!     │     └── microtask (T4)   ← find_owning_request_root(T4) == R1
//!     └── write-completion (T3)
//! ```
//!
//! The upward walk tolerates nodes that were already evicted: destruction
//! order across a forest is up to the host, so a missing link simply means
//! "no owning request".

use crate::domain::{TaskId, TaskKind};
use log::warn;
use std::collections::HashMap;

/// One causality edge plus the task's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRecord {
    pub kind: TaskKind,
    /// Task that was executing when this one was scheduled; `None` for roots
    pub parent: Option<TaskId>,
}

#[derive(Debug)]
pub struct CausalityGraph {
    records: HashMap<TaskId, TaskRecord>,
    /// Kind that marks the start of a logical request
    root_kind: TaskKind,
}

impl Default for CausalityGraph {
    fn default() -> Self {
        Self::new(TaskKind::RequestRoot)
    }
}

impl CausalityGraph {
    #[must_use]
    pub fn new(root_kind: TaskKind) -> Self {
        Self {
            records: HashMap::new(),
            root_kind,
        }
    }

    #[must_use]
    pub fn root_kind(&self) -> TaskKind {
        self.root_kind
    }

    /// Record the edge `parent -> task`. A later record for the same id
    /// replaces the earlier one.
    pub fn record(&mut self, task: TaskId, kind: TaskKind, parent: Option<TaskId>) {
        // Top-level code is not a task; treat it as "no parent".
        let parent = parent.filter(|p| !p.is_top_level());
        self.records.insert(task, TaskRecord { kind, parent });
    }

    #[must_use]
    pub fn lookup(&self, task: TaskId) -> Option<&TaskRecord> {
        self.records.get(&task)
    }

    pub fn evict(&mut self, task: TaskId) -> Option<TaskRecord> {
        self.records.remove(&task)
    }

    /// Walk parent links from `task` (inclusive) to the nearest ancestor whose
    /// kind is the request-root kind.
    ///
    /// Returns `None` when the walk reaches a task with no parent, or a task
    /// that is not (or no longer) recorded.
    #[must_use]
    pub fn find_owning_request_root(&self, task: TaskId) -> Option<TaskId> {
        let mut current = task;
        // A forest never needs more steps than it has nodes. Exceeding that
        // means the host reused an id and closed a loop.
        for _ in 0..=self.records.len() {
            let record = self.records.get(&current)?;
            if record.kind == self.root_kind {
                return Some(current);
            }
            current = record.parent?;
        }
        warn!("Causality walk from {task} exceeded graph size; parent links form a cycle");
        None
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> CausalityGraph {
        let mut graph = CausalityGraph::default();
        graph.record(TaskId(1), TaskKind::RequestRoot, None);
        graph.record(TaskId(2), TaskKind::Timer, Some(TaskId(1)));
        graph.record(TaskId(3), TaskKind::Microtask, Some(TaskId(2)));
        graph
    }

    #[test]
    fn test_walk_finds_request_root_ancestor() {
        let graph = chain();
        assert_eq!(graph.find_owning_request_root(TaskId(3)), Some(TaskId(1)));
        assert_eq!(graph.find_owning_request_root(TaskId(2)), Some(TaskId(1)));
    }

    #[test]
    fn test_root_owns_itself() {
        let graph = chain();
        assert_eq!(graph.find_owning_request_root(TaskId(1)), Some(TaskId(1)));
    }

    #[test]
    fn test_walk_picks_nearest_root() {
        let mut graph = chain();
        graph.record(TaskId(4), TaskKind::RequestRoot, Some(TaskId(3)));
        graph.record(TaskId(5), TaskKind::Timer, Some(TaskId(4)));
        assert_eq!(graph.find_owning_request_root(TaskId(5)), Some(TaskId(4)));
    }

    #[test]
    fn test_walk_without_root_is_none() {
        let mut graph = CausalityGraph::default();
        graph.record(TaskId(1), TaskKind::Immediate, None);
        graph.record(TaskId(2), TaskKind::Timer, Some(TaskId(1)));
        assert_eq!(graph.find_owning_request_root(TaskId(2)), None);
    }

    #[test]
    fn test_walk_through_evicted_link_is_none() {
        let mut graph = chain();
        graph.evict(TaskId(2));
        assert_eq!(graph.find_owning_request_root(TaskId(3)), None);
        assert!(graph.lookup(TaskId(2)).is_none());
    }

    #[test]
    fn test_unknown_task_is_none() {
        assert_eq!(chain().find_owning_request_root(TaskId(99)), None);
    }

    #[test]
    fn test_unknown_kind_never_matches_root() {
        let mut graph = CausalityGraph::default();
        graph.record(TaskId(1), TaskKind::Unknown(77), None);
        graph.record(TaskId(2), TaskKind::Unknown(0), Some(TaskId(1)));
        assert_eq!(graph.find_owning_request_root(TaskId(2)), None);
    }

    #[test]
    fn test_top_level_parent_is_dropped() {
        let mut graph = CausalityGraph::default();
        graph.record(TaskId(1), TaskKind::Timer, Some(TaskId::TOP_LEVEL));
        assert_eq!(graph.lookup(TaskId(1)).unwrap().parent, None);
    }

    #[test]
    fn test_cycle_from_reused_ids_terminates() {
        let mut graph = CausalityGraph::default();
        graph.record(TaskId(1), TaskKind::Timer, Some(TaskId(2)));
        graph.record(TaskId(2), TaskKind::Timer, Some(TaskId(1)));
        assert_eq!(graph.find_owning_request_root(TaskId(1)), None);
    }

    #[test]
    fn test_custom_root_kind() {
        let mut graph = CausalityGraph::new(TaskKind::QueueTask);
        graph.record(TaskId(1), TaskKind::RequestRoot, None);
        graph.record(TaskId(2), TaskKind::QueueTask, Some(TaskId(1)));
        graph.record(TaskId(3), TaskKind::Timer, Some(TaskId(2)));
        assert_eq!(graph.find_owning_request_root(TaskId(3)), Some(TaskId(2)));
        assert_eq!(graph.find_owning_request_root(TaskId(1)), None);
    }
}
