//! CPU time ledger.
//!
//! Tracks pending start timestamps and the accumulated run time of every live
//! task, plus the total attributed to each request root. Totals are purely
//! additive; entries disappear only when their task is evicted.

use crate::domain::{Duration, LifecycleError, TaskId, Timestamp};
use std::collections::HashMap;

/// Add `duration` to the running total stored under `key`, starting from
/// `duration` when there is no entry yet.
pub fn accumulate(map: &mut HashMap<TaskId, Duration>, key: TaskId, duration: Duration) {
    *map.entry(key).or_default() += duration;
}

#[derive(Debug, Default)]
pub struct TimingLedger {
    /// Start of the run currently in progress, per task
    starts: HashMap<TaskId, Timestamp>,
    by_task: HashMap<TaskId, Duration>,
    by_request_root: HashMap<TaskId, Duration>,
}

impl TimingLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember when `task` started running.
    ///
    /// # Errors
    /// `DuplicateStart` if a start is already pending for `task`. The pending
    /// start is kept.
    pub fn record_start(&mut self, task: TaskId, at: Timestamp) -> Result<(), LifecycleError> {
        if self.starts.contains_key(&task) {
            return Err(LifecycleError::DuplicateStart(task));
        }
        self.starts.insert(task, at);
        Ok(())
    }

    /// Close the pending run of `task` and return its duration.
    ///
    /// # Errors
    /// `MissingStart` if no start was recorded for `task`.
    pub fn record_end(&mut self, task: TaskId, at: Timestamp) -> Result<Duration, LifecycleError> {
        let start = self.starts.remove(&task).ok_or(LifecycleError::MissingStart(task))?;
        Ok(at.saturating_since(start))
    }

    /// Credit one run of `task` to the per-task ledger and, when known, to its
    /// owning request root.
    pub fn record_duration(&mut self, task: TaskId, root: Option<TaskId>, duration: Duration) {
        accumulate(&mut self.by_task, task, duration);
        if let Some(root) = root {
            accumulate(&mut self.by_request_root, root, duration);
        }
    }

    #[must_use]
    pub fn is_running(&self, task: TaskId) -> bool {
        self.starts.contains_key(&task)
    }

    /// Accumulated run time of `task`, zero when unknown
    #[must_use]
    pub fn task_total(&self, task: TaskId) -> Duration {
        self.by_task.get(&task).copied().unwrap_or_default()
    }

    /// Accumulated run time attributed to the request rooted at `root`
    #[must_use]
    pub fn request_total(&self, root: TaskId) -> Duration {
        self.by_request_root.get(&root).copied().unwrap_or_default()
    }

    /// Drop everything keyed by `task`: pending start, per-task total and, if
    /// `task` is a request root, its request total.
    pub fn evict(&mut self, task: TaskId) {
        self.starts.remove(&task);
        self.by_task.remove(&task);
        self.by_request_root.remove(&task);
    }

    /// Forget every pending start and accumulated total
    pub fn clear(&mut self) {
        self.starts.clear();
        self.by_task.clear();
        self.by_request_root.clear();
    }

    /// Number of entries across all three maps
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len() + self.by_task.len() + self.by_request_root.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn test_accumulate_initialises_then_adds() {
        let mut map = HashMap::new();
        accumulate(&mut map, TaskId(1), Duration::from_millis(3));
        accumulate(&mut map, TaskId(1), Duration::from_millis(4));
        assert_eq!(map[&TaskId(1)], Duration::from_millis(7));
    }

    #[test]
    fn test_start_end_pair_yields_duration() {
        let mut ledger = TimingLedger::new();
        ledger.record_start(TaskId(2), Timestamp(10 * MS)).unwrap();
        assert!(ledger.is_running(TaskId(2)));
        let d = ledger.record_end(TaskId(2), Timestamp(22 * MS)).unwrap();
        assert_eq!(d, Duration::from_millis(12));
        assert!(!ledger.is_running(TaskId(2)));
    }

    #[test]
    fn test_end_without_start_is_missing_start() {
        let mut ledger = TimingLedger::new();
        assert_eq!(
            ledger.record_end(TaskId(9), Timestamp(0)),
            Err(LifecycleError::MissingStart(TaskId(9)))
        );
    }

    #[test]
    fn test_duplicate_start_keeps_first_timestamp() {
        let mut ledger = TimingLedger::new();
        ledger.record_start(TaskId(1), Timestamp(0)).unwrap();
        assert_eq!(
            ledger.record_start(TaskId(1), Timestamp(5 * MS)),
            Err(LifecycleError::DuplicateStart(TaskId(1)))
        );
        assert_eq!(ledger.record_end(TaskId(1), Timestamp(8 * MS)), Ok(Duration::from_millis(8)));
    }

    #[test]
    fn test_task_and_request_totals_move_together() {
        let mut ledger = TimingLedger::new();
        ledger.record_duration(TaskId(2), Some(TaskId(1)), Duration::from_millis(5));
        ledger.record_duration(TaskId(3), Some(TaskId(1)), Duration::from_millis(7));
        ledger.record_duration(TaskId(2), Some(TaskId(1)), Duration::from_millis(1));
        ledger.record_duration(TaskId(4), None, Duration::from_millis(50));
        assert_eq!(ledger.task_total(TaskId(2)), Duration::from_millis(6));
        assert_eq!(ledger.request_total(TaskId(1)), Duration::from_millis(13));
        assert_eq!(ledger.task_total(TaskId(4)), Duration::from_millis(50));
    }

    #[test]
    fn test_evict_zeroes_entries() {
        let mut ledger = TimingLedger::new();
        ledger.record_start(TaskId(1), Timestamp(0)).unwrap();
        ledger.record_duration(TaskId(1), Some(TaskId(1)), Duration::from_millis(2));
        ledger.evict(TaskId(1));
        assert_eq!(ledger.task_total(TaskId(1)), Duration::ZERO);
        assert_eq!(ledger.request_total(TaskId(1)), Duration::ZERO);
        assert!(!ledger.is_running(TaskId(1)));
        assert!(ledger.is_empty());
    }
}
