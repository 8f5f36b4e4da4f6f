//! # Scheduler Hook
//!
//! The state machine behind every lifecycle event. Owns the causality graph,
//! the timing ledger and the context table, and keeps them consistent.
//!
//! ## Per-task states
//!
//! ```text
//!   created ──► running ──► (idle) ──► running ... ──► destroyed
//!      │                                                  ▲
//!      └──────────────── cancelled (never ran) ───────────┘
//! ```
//!
//! ## Event handling
//!
//! | Event            | Work                                                       |
//! |------------------|------------------------------------------------------------|
//! | created          | record causality edge, inherit parent's context            |
//! | about-to-run     | record start timestamp                                     |
//! | finished-running | duration → task ledger, request ledger, bound context;     |
//! |                  | long-operation diagnostic above threshold                  |
//! | destroyed        | evict from graph, ledger and context table                 |
//!
//! Every handler runs to completion synchronously and never schedules work.
//! Ordering violations degrade diagnostics; they never fail the host, except
//! that assertion-class violations panic under [`ViolationPolicy::Panic`].

use super::tombstones::Tombstones;
use crate::causality::{CausalityGraph, TaskRecord};
use crate::config::{HookOptions, ViolationPolicy};
use crate::context::{ContextTable, RequestContext};
use crate::diagnostics::{DiagnosticSink, LongOperation};
use crate::domain::{Duration, LifecycleError, TaskId, TaskKind, Timestamp};
use crate::timing::TimingLedger;
use log::{debug, warn};
use std::rc::Rc;

/// Counters for what the hook has seen since installation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HookStats {
    pub created: u64,
    pub runs: u64,
    pub destroyed: u64,
    /// Runs that could be attributed to neither a request root nor a context
    pub unattributed_runs: u64,
    pub long_operations: u64,
    pub violations: u64,
}

/// Entry counts of the three maps; all zero once every task is destroyed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiveEntries {
    pub graph: usize,
    pub ledger: usize,
    pub contexts: usize,
}

impl LiveEntries {
    #[must_use]
    pub fn total(&self) -> usize {
        self.graph + self.ledger + self.contexts
    }
}

pub struct SchedulerHook<M> {
    options: HookOptions,
    enabled: bool,
    graph: CausalityGraph,
    ledger: TimingLedger,
    contexts: ContextTable<M>,
    tombstones: Tombstones,
    sink: Box<dyn DiagnosticSink>,
    /// Timestamp of the first event seen; long-operation offsets are relative to it
    epoch: Option<Timestamp>,
    stats: HookStats,
}

impl<M> SchedulerHook<M> {
    /// Create a disabled hook
    pub fn new(options: HookOptions, sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            graph: CausalityGraph::new(options.request_root_kind),
            ledger: TimingLedger::new(),
            contexts: ContextTable::new(),
            tombstones: Tombstones::new(options.tombstone_capacity),
            sink,
            epoch: None,
            stats: HookStats::default(),
            enabled: false,
            options,
        }
    }

    pub fn options(&self) -> &HookOptions {
        &self.options
    }

    pub fn stats(&self) -> HookStats {
        self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop observing. Graph, ledger and context bindings are dropped
    /// because *destroyed* events go unseen while disabled; re-enabling
    /// starts clean. Toggle from top-level code rather than from inside a
    /// task body.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.graph.clear();
        self.ledger.clear();
        self.contexts.clear();
    }

    // ------------------------------------------------------------------
    // Lifecycle events
    // ------------------------------------------------------------------

    pub fn on_created(
        &mut self,
        task: TaskId,
        kind: TaskKind,
        parent: Option<TaskId>,
        at: Timestamp,
    ) {
        if !self.accepts(task, "created", at) {
            return;
        }
        let parent = parent.filter(|p| !p.is_top_level());
        if self.options.verbose_logging {
            debug!("Phase: created, task: {task}, kind: {kind}, parent: {parent:?}");
        }
        self.stats.created += 1;
        self.graph.record(task, kind, parent);
        self.contexts.inherit_on_create(task, parent);
    }

    pub fn on_before(&mut self, task: TaskId, at: Timestamp) {
        if !self.accepts(task, "about-to-run", at) {
            return;
        }
        if self.options.verbose_logging {
            debug!("Phase: about-to-run, task: {task}");
        }
        if let Err(err) = self.ledger.record_start(task, at) {
            self.violation(&err, true);
        }
    }

    pub fn on_after(&mut self, task: TaskId, at: Timestamp) {
        if !self.accepts(task, "finished-running", at) {
            return;
        }
        let duration = match self.ledger.record_end(task, at) {
            Ok(duration) => duration,
            Err(err) => {
                // Degraded: the run counts as zero time.
                self.violation(&err, true);
                return;
            }
        };
        self.stats.runs += 1;

        let walked_root = self.graph.find_owning_request_root(task);
        self.ledger.record_duration(task, walked_root, duration);

        let context = self.contexts.get(task).map(Rc::clone);
        if let Some(context) = &context {
            context.record_cpu_time(task, duration);
        }
        if walked_root.is_none() && context.is_none() {
            self.stats.unattributed_runs += 1;
        }
        if self.options.verbose_logging {
            debug!(
                "Phase: finished-running, task: {task}, duration: {duration}, root: {walked_root:?}"
            );
        }

        if duration > self.options.long_operation_threshold() {
            self.report_long_operation(task, duration, walked_root, context.as_deref(), at);
        }
    }

    pub fn on_destroyed(&mut self, task: TaskId, at: Timestamp) {
        if !self.accepts(task, "destroyed", at) {
            return;
        }
        if self.options.verbose_logging {
            debug!("Phase: destroyed, task: {task}");
        }
        self.stats.destroyed += 1;
        self.graph.evict(task);
        self.ledger.evict(task);
        self.contexts.evict(task);
        self.tombstones.insert(task);
    }

    /// Common gate for every event: enabled, and not about a destroyed task
    fn accepts(&mut self, task: TaskId, event: &'static str, at: Timestamp) -> bool {
        if !self.enabled {
            return false;
        }
        self.epoch.get_or_insert(at);
        if self.tombstones.contains(task) {
            self.violation(&LifecycleError::AfterDestroy { task, event }, false);
            return false;
        }
        true
    }

    fn violation(&mut self, err: &LifecycleError, assertion: bool) {
        self.stats.violations += 1;
        if assertion && self.options.violation_policy == ViolationPolicy::Panic {
            panic!("lifecycle violation: {err}");
        }
        warn!("Lifecycle violation: {err}; event ignored");
    }

    fn report_long_operation(
        &mut self,
        task: TaskId,
        duration: Duration,
        walked_root: Option<TaskId>,
        context: Option<&RequestContext<M>>,
        at: Timestamp,
    ) {
        self.stats.long_operations += 1;
        let epoch = self.epoch.unwrap_or(at);
        let op = LongOperation {
            offset_ms: at.saturating_since(epoch).as_millis(),
            request_root_id: context.map(RequestContext::root_task_id).or(walked_root).map(|t| t.0),
            request_id: context.and_then(RequestContext::request_id).map(|id| id.0),
            task_id: task.0,
            duration_ms: duration.as_millis(),
            tags: context.map(|c| c.tags_for(task)).unwrap_or_default(),
        };
        self.sink.emit(&op);
    }

    // ------------------------------------------------------------------
    // Context bindings
    // ------------------------------------------------------------------

    /// Bind `context` to `task`. Ignored while disabled: the task's
    /// *destroyed* event would be dropped and the binding never evicted.
    pub fn bind(&mut self, task: TaskId, context: Rc<RequestContext<M>>) {
        if !self.enabled {
            debug!("Hook disabled; context rooted at {} left unbound", context.root_task_id());
            return;
        }
        if self.options.verbose_logging {
            debug!("Bind context rooted at {} to {task}", context.root_task_id());
        }
        self.contexts.bind(task, context);
    }

    pub fn rebind(&mut self, task: TaskId, context: &Rc<RequestContext<M>>) -> bool {
        if !self.enabled {
            return false;
        }
        let switched = self.contexts.rebind(task, context);
        if switched && self.options.verbose_logging {
            debug!("Rebind {task} to context rooted at {}", context.root_task_id());
        }
        switched
    }

    pub fn context_for(&self, task: TaskId) -> Option<Rc<RequestContext<M>>> {
        self.contexts.get(task).map(Rc::clone)
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn lookup(&self, task: TaskId) -> Option<TaskRecord> {
        self.graph.lookup(task).copied()
    }

    pub fn owning_request_root(&self, task: TaskId) -> Option<TaskId> {
        self.graph.find_owning_request_root(task)
    }

    pub fn task_cpu_time(&self, task: TaskId) -> Duration {
        self.ledger.task_total(task)
    }

    pub fn request_cpu_time(&self, root: TaskId) -> Duration {
        self.ledger.request_total(root)
    }

    pub fn live_entries(&self) -> LiveEntries {
        LiveEntries {
            graph: self.graph.len(),
            ledger: self.ledger.len(),
            contexts: self.contexts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ChannelSink;
    use crossbeam_channel::Receiver;

    const MS: u64 = 1_000_000;

    fn hook(policy: ViolationPolicy) -> (SchedulerHook<()>, Receiver<LongOperation>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let options = HookOptions {
            violation_policy: policy,
            ..HookOptions::default()
        };
        let mut hook = SchedulerHook::new(options, Box::new(ChannelSink::new(tx)));
        hook.enable();
        (hook, rx)
    }

    fn run(hook: &mut SchedulerHook<()>, task: u64, from_ms: u64, to_ms: u64) {
        hook.on_before(TaskId(task), Timestamp(from_ms * MS));
        hook.on_after(TaskId(task), Timestamp(to_ms * MS));
    }

    #[test]
    fn test_disabled_by_default() {
        let sink = Box::new(crate::diagnostics::FanoutSink::new());
        let mut hook: SchedulerHook<()> = SchedulerHook::new(HookOptions::default(), sink);
        assert!(!hook.is_enabled());
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        assert_eq!(hook.live_entries().total(), 0);
        assert_eq!(hook.stats().created, 0);
    }

    #[test]
    fn test_repeated_runs_sum_into_task_and_request() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        hook.on_created(TaskId(2), TaskKind::Timer, Some(TaskId(1)), Timestamp(0));
        run(&mut hook, 2, 0, 5);
        run(&mut hook, 2, 10, 13);
        run(&mut hook, 1, 20, 21);
        assert_eq!(hook.task_cpu_time(TaskId(2)), Duration::from_millis(8));
        assert_eq!(hook.request_cpu_time(TaskId(1)), Duration::from_millis(9));
        assert_eq!(hook.stats().runs, 3);
    }

    #[test]
    fn test_run_without_root_still_counts_per_task() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(5), TaskKind::Immediate, None, Timestamp(0));
        run(&mut hook, 5, 0, 4);
        assert_eq!(hook.task_cpu_time(TaskId(5)), Duration::from_millis(4));
        assert_eq!(hook.stats().unattributed_runs, 1);
    }

    #[test]
    fn test_threshold_is_strict() {
        let (mut hook, rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(1), TaskKind::Timer, None, Timestamp(0));
        run(&mut hook, 1, 0, 100);
        run(&mut hook, 1, 200, 299);
        assert!(rx.is_empty());
        run(&mut hook, 1, 300, 450);
        assert_eq!(rx.len(), 1);
        let op = rx.try_recv().unwrap();
        assert_eq!(op.task_id, 1);
        assert_eq!(op.duration_ms, 150.0);
        assert_eq!(op.offset_ms, 450.0);
        assert_eq!(op.request_root_id, None);
    }

    #[test]
    fn test_destroy_evicts_everything() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        hook.bind(TaskId(1), Rc::new(RequestContext::new(TaskId(1), ())));
        run(&mut hook, 1, 0, 3);
        hook.on_destroyed(TaskId(1), Timestamp(4 * MS));
        assert!(hook.lookup(TaskId(1)).is_none());
        assert!(hook.context_for(TaskId(1)).is_none());
        assert_eq!(hook.task_cpu_time(TaskId(1)), Duration::ZERO);
        assert_eq!(hook.live_entries(), LiveEntries::default());
    }

    #[test]
    fn test_cancelled_task_evicts_cleanly() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        hook.bind(TaskId(1), Rc::new(RequestContext::new(TaskId(1), ())));
        hook.on_created(TaskId(2), TaskKind::Timer, Some(TaskId(1)), Timestamp(0));
        hook.on_destroyed(TaskId(2), Timestamp(0));
        assert!(hook.lookup(TaskId(2)).is_none());
        assert!(hook.context_for(TaskId(2)).is_none());
        assert_eq!(hook.stats().violations, 0);
    }

    #[test]
    fn test_events_after_destroy_are_ignored() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_created(TaskId(1), TaskKind::Timer, None, Timestamp(0));
        hook.on_destroyed(TaskId(1), Timestamp(0));
        hook.on_before(TaskId(1), Timestamp(0));
        hook.on_after(TaskId(1), Timestamp(MS));
        hook.on_destroyed(TaskId(1), Timestamp(MS));
        assert_eq!(hook.stats().violations, 3);
        assert_eq!(hook.live_entries().total(), 0);
    }

    #[test]
    #[should_panic(expected = "lifecycle violation")]
    fn test_duplicate_start_panics_under_panic_policy() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_before(TaskId(1), Timestamp(0));
        hook.on_before(TaskId(1), Timestamp(MS));
    }

    #[test]
    fn test_duplicate_start_keeps_first_under_warn_policy() {
        let (mut hook, _rx) = hook(ViolationPolicy::Warn);
        hook.on_created(TaskId(1), TaskKind::Timer, None, Timestamp(0));
        hook.on_before(TaskId(1), Timestamp(0));
        hook.on_before(TaskId(1), Timestamp(5 * MS));
        hook.on_after(TaskId(1), Timestamp(7 * MS));
        assert_eq!(hook.task_cpu_time(TaskId(1)), Duration::from_millis(7));
        assert_eq!(hook.stats().violations, 1);
    }

    #[test]
    #[should_panic(expected = "no start timestamp")]
    fn test_missing_start_panics_under_panic_policy() {
        let (mut hook, _rx) = hook(ViolationPolicy::Panic);
        hook.on_after(TaskId(1), Timestamp(0));
    }

    #[test]
    fn test_missing_start_is_zero_duration_under_warn_policy() {
        let (mut hook, rx) = hook(ViolationPolicy::Warn);
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        hook.on_after(TaskId(1), Timestamp(500 * MS));
        assert_eq!(hook.task_cpu_time(TaskId(1)), Duration::ZERO);
        assert_eq!(hook.stats().runs, 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_disable_forgets_pending_runs() {
        let (mut hook, _rx) = hook(ViolationPolicy::Warn);
        hook.on_before(TaskId(1), Timestamp(0));
        hook.disable();
        hook.on_after(TaskId(1), Timestamp(MS));
        hook.enable();
        hook.on_before(TaskId(1), Timestamp(2 * MS));
        assert_eq!(hook.stats().violations, 0);
    }

    #[test]
    fn test_disable_drops_state_for_tasks_destroyed_unseen() {
        let (mut hook, _rx) = hook(ViolationPolicy::Warn);
        hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
        hook.bind(TaskId(1), Rc::new(RequestContext::new(TaskId(1), ())));
        hook.on_before(TaskId(1), Timestamp(0));
        hook.on_after(TaskId(1), Timestamp(MS));
        assert!(hook.live_entries().total() > 0);

        hook.disable();
        hook.on_destroyed(TaskId(1), Timestamp(2 * MS));
        assert_eq!(hook.live_entries().total(), 0);
    }

    #[test]
    fn test_bindings_are_ignored_while_disabled() {
        let (mut hook, _rx) = hook(ViolationPolicy::Warn);
        hook.disable();
        let context = Rc::new(RequestContext::new(TaskId(1), ()));
        hook.bind(TaskId(1), Rc::clone(&context));
        assert!(!hook.rebind(TaskId(2), &context));
        assert!(hook.context_for(TaskId(1)).is_none());
        assert_eq!(hook.live_entries().contexts, 0);
    }
}
