//! Scheduler hook: the single integration point with the host scheduler.
//!
//! - [`install`] / [`install_with_sink`] create a disabled [`HookHandle`]
//! - the host drives it through [`LifecycleObserver`]
//! - request code uses the handle's context API

pub mod handle;
pub mod scheduler_hook;
pub mod tombstones;

pub use handle::{install, install_with_sink, HookHandle};
pub use scheduler_hook::{HookStats, LiveEntries, SchedulerHook};

use crate::domain::{TaskId, TaskKind, Timestamp};

/// The four lifecycle events a host scheduler reports for every task.
///
/// For a given task the host must deliver `on_created` first, then any
/// number of complete `on_before`/`on_after` pairs, then `on_destroyed`.
/// Implementations run synchronously and must not schedule work.
pub trait LifecycleObserver {
    fn on_created(&self, task: TaskId, kind: TaskKind, parent: Option<TaskId>, at: Timestamp);
    fn on_before(&self, task: TaskId, at: Timestamp);
    fn on_after(&self, task: TaskId, at: Timestamp);
    fn on_destroyed(&self, task: TaskId, at: Timestamp);
}
