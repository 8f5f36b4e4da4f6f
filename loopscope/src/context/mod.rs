//! Request context propagation
//!
//! - [`RequestContext`]: per-request accounting shared across a causality subtree
//! - [`ContextTable`]: task → context bindings, with inheritance and rebind
//! - [`ExecutionScope`]: the host's answer to "which task is running right now?"

pub mod propagation;
pub mod request_context;

pub use propagation::ContextTable;
pub use request_context::{RequestContext, RequestReport, TaskCpuReport};

use crate::domain::TaskId;

/// Capability exposed by the host scheduler: the task whose body is
/// executing right now, or [`TaskId::TOP_LEVEL`] outside any task.
///
/// The context API takes this explicitly instead of reading hidden ambient
/// state, so hosts with explicit task handles work the same way.
pub trait ExecutionScope {
    fn current_task(&self) -> TaskId;
}

/// A task id is its own scope, for hosts that pass task handles around.
impl ExecutionScope for TaskId {
    fn current_task(&self) -> TaskId {
        *self
    }
}
