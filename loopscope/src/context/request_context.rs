//! Request context: the per-request record shared by every task in the
//! request's causality subtree.
//!
//! A context is created by request-handling code (never by the scheduler) and
//! handed around as `Rc<RequestContext<M>>`. The hook mutates it from
//! finished-running events, so its accounting state sits behind a `RefCell`.
//! Metadata `M` is opaque to the core; it is only serialized for reports.

use super::ExecutionScope;
use crate::domain::{Duration, RequestId, TaskId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

#[derive(Debug, Default)]
struct Accounting {
    request_id: Option<RequestId>,
    total_cpu_time: Duration,
    cpu_time_by_task: BTreeMap<TaskId, Duration>,
    tags_by_task: BTreeMap<TaskId, BTreeSet<String>>,
}

#[derive(Debug)]
pub struct RequestContext<M> {
    root_task_id: TaskId,
    metadata: M,
    accounting: RefCell<Accounting>,
}

impl<M> RequestContext<M> {
    /// Create a context anchored at `root_task_id`. Binding it to the task is
    /// the caller's job; see `HookHandle::create_request_context`.
    pub fn new(root_task_id: TaskId, metadata: M) -> Self {
        Self {
            root_task_id,
            metadata,
            accounting: RefCell::new(Accounting::default()),
        }
    }

    pub fn root_task_id(&self) -> TaskId {
        self.root_task_id
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    pub fn set_request_id(&self, id: RequestId) {
        self.accounting.borrow_mut().request_id = Some(id);
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.accounting.borrow().request_id
    }

    pub fn total_cpu_time(&self) -> Duration {
        self.accounting.borrow().total_cpu_time
    }

    /// CPU time recorded for `task` under this context, zero if none
    pub fn cpu_time_for(&self, task: TaskId) -> Duration {
        self.accounting.borrow().cpu_time_by_task.get(&task).copied().unwrap_or_default()
    }

    /// Per-task breakdown, ordered by task id
    pub fn cpu_time_by_task(&self) -> Vec<(TaskId, Duration)> {
        self.accounting.borrow().cpu_time_by_task.iter().map(|(t, d)| (*t, *d)).collect()
    }

    /// Tags attached to `task`, sorted
    pub fn tags_for(&self, task: TaskId) -> Vec<String> {
        self.accounting
            .borrow()
            .tags_by_task
            .get(&task)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Tag the task presently executing in `scope`
    pub fn add_tag(&self, scope: &impl ExecutionScope, tag: impl Into<String>) {
        self.add_tag_to(scope.current_task(), tag);
    }

    /// Tag a specific task
    pub fn add_tag_to(&self, task: TaskId, tag: impl Into<String>) {
        self.accounting.borrow_mut().tags_by_task.entry(task).or_default().insert(tag.into());
    }

    /// Credit one finished run of `task`. Called by the scheduler hook.
    pub(crate) fn record_cpu_time(&self, task: TaskId, duration: Duration) {
        let mut accounting = self.accounting.borrow_mut();
        accounting.total_cpu_time += duration;
        *accounting.cpu_time_by_task.entry(task).or_default() += duration;
    }
}

impl<M: Serialize> RequestContext<M> {
    fn metadata_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.metadata).unwrap_or(serde_json::Value::Null)
    }

    /// Human-readable multi-line summary.
    ///
    /// ```text
    /// requestId: 1, rootTaskId: 4, totalCpuTime: 162.00ms, metadata: {"path":"/"}
    ///   - taskId: 9, cpuTime: 150.00ms, tags: ["serialize"]
    ///   - taskId: 11, cpuTime: 12.00ms, tags: []
    /// ```
    pub fn to_diagnostic_string(&self) -> String {
        let accounting = self.accounting.borrow();
        let request_id = accounting
            .request_id
            .map_or_else(|| "unassigned".to_string(), |id| id.to_string());
        let mut summary = format!(
            "requestId: {request_id}, rootTaskId: {}, totalCpuTime: {}, metadata: {}\n",
            self.root_task_id.0,
            accounting.total_cpu_time,
            self.metadata_json()
        );
        for (task, cpu_time) in &accounting.cpu_time_by_task {
            let tags: Vec<&String> =
                accounting.tags_by_task.get(task).map(|t| t.iter().collect()).unwrap_or_default();
            let tags = serde_json::to_string(&tags).unwrap_or_default();
            let _ = writeln!(summary, "  - taskId: {}, cpuTime: {cpu_time}, tags: {tags}", task.0);
        }
        summary
    }

    /// Serializable snapshot for export
    pub fn report(&self) -> RequestReport {
        let accounting = self.accounting.borrow();
        let tasks = accounting
            .cpu_time_by_task
            .iter()
            .map(|(task, cpu_time)| TaskCpuReport {
                task_id: task.0,
                cpu_time_ms: cpu_time.as_millis(),
                tags: accounting
                    .tags_by_task
                    .get(task)
                    .map(|t| t.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();
        RequestReport {
            request_id: accounting.request_id.map(|id| id.0),
            root_task_id: self.root_task_id.0,
            total_cpu_time_ms: accounting.total_cpu_time.as_millis(),
            metadata: self.metadata_json(),
            tasks,
        }
    }
}

/// Snapshot of one request's accounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReport {
    pub request_id: Option<u64>,
    pub root_task_id: u64,
    pub total_cpu_time_ms: f64,
    pub metadata: serde_json::Value,
    pub tasks: Vec<TaskCpuReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCpuReport {
    pub task_id: u64,
    pub cpu_time_ms: f64,
    pub tags: Vec<String>,
}
