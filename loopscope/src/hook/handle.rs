//! Installation handle and the context API used by request-handling code.

use super::scheduler_hook::{HookStats, LiveEntries, SchedulerHook};
use super::LifecycleObserver;
use crate::causality::TaskRecord;
use crate::config::HookOptions;
use crate::context::{ExecutionScope, RequestContext};
use crate::diagnostics::{DiagnosticSink, StderrSink};
use crate::domain::{Duration, TaskId, TaskKind, Timestamp};
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

/// Install a hook that reports long operations on stderr.
///
/// The hook starts disabled; call [`HookHandle::enable`].
#[must_use]
pub fn install<M>(options: HookOptions) -> HookHandle<M> {
    install_with_sink(options, StderrSink)
}

/// Install a hook that reports long operations to `sink`.
#[must_use]
pub fn install_with_sink<M>(
    options: HookOptions,
    sink: impl DiagnosticSink + 'static,
) -> HookHandle<M> {
    HookHandle {
        inner: Rc::new(RefCell::new(SchedulerHook::new(options, Box::new(sink)))),
    }
}

/// Shared handle to one installed hook.
///
/// Cloning is cheap; every clone drives the same hook. The host feeds it
/// lifecycle events through [`LifecycleObserver`], request code uses the
/// context API. Neither may be called from inside a [`DiagnosticSink`].
pub struct HookHandle<M = serde_json::Value> {
    inner: Rc<RefCell<SchedulerHook<M>>>,
}

impl<M> Clone for HookHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M> HookHandle<M> {
    pub fn enable(&self) {
        self.inner.borrow_mut().enable();
    }

    pub fn disable(&self) {
        self.inner.borrow_mut().disable();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.borrow().is_enabled()
    }

    #[must_use]
    pub fn options(&self) -> HookOptions {
        self.inner.borrow().options().clone()
    }

    #[must_use]
    pub fn stats(&self) -> HookStats {
        self.inner.borrow().stats()
    }

    // ------------------------------------------------------------------
    // Context API
    // ------------------------------------------------------------------

    /// Create a request context rooted at the task executing in `scope` and
    /// bind it there. Tasks created afterwards from that task inherit it.
    ///
    /// While the hook is disabled the context is returned unbound.
    pub fn create_request_context(
        &self,
        scope: &impl ExecutionScope,
        metadata: M,
    ) -> Rc<RequestContext<M>> {
        let root = scope.current_task();
        if root.is_top_level() {
            debug!("Request context created from top-level code; no task will inherit it");
        }
        let context = Rc::new(RequestContext::new(root, metadata));
        self.inner.borrow_mut().bind(root, Rc::clone(&context));
        context
    }

    /// Context bound to the task executing in `scope`
    #[must_use]
    pub fn current_request_context(
        &self,
        scope: &impl ExecutionScope,
    ) -> Option<Rc<RequestContext<M>>> {
        self.inner.borrow().context_for(scope.current_task())
    }

    /// Explicitly bind the task executing in `scope` to `context`.
    ///
    /// Needed wherever a scheduling layer (a serializing work queue, say)
    /// re-enters request code from a task that is not causally descended from
    /// the request. A no-op when the task is already bound to a context with
    /// the same root, or while the hook is disabled; returns whether the
    /// binding changed.
    pub fn rebind_current_task(
        &self,
        scope: &impl ExecutionScope,
        context: &Rc<RequestContext<M>>,
    ) -> bool {
        self.inner.borrow_mut().rebind(scope.current_task(), context)
    }

    /// Tag the task executing in `scope` inside whatever context it is bound
    /// to. Returns false when the task has no context.
    pub fn add_tag(&self, scope: &impl ExecutionScope, tag: impl Into<String>) -> bool {
        let task = scope.current_task();
        match self.inner.borrow().context_for(task) {
            Some(context) => {
                context.add_tag_to(task, tag);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    #[must_use]
    pub fn lookup(&self, task: TaskId) -> Option<TaskRecord> {
        self.inner.borrow().lookup(task)
    }

    #[must_use]
    pub fn owning_request_root(&self, task: TaskId) -> Option<TaskId> {
        self.inner.borrow().owning_request_root(task)
    }

    #[must_use]
    pub fn context_for(&self, task: TaskId) -> Option<Rc<RequestContext<M>>> {
        self.inner.borrow().context_for(task)
    }

    #[must_use]
    pub fn task_cpu_time(&self, task: TaskId) -> Duration {
        self.inner.borrow().task_cpu_time(task)
    }

    #[must_use]
    pub fn request_cpu_time(&self, root: TaskId) -> Duration {
        self.inner.borrow().request_cpu_time(root)
    }

    #[must_use]
    pub fn live_entries(&self) -> LiveEntries {
        self.inner.borrow().live_entries()
    }
}

impl<M> LifecycleObserver for HookHandle<M> {
    fn on_created(&self, task: TaskId, kind: TaskKind, parent: Option<TaskId>, at: Timestamp) {
        self.inner.borrow_mut().on_created(task, kind, parent, at);
    }

    fn on_before(&self, task: TaskId, at: Timestamp) {
        self.inner.borrow_mut().on_before(task, at);
    }

    fn on_after(&self, task: TaskId, at: Timestamp) {
        self.inner.borrow_mut().on_after(task, at);
    }

    fn on_destroyed(&self, task: TaskId, at: Timestamp) {
        self.inner.borrow_mut().on_destroyed(task, at);
    }
}
