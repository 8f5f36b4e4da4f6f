//! Context propagation table.
//!
//! Maps live tasks to the request context they work for. A context is shared
//! by reference across its whole causality subtree; no task owns it.

use super::request_context::RequestContext;
use crate::domain::TaskId;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct ContextTable<M> {
    by_task: HashMap<TaskId, Rc<RequestContext<M>>>,
}

impl<M> Default for ContextTable<M> {
    fn default() -> Self {
        Self {
            by_task: HashMap::new(),
        }
    }
}

impl<M> ContextTable<M> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `task` to `context`, replacing any previous binding
    pub fn bind(&mut self, task: TaskId, context: Rc<RequestContext<M>>) {
        self.by_task.insert(task, context);
    }

    #[must_use]
    pub fn get(&self, task: TaskId) -> Option<&Rc<RequestContext<M>>> {
        self.by_task.get(&task)
    }

    /// Give a freshly created task its parent's context.
    ///
    /// Returns true when a binding was added. A task that is already bound
    /// keeps its binding.
    pub fn inherit_on_create(&mut self, task: TaskId, parent: Option<TaskId>) -> bool {
        let Some(context) = parent.and_then(|p| self.by_task.get(&p)).map(Rc::clone) else {
            return false;
        };
        if self.by_task.contains_key(&task) {
            return false;
        }
        self.by_task.insert(task, context);
        true
    }

    /// Explicitly rebind `task`, overriding inheritance.
    ///
    /// Idempotent: when `task` is already bound to a context with the same
    /// root, nothing changes and this returns false. A context with a
    /// different root replaces the binding (latest write wins).
    pub fn rebind(&mut self, task: TaskId, context: &Rc<RequestContext<M>>) -> bool {
        if let Some(current) = self.by_task.get(&task) {
            if current.root_task_id() == context.root_task_id() {
                return false;
            }
        }
        self.by_task.insert(task, Rc::clone(context));
        true
    }

    /// Drop the binding of `task`. The context itself lives on as long as
    /// other tasks or callers hold it.
    pub fn evict(&mut self, task: TaskId) -> Option<Rc<RequestContext<M>>> {
        self.by_task.remove(&task)
    }

    pub fn clear(&mut self) {
        self.by_task.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_task.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty()
    }
}
