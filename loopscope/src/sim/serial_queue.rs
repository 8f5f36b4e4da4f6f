//! Concurrency-1 work queue.
//!
//! Jobs run one at a time, each in its own queue task. The first job is
//! dispatched from the task that pushed it; every later job is dispatched
//! from the task that finished the previous one. So a queued job for request
//! B usually descends from request A's tasks, and request code has to rebind
//! to its own context when the job starts.

use super::event_loop::Cx;
use crate::domain::TaskKind;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type QueueJob = Box<dyn FnOnce(&mut Cx<'_>, Done)>;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueJob>,
    busy: bool,
    completed: usize,
}

#[derive(Clone, Default)]
pub struct SerialQueue {
    state: Rc<RefCell<QueueState>>,
}

impl SerialQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job; it starts immediately if the queue is idle
    pub fn push<F>(&self, cx: &mut Cx<'_>, job: F)
    where
        F: FnOnce(&mut Cx<'_>, Done) + 'static,
    {
        {
            let mut state = self.state.borrow_mut();
            if state.busy {
                state.pending.push_back(Box::new(job));
                return;
            }
            state.busy = true;
        }
        self.dispatch(cx, Box::new(job));
    }

    /// Jobs waiting behind the running one
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.state.borrow().completed
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    fn dispatch(&self, cx: &mut Cx<'_>, job: QueueJob) {
        let done = Done {
            queue: self.clone(),
        };
        cx.spawn(TaskKind::QueueTask, move |cx| job(cx, done));
    }
}

/// Completion token handed to each job; finishing it releases the queue
#[must_use = "the queue stays busy until the job calls Done::finish"]
pub struct Done {
    queue: SerialQueue,
}

impl Done {
    /// Mark the job complete from the task executing in `cx` and start the
    /// next job, if any, as a child of that task
    pub fn finish(self, cx: &mut Cx<'_>) {
        let next = {
            let mut state = self.queue.state.borrow_mut();
            state.completed += 1;
            let next = state.pending.pop_front();
            if next.is_none() {
                state.busy = false;
            }
            next
        };
        if let Some(job) = next {
            self.queue.dispatch(cx, job);
        }
    }
}
