use crate::domain::TaskId;
use std::collections::{HashSet, VecDeque};

/// Bounded memory of recently destroyed task ids.
///
/// Lets the hook tell "event for a destroyed task" (a host ordering bug) apart
/// from "event for a task that predates the hook". Oldest ids fall out first.
#[derive(Debug)]
pub struct Tombstones {
    capacity: usize,
    order: VecDeque<TaskId>,
    members: HashSet<TaskId>,
}

impl Tombstones {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub fn insert(&mut self, task: TaskId) {
        if self.capacity == 0 || !self.members.insert(task) {
            return;
        }
        self.order.push_back(task);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    #[must_use]
    pub fn contains(&self, task: TaskId) -> bool {
        self.members.contains(&task)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
