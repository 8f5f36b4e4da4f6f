//! # Simulated Event Loop
//!
//! A single-threaded cooperative scheduler on virtual time. It reports every
//! task's lifecycle through an [`EventProcessor`], the same path raw events
//! from a real host take.
//!
//! ## Scheduling
//!
//! ```text
//!   ready queue (FIFO) ──► run until empty
//!          ▲                     │
//!          │                     ▼
//!   timers (min-heap by due time, then creation order)
//! ```
//!
//! A task body runs to completion; [`Cx::burn`] advances virtual time to model
//! synchronous CPU work. When the ready queue drains, the clock jumps to the
//! earliest timer.
//!
//! ## Destruction
//!
//! A task is destroyed once it has run and all of its children have been
//! destroyed, so a task's ancestors always outlive it. A task cancelled before
//! it ran is destroyed immediately.

use super::clock::VirtualClock;
use crate::context::ExecutionScope;
use crate::domain::{Duration, TaskId, TaskKind, Timestamp};
use crate::events::{EventProcessor, EventStats, TraceRecorder};
use crate::hook::LifecycleObserver;
use loopscope_common::TaskEvent;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::rc::Rc;

type Job = Box<dyn FnOnce(&mut Cx<'_>)>;

struct TaskSlot {
    job: Option<Job>,
    parent: Option<TaskId>,
    ran: bool,
    live_children: usize,
}

struct Alarm {
    due: Timestamp,
    seq: u64,
    task: TaskId,
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Alarm {}

impl PartialOrd for Alarm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Alarm {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct EventLoop {
    clock: VirtualClock,
    next_task_id: u64,
    next_alarm_seq: u64,
    tasks: HashMap<TaskId, TaskSlot>,
    ready: VecDeque<TaskId>,
    timers: BinaryHeap<Alarm>,
    current: TaskId,
    processor: EventProcessor,
}

impl EventLoop {
    #[must_use]
    pub fn new(observer: Rc<dyn LifecycleObserver>) -> Self {
        Self {
            clock: VirtualClock::new(),
            next_task_id: 1,
            next_alarm_seq: 0,
            tasks: HashMap::new(),
            ready: VecDeque::new(),
            timers: BinaryHeap::new(),
            current: TaskId::TOP_LEVEL,
            processor: EventProcessor::new(observer),
        }
    }

    /// Record every lifecycle event to `recorder`
    #[must_use]
    pub fn with_recorder(mut self, recorder: TraceRecorder) -> Self {
        self.processor = self.processor.with_recorder(recorder);
        self
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Tasks created and not yet destroyed
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn stats(&self) -> EventStats {
        self.processor.stats
    }

    pub fn take_recorder(&mut self) -> Option<TraceRecorder> {
        self.processor.take_recorder()
    }

    /// Queue a top-level task to run on the next turn
    pub fn spawn<F>(&mut self, kind: TaskKind, job: F) -> TaskId
    where
        F: FnOnce(&mut Cx<'_>) + 'static,
    {
        self.create(kind, Box::new(job), None)
    }

    /// Queue a top-level task to run once `delay` of virtual time has passed
    pub fn schedule<F>(&mut self, kind: TaskKind, delay: Duration, job: F) -> TaskId
    where
        F: FnOnce(&mut Cx<'_>) + 'static,
    {
        self.create(kind, Box::new(job), Some(delay))
    }

    /// Cancel a task that has not started. Returns false if it is unknown,
    /// running or already ran.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        match self.tasks.get(&task) {
            Some(slot) if slot.job.is_some() && task != self.current => {}
            _ => return false,
        }
        // Never-run tasks have no children
        if let Some(slot) = self.tasks.get_mut(&task) {
            slot.job = None;
            slot.ran = true;
        }
        self.reap(task);
        true
    }

    /// Run until no task is ready and no timer is pending
    pub fn run(&mut self) {
        loop {
            if let Some(task) = self.ready.pop_front() {
                self.run_task(task);
                continue;
            }
            match self.timers.pop() {
                Some(alarm) => {
                    self.clock.advance_to(alarm.due);
                    self.run_task(alarm.task);
                }
                None => break,
            }
        }
    }

    fn create(&mut self, kind: TaskKind, job: Job, delay: Option<Duration>) -> TaskId {
        let task = TaskId(self.next_task_id);
        self.next_task_id += 1;

        let parent = (!self.current.is_top_level()).then_some(self.current);
        if let Some(slot) = parent.and_then(|p| self.tasks.get_mut(&p)) {
            slot.live_children += 1;
        }
        self.tasks.insert(task, TaskSlot {
            job: Some(job),
            parent,
            ran: false,
            live_children: 0,
        });

        let now = self.clock.now();
        self.processor.process_event(TaskEvent::created(
            task.0,
            kind.code(),
            parent.map_or(loopscope_common::TOP_LEVEL_TASK_ID, |p| p.0),
            now.0,
        ));

        match delay {
            None => self.ready.push_back(task),
            Some(delay) => {
                let due = Timestamp(now.0.saturating_add(delay.0));
                self.timers.push(Alarm {
                    due,
                    seq: self.next_alarm_seq,
                    task,
                });
                self.next_alarm_seq += 1;
            }
        }
        task
    }

    fn run_task(&mut self, task: TaskId) {
        // Cancelled tasks are gone or have no job left
        let Some(job) = self.tasks.get_mut(&task).and_then(|slot| slot.job.take()) else {
            return;
        };

        self.processor.process_event(TaskEvent::before(task.0, self.clock.now().0));
        let previous = std::mem::replace(&mut self.current, task);
        job(&mut Cx { event_loop: self });
        self.current = previous;
        self.processor.process_event(TaskEvent::after(task.0, self.clock.now().0));

        if let Some(slot) = self.tasks.get_mut(&task) {
            slot.ran = true;
        }
        self.reap(task);
    }

    /// Destroy `task` if it is finished, then walk up destroying every
    /// ancestor that was only waiting on it.
    fn reap(&mut self, task: TaskId) {
        let mut next = Some(task);
        while let Some(task) = next.take() {
            let finished =
                self.tasks.get(&task).is_some_and(|slot| slot.ran && slot.live_children == 0);
            if !finished {
                break;
            }
            let Some(slot) = self.tasks.remove(&task) else {
                break;
            };
            self.processor.process_event(TaskEvent::destroyed(task.0, self.clock.now().0));
            if let Some(parent) = slot.parent {
                if let Some(parent_slot) = self.tasks.get_mut(&parent) {
                    parent_slot.live_children = parent_slot.live_children.saturating_sub(1);
                    next = Some(parent);
                }
            }
        }
    }
}

/// What a running task body can do
pub struct Cx<'a> {
    event_loop: &'a mut EventLoop,
}

impl Cx<'_> {
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        self.event_loop.current
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.event_loop.now()
    }

    /// Simulate synchronous CPU work
    pub fn burn(&mut self, work: Duration) {
        self.event_loop.clock.advance(work);
    }

    /// Create a child task that runs on the next turn
    pub fn spawn<F>(&mut self, kind: TaskKind, job: F) -> TaskId
    where
        F: FnOnce(&mut Cx<'_>) + 'static,
    {
        self.event_loop.create(kind, Box::new(job), None)
    }

    /// Create a child timer task
    pub fn set_timeout<F>(&mut self, delay: Duration, job: F) -> TaskId
    where
        F: FnOnce(&mut Cx<'_>) + 'static,
    {
        self.event_loop.create(TaskKind::Timer, Box::new(job), Some(delay))
    }

    pub fn cancel(&mut self, task: TaskId) -> bool {
        self.event_loop.cancel(task)
    }
}

impl ExecutionScope for Cx<'_> {
    fn current_task(&self) -> TaskId {
        self.event_loop.current
    }
}

impl ExecutionScope for EventLoop {
    fn current_task(&self) -> TaskId {
        self.current
    }
}
