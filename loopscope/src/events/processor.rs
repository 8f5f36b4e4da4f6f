//! # Event Processing
//!
//! Consumes raw [`TaskEvent`]s from a host and routes them to a
//! [`LifecycleObserver`].
//!
//! ## Event Routing
//!
//! - `EVENT_TASK_CREATED` → `on_created` (kind and parent decoded)
//! - `EVENT_TASK_BEFORE` / `EVENT_TASK_AFTER` → `on_before` / `on_after`
//! - `EVENT_TASK_DESTROYED` → `on_destroyed`
//! - anything else → counted and logged, never forwarded
//!
//! ## Outputs
//!
//! - **Observer**: always
//! - **Recorder**: optional trace file of every known event, for later replay

use super::trace_file::TraceRecorder;
use crate::domain::{LifecycleError, TaskId, TaskKind, Timestamp};
use crate::hook::LifecycleObserver;
use log::warn;
use loopscope_common::{
    TaskEvent, EVENT_TASK_AFTER, EVENT_TASK_BEFORE, EVENT_TASK_CREATED, EVENT_TASK_DESTROYED,
};
use std::rc::Rc;

/// Per-event-type counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventStats {
    pub event_count: usize,
    pub created: usize,
    pub before: usize,
    pub after: usize,
    pub destroyed: usize,
    pub unknown: usize,
    /// Events the recorder failed to write
    pub record_failures: usize,
}

/// Encapsulates event routing and its counters
pub struct EventProcessor {
    observer: Rc<dyn LifecycleObserver>,
    pub stats: EventStats,
    recorder: Option<TraceRecorder>,
}

impl EventProcessor {
    #[must_use]
    pub fn new(observer: Rc<dyn LifecycleObserver>) -> Self {
        Self {
            observer,
            stats: EventStats::default(),
            recorder: None,
        }
    }

    /// Also write every routed event to `recorder`
    #[must_use]
    pub fn with_recorder(mut self, recorder: TraceRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Process a single event
    pub fn process_event(&mut self, event: TaskEvent) {
        self.stats.event_count += 1;

        let task = TaskId(event.task_id);
        let at = Timestamp(event.timestamp_ns);
        match event.event_type {
            EVENT_TASK_CREATED => {
                self.stats.created += 1;
                let kind = TaskKind::from_code(event.kind);
                self.observer.on_created(task, kind, event.parent().map(TaskId), at);
            }
            EVENT_TASK_BEFORE => {
                self.stats.before += 1;
                self.observer.on_before(task, at);
            }
            EVENT_TASK_AFTER => {
                self.stats.after += 1;
                self.observer.on_after(task, at);
            }
            EVENT_TASK_DESTROYED => {
                self.stats.destroyed += 1;
                self.observer.on_destroyed(task, at);
            }
            other => {
                self.stats.unknown += 1;
                warn!("{}", LifecycleError::UnknownEventType(other));
                return;
            }
        }

        if let Some(ref mut recorder) = self.recorder {
            if let Err(e) = recorder.record(&event) {
                self.stats.record_failures += 1;
                if self.stats.record_failures == 1 {
                    warn!("Failed to record lifecycle event: {e}");
                }
            }
        }
    }

    /// Take the recorder (for a final flush)
    pub fn take_recorder(&mut self) -> Option<TraceRecorder> {
        self.recorder.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log(RefCell<Vec<String>>);

    impl LifecycleObserver for Log {
        fn on_created(&self, task: TaskId, kind: TaskKind, parent: Option<TaskId>, _: Timestamp) {
            let parent = parent.map(|p| p.0);
            self.0.borrow_mut().push(format!("created {} {kind} {parent:?}", task.0));
        }
        fn on_before(&self, task: TaskId, at: Timestamp) {
            self.0.borrow_mut().push(format!("before {} {}", task.0, at.0));
        }
        fn on_after(&self, task: TaskId, at: Timestamp) {
            self.0.borrow_mut().push(format!("after {} {}", task.0, at.0));
        }
        fn on_destroyed(&self, task: TaskId, _at: Timestamp) {
            self.0.borrow_mut().push(format!("destroyed {}", task.0));
        }
    }

    #[test]
    fn test_routes_each_event_type() {
        let log = Rc::new(Log::default());
        let mut processor = EventProcessor::new(log.clone());
        processor.process_event(TaskEvent::created(2, loopscope_common::KIND_TIMER, 1, 0));
        processor.process_event(TaskEvent::created(3, 99, 0, 0));
        processor.process_event(TaskEvent::before(2, 10));
        processor.process_event(TaskEvent::after(2, 20));
        processor.process_event(TaskEvent::destroyed(2, 30));

        assert_eq!(
            *log.0.borrow(),
            vec![
                "created 2 timer Some(1)",
                "created 3 unknown(99) None",
                "before 2 10",
                "after 2 20",
                "destroyed 2",
            ]
        );
        assert_eq!(processor.stats.event_count, 5);
        assert_eq!(processor.stats.created, 2);
    }

    #[test]
    fn test_unknown_event_type_is_counted_not_forwarded() {
        let log = Rc::new(Log::default());
        let mut processor = EventProcessor::new(log.clone());
        let mut event = TaskEvent::before(1, 0);
        event.event_type = 42;
        processor.process_event(event);
        assert!(log.0.borrow().is_empty());
        assert_eq!(processor.stats.unknown, 1);
    }

    #[test]
    fn test_recorder_sees_routed_events() {
        let log = Rc::new(Log::default());
        let mut processor =
            EventProcessor::new(log).with_recorder(TraceRecorder::new(Box::new(Vec::<u8>::new())));
        processor.process_event(TaskEvent::before(1, 0));
        processor.process_event(TaskEvent::after(1, 5));
        let recorder = processor.take_recorder().unwrap();
        assert_eq!(recorder.written(), 2);
    }
}
