//! Drive a hook from a recorded lifecycle trace.
//!
//! The replayer plays the part of the host and of the request middleware:
//! it tracks which task is executing (a stack, since runs may nest in a
//! trace) and creates a request context the first time a request-root task
//! begins running. When that root task is destroyed its context is closed.

use super::processor::EventProcessor;
use crate::config::HookOptions;
use crate::context::{ExecutionScope, RequestContext};
use crate::diagnostics::{ChannelSink, DiagnosticSink, FanoutSink, LongOperation};
use crate::domain::{RequestId, TaskId};
use crate::export::RunSummary;
use crate::hook::{install_with_sink, HookHandle};
use crossbeam_channel::Receiver;
use log::warn;
use loopscope_common::{TaskEvent, EVENT_TASK_AFTER, EVENT_TASK_BEFORE, EVENT_TASK_DESTROYED};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::rc::Rc;

pub struct Replayer {
    hook: HookHandle<Value>,
    processor: EventProcessor,
    running: Vec<TaskId>,
    open: BTreeMap<TaskId, Rc<RequestContext<Value>>>,
    closed: Vec<Rc<RequestContext<Value>>>,
    long_ops: Receiver<LongOperation>,
    next_request_id: u64,
}

impl Replayer {
    /// Install and enable a fresh hook. Long operations go to `sink` and
    /// are also collected for the summary.
    pub fn new(options: HookOptions, sink: impl DiagnosticSink + 'static) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sinks = FanoutSink::new().with(ChannelSink::new(tx)).with(sink);
        let hook = install_with_sink(options, sinks);
        hook.enable();
        let processor = EventProcessor::new(Rc::new(hook.clone()));
        Self {
            hook,
            processor,
            running: Vec::new(),
            open: BTreeMap::new(),
            closed: Vec::new(),
            long_ops: rx,
            next_request_id: 1,
        }
    }

    #[must_use]
    pub fn hook(&self) -> &HookHandle<Value> {
        &self.hook
    }

    pub fn replay(&mut self, events: impl IntoIterator<Item = TaskEvent>) {
        for event in events {
            self.replay_event(event);
        }
    }

    pub fn replay_event(&mut self, event: TaskEvent) {
        let task = TaskId(event.task_id);
        match event.event_type {
            EVENT_TASK_BEFORE => {
                self.processor.process_event(event);
                self.running.push(task);
                self.open_context_if_root(task);
            }
            EVENT_TASK_AFTER => {
                self.processor.process_event(event);
                match self.running.iter().rposition(|t| *t == task) {
                    Some(pos) => {
                        if pos + 1 != self.running.len() {
                            warn!("{task} finished while nested runs were still open");
                        }
                        self.running.truncate(pos);
                    }
                    None => warn!("{task} finished without a matching start in the trace"),
                }
            }
            EVENT_TASK_DESTROYED => {
                self.processor.process_event(event);
                if let Some(context) = self.open.remove(&task) {
                    self.closed.push(context);
                }
            }
            _ => self.processor.process_event(event),
        }
    }

    fn open_context_if_root(&mut self, task: TaskId) {
        if self.open.contains_key(&task) {
            return;
        }
        let root_kind = self.hook.options().request_root_kind;
        if self.hook.lookup(task).map(|record| record.kind) != Some(root_kind) {
            return;
        }
        let context = self.hook.create_request_context(&*self, json!({ "rootTaskId": task.0 }));
        context.set_request_id(RequestId(self.next_request_id));
        self.next_request_id += 1;
        self.open.insert(task, context);
    }

    /// Close the replay. Requests whose root was never destroyed are
    /// reported after the closed ones, ordered by root task id.
    pub fn finish(mut self) -> RunSummary {
        self.closed.extend(std::mem::take(&mut self.open).into_values());
        RunSummary {
            requests: self.closed,
            long_operations: self.long_ops.try_iter().collect(),
            hook: self.hook.stats(),
            events: self.processor.stats,
            live: self.hook.live_entries(),
        }
    }
}

impl ExecutionScope for Replayer {
    fn current_task(&self) -> TaskId {
        self.running.last().copied().unwrap_or(TaskId::TOP_LEVEL)
    }
}
