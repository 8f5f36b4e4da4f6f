//! Request workload on the simulated loop.
//!
//! Every request goes through the same pipeline:
//!
//! ```text
//! request-root ── create context, handler work, push job ──► queue
//! queue-task   ── set request id, rebind, timer hop
//! timer        ── "decrypt" work, timer hop
//! timer        ── "serialize" work, write
//! write-compl. ── write work, release the queue
//! ```
//!
//! In [`QueueMode::Serial`] jobs go through a [`SerialQueue`], so each
//! request's pipeline descends from the previous request's last task. In
//! [`QueueMode::Direct`] the pipeline runs straight from the request root.

use super::event_loop::{Cx, EventLoop};
use super::serial_queue::{Done, SerialQueue};
use crate::config::HookOptions;
use crate::context::RequestContext;
use crate::diagnostics::{ChannelSink, DiagnosticSink, FanoutSink};
use crate::domain::{Duration, RequestId, TaskKind, TraceError};
use crate::events::TraceRecorder;
use crate::export::RunSummary;
use crate::hook::{install_with_sink, HookHandle};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    #[default]
    Serial,
    Direct,
}

/// Shape and costs of a simulated workload. All times in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkloadConfig {
    pub requests: usize,
    /// Gap between request arrivals
    pub arrival_interval_ms: u64,
    pub mode: QueueMode,
    pub handler_cost_ms: u64,
    pub decrypt_cost_ms: u64,
    pub serialize_cost_ms: u64,
    pub write_cost_ms: u64,
    /// Delay of each timer hop
    pub hop_delay_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            requests: 5,
            arrival_interval_ms: 10,
            mode: QueueMode::Serial,
            handler_cost_ms: 1,
            decrypt_cost_ms: 20,
            serialize_cost_ms: 150,
            write_cost_ms: 2,
            hop_delay_ms: 1,
        }
    }
}

impl WorkloadConfig {
    /// CPU time one request should be charged
    #[must_use]
    pub fn expected_request_cpu_time(&self) -> Duration {
        Duration::from_millis(
            self.handler_cost_ms
                + self.decrypt_cost_ms
                + self.serialize_cost_ms
                + self.write_cost_ms,
        )
    }
}

pub struct Workload {
    config: WorkloadConfig,
}

impl Workload {
    #[must_use]
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Run the workload to completion under a fresh hook. Long operations go
    /// to `sink` and into the summary; with a recorder every lifecycle event
    /// is also written out.
    ///
    /// # Errors
    /// Returns an error if the recorder cannot be flushed
    pub fn run(
        &self,
        options: HookOptions,
        sink: impl DiagnosticSink + 'static,
        recorder: Option<TraceRecorder>,
    ) -> Result<RunSummary, TraceError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let hook: HookHandle<Value> =
            install_with_sink(options, FanoutSink::new().with(ChannelSink::new(tx)).with(sink));
        hook.enable();

        let mut event_loop = EventLoop::new(Rc::new(hook.clone()));
        if let Some(recorder) = recorder {
            event_loop = event_loop.with_recorder(recorder);
        }

        let queue = SerialQueue::new();
        let contexts = Rc::new(RefCell::new(Vec::new()));
        info!("Simulating {} requests ({:?} mode)", self.config.requests, self.config.mode);

        for index in 0..self.config.requests {
            let request = Request {
                id: RequestId(index as u64 + 1),
                hook: hook.clone(),
                config: self.config.clone(),
            };
            let queue = queue.clone();
            let contexts = Rc::clone(&contexts);
            let arrival = Duration::from_millis(self.config.arrival_interval_ms * index as u64);
            event_loop.schedule(TaskKind::RequestRoot, arrival, move |cx| {
                request.handle(cx, &queue, &contexts);
            });
        }
        event_loop.run();

        if let Some(recorder) = event_loop.take_recorder() {
            let written = recorder.finish()?;
            debug!("Recorded {written} lifecycle events");
        }

        let requests = std::mem::take(&mut *contexts.borrow_mut());
        Ok(RunSummary {
            requests,
            long_operations: rx.try_iter().collect(),
            hook: hook.stats(),
            events: event_loop.stats(),
            live: hook.live_entries(),
        })
    }
}

struct Request {
    id: RequestId,
    hook: HookHandle<Value>,
    config: WorkloadConfig,
}

impl Request {
    fn handle(
        self,
        cx: &mut Cx<'_>,
        queue: &SerialQueue,
        contexts: &RefCell<Vec<Rc<RequestContext<Value>>>>,
    ) {
        let metadata = json!({ "method": "GET", "path": "/", "request": self.id.0 });
        let context = self.hook.create_request_context(cx, metadata);
        contexts.borrow_mut().push(Rc::clone(&context));
        cx.burn(Duration::from_millis(self.config.handler_cost_ms));

        match self.config.mode {
            QueueMode::Serial => {
                queue.push(cx, move |cx, done| self.process(cx, &context, Some(done)));
            }
            QueueMode::Direct => self.process(cx, &context, None),
        }
    }

    fn process(self, cx: &mut Cx<'_>, context: &Rc<RequestContext<Value>>, done: Option<Done>) {
        context.set_request_id(self.id);
        // The queue task may descend from another request
        self.hook.rebind_current_task(cx, context);

        let hop = Duration::from_millis(self.config.hop_delay_ms);
        cx.set_timeout(hop, move |cx| {
            self.hook.add_tag(cx, "decrypt");
            cx.burn(Duration::from_millis(self.config.decrypt_cost_ms));

            cx.set_timeout(hop, move |cx| {
                self.hook.add_tag(cx, "serialize");
                cx.burn(Duration::from_millis(self.config.serialize_cost_ms));

                cx.spawn(TaskKind::WriteCompletion, move |cx| {
                    cx.burn(Duration::from_millis(self.config.write_cost_ms));
                    if let Some(done) = done {
                        done.finish(cx);
                    }
                });
            });
        });
    }
}
