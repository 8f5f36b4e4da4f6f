//! Side channels for long-operation diagnostics.
//!
//! These bypass the `log` facade entirely: a filtered or buffered logger must
//! never swallow a report of the loop being blocked.

use super::LongOperation;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::io::Write;

/// Receives every long-operation diagnostic, synchronously, from inside the
/// finished-running handler. Implementations must not block or schedule work.
pub trait DiagnosticSink {
    fn emit(&self, op: &LongOperation);
}

/// Unbuffered line on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, op: &LongOperation) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{op}");
    }
}

/// Non-blocking hand-off to another consumer; drops when the channel is full
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<LongOperation>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: Sender<LongOperation>) -> Self {
        Self { tx }
    }
}

impl DiagnosticSink for ChannelSink {
    fn emit(&self, op: &LongOperation) {
        let _ = self.tx.try_send(op.clone());
    }
}

/// One JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> DiagnosticSink for JsonLinesSink<W> {
    fn emit(&self, op: &LongOperation) {
        let mut writer = self.writer.borrow_mut();
        if serde_json::to_writer(&mut *writer, op).is_ok() {
            let _ = writer.write_all(b"\n");
            let _ = writer.flush();
        }
    }
}

/// Forwards to every contained sink; empty means diagnostics are dropped
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn DiagnosticSink>>,
}

impl FanoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DiagnosticSink for FanoutSink {
    fn emit(&self, op: &LongOperation) {
        for sink in &self.sinks {
            sink.emit(op);
        }
    }
}
