//! Lifecycle trace files
//!
//! JSON Lines, one lifecycle event per line:
//!
//! ```text
//! {"event":"created","task":4,"kind":"request-root","tsNs":0}
//! {"event":"created","task":5,"kind":"timer","parent":4,"tsNs":1000}
//! {"event":"before","task":5,"tsNs":2000000}
//! {"event":"after","task":5,"tsNs":14000000}
//! {"event":"destroyed","task":5,"tsNs":14000000}
//! ```
//!
//! Blank lines are skipped. Written by [`TraceRecorder`], read by
//! [`read_trace`] for replay.

use crate::domain::{TaskKind, TraceError};
use loopscope_common::{
    TaskEvent, EVENT_TASK_AFTER, EVENT_TASK_BEFORE, EVENT_TASK_CREATED, EVENT_TASK_DESTROYED,
    TOP_LEVEL_TASK_ID,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceEventType {
    Created,
    Before,
    After,
    Destroyed,
}

/// One line of a trace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub event: TraceEventType,
    pub task: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,
    pub ts_ns: u64,
}

impl TraceRecord {
    /// `None` for event types with no trace representation
    #[must_use]
    pub fn from_event(event: &TaskEvent) -> Option<Self> {
        let kind_of = match event.event_type {
            EVENT_TASK_CREATED => TraceEventType::Created,
            EVENT_TASK_BEFORE => TraceEventType::Before,
            EVENT_TASK_AFTER => TraceEventType::After,
            EVENT_TASK_DESTROYED => TraceEventType::Destroyed,
            _ => return None,
        };
        let created = kind_of == TraceEventType::Created;
        Some(Self {
            event: kind_of,
            task: event.task_id,
            kind: created.then(|| TaskKind::from_code(event.kind)),
            parent: if created { event.parent() } else { None },
            ts_ns: event.timestamp_ns,
        })
    }

    #[must_use]
    pub fn to_event(&self) -> TaskEvent {
        match self.event {
            TraceEventType::Created => TaskEvent::created(
                self.task,
                self.kind.map_or(loopscope_common::KIND_UNKNOWN, TaskKind::code),
                self.parent.unwrap_or(TOP_LEVEL_TASK_ID),
                self.ts_ns,
            ),
            TraceEventType::Before => TaskEvent::before(self.task, self.ts_ns),
            TraceEventType::After => TaskEvent::after(self.task, self.ts_ns),
            TraceEventType::Destroyed => TaskEvent::destroyed(self.task, self.ts_ns),
        }
    }
}

/// Writes lifecycle events as trace lines
pub struct TraceRecorder {
    writer: Box<dyn Write>,
    written: usize,
}

impl TraceRecorder {
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer, written: 0 }
    }

    /// Create (truncate) a trace file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(std::io::BufWriter::new(file))))
    }

    /// Append one event. Unknown event types are skipped.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn record(&mut self, event: &TaskEvent) -> Result<(), TraceError> {
        let Some(record) = TraceRecord::from_event(event) else {
            return Ok(());
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and report how many events were written
    ///
    /// # Errors
    /// Returns an error if the flush fails
    pub fn finish(mut self) -> Result<usize, TraceError> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

/// Parse a whole trace
///
/// # Errors
/// Returns the first I/O error or the first malformed line (1-based)
pub fn read_trace(reader: impl BufRead) -> Result<Vec<TaskEvent>, TraceError> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(&line)
            .map_err(|source| TraceError::Parse {
                line: idx + 1,
                source,
            })?;
        events.push(record.to_event());
    }
    Ok(events)
}

/// Parse a trace file
///
/// # Errors
/// Returns an error if the file cannot be opened or parsed
pub fn read_trace_file(path: impl AsRef<Path>) -> Result<Vec<TaskEvent>, TraceError> {
    let file = std::fs::File::open(path)?;
    read_trace(BufReader::new(file))
}
