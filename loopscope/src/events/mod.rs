//! Raw lifecycle event intake
//!
//! - [`EventProcessor`]: decode [`loopscope_common::TaskEvent`]s and route them to an observer
//! - [`trace_file`]: record and read JSON Lines traces
//! - [`Replayer`]: run a recorded trace back through a fresh hook

pub mod processor;
pub mod replay;
pub mod trace_file;

pub use processor::{EventProcessor, EventStats};
pub use replay::Replayer;
pub use trace_file::{read_trace, read_trace_file, TraceEventType, TraceRecord, TraceRecorder};
