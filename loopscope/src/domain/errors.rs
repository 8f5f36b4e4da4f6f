//! Structured error types for loopscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::TaskId;
use thiserror::Error;

/// A lifecycle event arrived in an order the hook does not support.
///
/// None of these ever reach the host; the hook logs them and ignores (or
/// degrades) the offending event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{0} is already running: about-to-run without a matching finished-running")]
    DuplicateStart(TaskId),

    #[error("{0} finished running but no start timestamp was recorded")]
    MissingStart(TaskId),

    #[error("{event} event for {task} after it was destroyed")]
    AfterDestroy { task: TaskId, event: &'static str },

    #[error("Unknown lifecycle event type: {0}")]
    UnknownEventType(u32),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read options file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid options in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Invalid trace record on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
