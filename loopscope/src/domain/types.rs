//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like passing a request id where
//! a task id is expected, and make function signatures more expressive.

use loopscope_common::{
    KIND_IMMEDIATE, KIND_MICROTASK, KIND_QUEUE_TASK, KIND_REQUEST_ROOT, KIND_TIMER,
    KIND_UNKNOWN, KIND_WRITE_COMPLETION, TOP_LEVEL_TASK_ID,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Task ID
///
/// Identifies one scheduled unit of work. Issued monotonically by the host
/// scheduler and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Reported by the host while top-level code (no task body) is executing
    pub const TOP_LEVEL: TaskId = TaskId(TOP_LEVEL_TASK_ID);

    /// Returns true for the top-level sentinel
    #[must_use]
    pub fn is_top_level(self) -> bool {
        self == Self::TOP_LEVEL
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task#{}", self.0)
    }
}

/// Request ID
///
/// Assigned by request-handling code once the request is parsed, which can be
/// well after its context was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a scheduled task
///
/// Only used to recognise request roots while walking the causality graph.
/// Codes the crate does not know are kept as `Unknown` and never match.
/// Any name outside the built-in ones deserializes as `Unknown`, so traces
/// from hosts with their own kind names still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    RequestRoot,
    Timer,
    WriteCompletion,
    Microtask,
    Immediate,
    QueueTask,
    Unknown(u32),
}

impl TaskKind {
    /// Decode a raw kind code from a `TaskEvent`
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            KIND_REQUEST_ROOT => TaskKind::RequestRoot,
            KIND_TIMER => TaskKind::Timer,
            KIND_WRITE_COMPLETION => TaskKind::WriteCompletion,
            KIND_MICROTASK => TaskKind::Microtask,
            KIND_IMMEDIATE => TaskKind::Immediate,
            KIND_QUEUE_TASK => TaskKind::QueueTask,
            other => TaskKind::Unknown(other),
        }
    }

    /// Encode for a `TaskEvent`
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            TaskKind::RequestRoot => KIND_REQUEST_ROOT,
            TaskKind::Timer => KIND_TIMER,
            TaskKind::WriteCompletion => KIND_WRITE_COMPLETION,
            TaskKind::Microtask => KIND_MICROTASK,
            TaskKind::Immediate => KIND_IMMEDIATE,
            TaskKind::QueueTask => KIND_QUEUE_TASK,
            TaskKind::Unknown(code) => code,
        }
    }

    /// Human-readable name, as used in trace files
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::RequestRoot => "request-root",
            TaskKind::Timer => "timer",
            TaskKind::WriteCompletion => "write-completion",
            TaskKind::Microtask => "microtask",
            TaskKind::Immediate => "immediate",
            TaskKind::QueueTask => "queue-task",
            TaskKind::Unknown(_) => "unknown",
        }
    }

    /// Parse a name produced by [`TaskKind::name`]. Unrecognised names map to
    /// `Unknown(KIND_UNKNOWN)`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "request-root" => TaskKind::RequestRoot,
            "timer" => TaskKind::Timer,
            "write-completion" => TaskKind::WriteCompletion,
            "microtask" => TaskKind::Microtask,
            "immediate" => TaskKind::Immediate,
            "queue-task" => TaskKind::QueueTask,
            _ => TaskKind::Unknown(KIND_UNKNOWN),
        }
    }
}

/// Wire forms accepted for a kind: a name, or `{"unknown": code}`
#[derive(Deserialize)]
#[serde(untagged)]
enum TaskKindRepr {
    Name(String),
    Code { unknown: u32 },
}

impl<'de> Deserialize<'de> for TaskKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match TaskKindRepr::deserialize(deserializer)? {
            TaskKindRepr::Name(name) => TaskKind::from_name(&name),
            TaskKindRepr::Code { unknown } => TaskKind::Unknown(unknown),
        })
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Unknown(code) => write!(f, "unknown({code})"),
            known => f.write_str(known.name()),
        }
    }
}

/// Timestamp in nanoseconds
///
/// Monotonic host time. Only differences between two timestamps from the same
/// host are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Time elapsed since `earlier`, zero if the clock went backwards
    #[must_use]
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Convert to milliseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl fmt::Display for Timestamp {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0 as f64 / 1_000_000_000.0)
    }
}

/// Duration in nanoseconds
///
/// Accumulated CPU time. Addition saturates instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Duration(ms.saturating_mul(1_000_000))
    }

    /// Convert to milliseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        if ms >= 1000.0 {
            write!(f, "{:.2}s", self.as_seconds())
        } else {
            write!(f, "{ms:.2}ms")
        }
    }
}
