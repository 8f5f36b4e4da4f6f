//! # Shared Data Structures (Host ↔ Observer)
//!
//! Defines the raw lifecycle event record a cooperative host emits for every
//! scheduled unit of work, plus the constants both sides agree on. All types
//! use `#[repr(C)]` so a host written against a C ABI can fill them in
//! directly.
//!
//! ## Lifecycle
//!
//! Every task goes through four events, in this order:
//!
//! 1. **Created** - task was scheduled by whichever task was executing
//! 2. **Before** - task body is about to run (may repeat)
//! 3. **After** - task body finished running (paired with Before)
//! 4. **Destroyed** - task will never run again
//!
//! ## Key Types
//!
//! - [`TaskEvent`] - Core event structure passed from host to observer

#![no_std]

// ============================================================================
// Event Type Constants
// ============================================================================

/// **Created**: Task was scheduled
///
/// Carries: `parent_id` (task executing at scheduling time), `kind`
pub const EVENT_TASK_CREATED: u32 = 1;

/// **Before**: Task body is about to run
///
/// Paired with: `EVENT_TASK_AFTER`
pub const EVENT_TASK_BEFORE: u32 = 2;

/// **After**: Task body finished running
///
/// Paired with: `EVENT_TASK_BEFORE`
pub const EVENT_TASK_AFTER: u32 = 3;

/// **Destroyed**: Task is gone; no further events may name it
pub const EVENT_TASK_DESTROYED: u32 = 4;

// ============================================================================
// Task Kind Codes
// ============================================================================

/// Kind code not recognised by this crate. Never a request root.
pub const KIND_UNKNOWN: u32 = 0;

/// Start of a logical unit of external work (one incoming request)
pub const KIND_REQUEST_ROOT: u32 = 1;

/// Timer expiry
pub const KIND_TIMER: u32 = 2;

/// Completion of a write to a socket or file
pub const KIND_WRITE_COMPLETION: u32 = 3;

/// Promise/continuation job
pub const KIND_MICROTASK: u32 = 4;

/// "Run on next loop turn" callback
pub const KIND_IMMEDIATE: u32 = 5;

/// Work dispatched by an application-level serializing queue
pub const KIND_QUEUE_TASK: u32 = 6;

// ============================================================================
// Well-known Values
// ============================================================================

/// Task id reported while no task body is executing (top-level code).
///
/// Also used as `parent_id` of tasks scheduled from top-level code, which
/// therefore have no recorded parent.
pub const TOP_LEVEL_TASK_ID: u64 = 0;

/// Default threshold above which a single run is reported as a long operation
pub const DEFAULT_LONG_OPERATION_THRESHOLD_MS: u64 = 100;

// ============================================================================
// Shared Data Structures
// ============================================================================

/// Lifecycle event sent from the host scheduler to the observer
///
/// **Memory Layout**: `#[repr(C)]` with explicit padding, 40 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskEvent {
    /// Task this event is about. Issued monotonically by the host, never reused.
    pub task_id: u64,

    /// Task that was executing when `task_id` was scheduled.
    ///
    /// Only meaningful for `EVENT_TASK_CREATED`; `TOP_LEVEL_TASK_ID` means
    /// "scheduled from top-level code" (no parent).
    pub parent_id: u64,

    /// Monotonic timestamp in nanoseconds, supplied by the host clock.
    ///
    /// Durations are computed from the Before/After pair of the same task.
    pub timestamp_ns: u64,

    /// Event type (see `EVENT_TASK_*`)
    pub event_type: u32,

    /// Task kind code (see `KIND_*`), only meaningful for `EVENT_TASK_CREATED`
    pub kind: u32,

    /// Reserved, always zero
    #[allow(clippy::pub_underscore_fields)]
    pub _padding: [u8; 8],
}

impl TaskEvent {
    /// Build a `Created` event
    #[must_use]
    pub const fn created(task_id: u64, kind: u32, parent_id: u64, timestamp_ns: u64) -> Self {
        Self {
            task_id,
            parent_id,
            timestamp_ns,
            event_type: EVENT_TASK_CREATED,
            kind,
            _padding: [0; 8],
        }
    }

    /// Build a `Before` event
    #[must_use]
    pub const fn before(task_id: u64, timestamp_ns: u64) -> Self {
        Self::simple(task_id, EVENT_TASK_BEFORE, timestamp_ns)
    }

    /// Build an `After` event
    #[must_use]
    pub const fn after(task_id: u64, timestamp_ns: u64) -> Self {
        Self::simple(task_id, EVENT_TASK_AFTER, timestamp_ns)
    }

    /// Build a `Destroyed` event
    #[must_use]
    pub const fn destroyed(task_id: u64, timestamp_ns: u64) -> Self {
        Self::simple(task_id, EVENT_TASK_DESTROYED, timestamp_ns)
    }

    const fn simple(task_id: u64, event_type: u32, timestamp_ns: u64) -> Self {
        Self {
            task_id,
            parent_id: TOP_LEVEL_TASK_ID,
            timestamp_ns,
            event_type,
            kind: KIND_UNKNOWN,
            _padding: [0; 8],
        }
    }

    /// Parent task, or `None` when scheduled from top-level code
    #[must_use]
    pub const fn parent(&self) -> Option<u64> {
        if self.parent_id == TOP_LEVEL_TASK_ID {
            None
        } else {
            Some(self.parent_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_layout_is_stable() {
        assert_eq!(core::mem::size_of::<TaskEvent>(), 40);
    }

    #[test]
    fn test_top_level_parent_is_none() {
        let event = TaskEvent::created(7, KIND_TIMER, TOP_LEVEL_TASK_ID, 0);
        assert_eq!(event.parent(), None);
        assert_eq!(TaskEvent::created(8, KIND_TIMER, 7, 0).parent(), Some(7));
    }
}
