//! Deterministic cooperative host
//!
//! A virtual-time event loop that emits the four lifecycle events for every
//! task, a serializing work queue, and a request workload built on both.
//! Durations are exact, so attribution can be checked to the nanosecond.

pub mod clock;
pub mod event_loop;
pub mod serial_queue;
pub mod workload;

pub use clock::VirtualClock;
pub use event_loop::{Cx, EventLoop};
pub use serial_queue::{Done, SerialQueue};
pub use workload::{QueueMode, Workload, WorkloadConfig};
