//! Long-operation diagnostics
//!
//! A task run longer than the configured threshold blocked every other
//! request on the loop for that long. The hook reports each such run as a
//! [`LongOperation`] through a [`DiagnosticSink`].

pub mod long_operation;
pub mod sink;

pub use long_operation::LongOperation;
pub use sink::{ChannelSink, DiagnosticSink, FanoutSink, JsonLinesSink, StderrSink};
