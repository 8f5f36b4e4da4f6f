//! Causality tracking
//!
//! Parent/child edges between scheduled tasks and the upward walk that finds
//! the request a task ultimately belongs to.

pub mod graph;

pub use graph::{CausalityGraph, TaskRecord};
