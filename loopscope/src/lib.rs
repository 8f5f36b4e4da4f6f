//! # loopscope - Request Context Tracking for Cooperative Event Loops
//!
//! loopscope attributes CPU time on a single-threaded event loop to the
//! logical request that caused it. The host scheduler reports four lifecycle
//! events for every asynchronous task; a scheduler hook turns them into a
//! causality graph, per-task and per-request CPU totals, and long-operation
//! diagnostics for any task run that held the loop too long.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Host Scheduler                             │
//! │   (simulated event loop, recorded trace, or a real runtime)     │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ created / before / after / destroyed
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  loopscope (This Crate)                         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    Event     │──▶│  Scheduler   │──▶│  Diagnostic  │         │
//! │  │  Processor   │   │     Hook     │   │    Sinks     │         │
//! │  └──────────────┘   └──────┬───────┘   └──────────────┘         │
//! │                            │                                    │
//! │         ┌──────────────────┼──────────────────┐                 │
//! │         ▼                  ▼                  ▼                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Causality   │   │    Timing    │   │   Context    │         │
//! │  │    Graph     │   │    Ledger    │   │    Table     │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐                            │
//! │  │   Analysis   │   │    Export    │                            │
//! │  │  (Hotspots)  │   │(report.json) │                            │
//! │  └──────────────┘   └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Core
//!
//! - [`hook`]: the scheduler hook, its installation handle and the
//!   [`hook::LifecycleObserver`] seam hosts call into
//! - [`causality`]: task → (kind, parent) records and the owning-root walk
//! - [`timing`]: start timestamps and accumulated CPU time
//! - [`context`]: request contexts, their propagation table, and the
//!   [`context::ExecutionScope`] capability
//! - [`diagnostics`]: long-operation records and sinks
//!
//! ### Hosts and tooling
//!
//! - [`events`]: raw event routing, trace recording and replay
//! - [`sim`]: deterministic virtual-time event loop, serial queue and workload
//! - [`analysis`]: tag hotspots over long operations
//! - [`export`]: JSON report
//! - [`cli`], [`config`]: command line and hook options
//! - [`domain`]: identifiers, time types and errors
//!
//! ## Typical Usage
//!
//! ```
//! use loopscope::config::HookOptions;
//! use loopscope::diagnostics::FanoutSink;
//! use loopscope::domain::{TaskId, TaskKind, Timestamp};
//! use loopscope::hook::{install_with_sink, HookHandle, LifecycleObserver};
//!
//! let hook: HookHandle<()> = install_with_sink(HookOptions::default(), FanoutSink::new());
//! hook.enable();
//!
//! // Host side
//! hook.on_created(TaskId(1), TaskKind::RequestRoot, None, Timestamp(0));
//! hook.on_before(TaskId(1), Timestamp(0));
//!
//! // Request side, inside task 1
//! let context = hook.create_request_context(&TaskId(1), ());
//!
//! hook.on_after(TaskId(1), Timestamp(3_000_000));
//! assert_eq!(context.total_cpu_time().as_millis(), 3.0);
//! ```
//!
//! ## Key Concepts
//!
//! - **Task**: one unit of scheduled asynchronous work, run to completion
//! - **Request root**: the task kind that marks the start of a logical request
//! - **Request context**: per-request accounting inherited by descendant tasks
//! - **Rebind**: explicit re-association for work that re-enters request code
//!   from a task outside the request's causality subtree

pub mod analysis;
pub mod causality;
pub mod cli;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod domain;
pub mod events;
pub mod export;
pub mod hook;
pub mod sim;
pub mod timing;
