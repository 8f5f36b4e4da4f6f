//! CPU time attribution

pub mod ledger;

pub use ledger::{accumulate, TimingLedger};
