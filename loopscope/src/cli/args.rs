//! CLI argument definitions

use crate::sim::{QueueMode, WorkloadConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loopscope",
    version,
    about = "Attribute event-loop CPU time to the requests that caused it",
    after_help = "\
EXAMPLES:
    loopscope simulate                         Five serialized requests
    loopscope simulate --requests 20 --record run.jsonl
    loopscope replay run.jsonl --export report.json"
)]
pub struct Args {
    /// Hook options file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report task runs longer than this (overrides the options file)
    #[arg(long, global = true, value_name = "MS")]
    pub threshold_ms: Option<u64>,

    /// Log every lifecycle phase at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a request workload on the simulated event loop
    Simulate(SimulateArgs),

    /// Replay a recorded lifecycle trace
    Replay(ReplayArgs),
}

#[derive(clap::Args)]
pub struct SimulateArgs {
    /// Number of requests
    #[arg(long, default_value = "5")]
    pub requests: usize,

    /// Milliseconds between request arrivals
    #[arg(long, default_value = "10")]
    pub interval_ms: u64,

    /// How request pipelines are started
    #[arg(long, value_enum, default_value = "serial")]
    pub mode: ModeArg,

    /// Synchronous "decrypt" work per request (ms)
    #[arg(long, default_value = "20")]
    pub decrypt_ms: u64,

    /// Synchronous "serialize" work per request (ms)
    #[arg(long, default_value = "150")]
    pub serialize_ms: u64,

    /// Record the lifecycle events to a trace file for later replay
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,

    /// Export the report to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ReplayArgs {
    /// Trace file (JSON Lines) to replay
    #[arg(value_name = "FILE")]
    pub trace: PathBuf,

    /// Export the report to a JSON file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Through a concurrency-1 queue
    Serial,
    /// Straight from the request handler
    Direct,
}

impl SimulateArgs {
    #[must_use]
    pub fn workload(&self) -> WorkloadConfig {
        WorkloadConfig {
            requests: self.requests,
            arrival_interval_ms: self.interval_ms,
            mode: match self.mode {
                ModeArg::Serial => QueueMode::Serial,
                ModeArg::Direct => QueueMode::Direct,
            },
            decrypt_cost_ms: self.decrypt_ms,
            serialize_cost_ms: self.serialize_ms,
            ..WorkloadConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_defaults_match_workload_defaults() {
        let args = Args::try_parse_from(["loopscope", "simulate"]).unwrap();
        let Command::Simulate(simulate) = args.command else {
            panic!("expected simulate");
        };
        assert_eq!(simulate.workload(), WorkloadConfig::default());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let argv = ["loopscope", "replay", "run.jsonl", "--threshold-ms", "50", "-q"];
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.threshold_ms, Some(50));
        assert!(args.quiet);
        let Command::Replay(replay) = args.command else {
            panic!("expected replay");
        };
        assert_eq!(replay.trace, PathBuf::from("run.jsonl"));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["loopscope"]).is_err());
    }
}
