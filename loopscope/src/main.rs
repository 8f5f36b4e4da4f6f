//! # loopscope - Main Entry Point
//!
//! Supports two operational modes:
//! - **Simulate** (`loopscope simulate`): run a request workload on the virtual-time loop
//! - **Replay** (`loopscope replay trace.jsonl`): re-run a recorded lifecycle trace
//!
//! Both print each request's CPU breakdown and a hotspot summary, and can
//! export a JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use loopscope::cli::{Args, Command, ReplayArgs, SimulateArgs};
use loopscope::config::HookOptions;
use loopscope::diagnostics::{FanoutSink, StderrSink};
use loopscope::domain::ConfigError;
use loopscope::events::{read_trace_file, Replayer, TraceRecorder};
use loopscope::export::{ReportExporter, RunSummary};
use loopscope::sim::Workload;
use std::fs::File;
use std::io::BufWriter;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Options file first, then command-line overrides
fn load_options(args: &Args) -> Result<HookOptions> {
    let mut options = match &args.config {
        Some(path) => HookOptions::from_file(path)?,
        None => HookOptions::default(),
    };
    if let Some(ms) = args.threshold_ms {
        options.long_operation_threshold_ms = ms;
    }
    if args.verbose {
        options.verbose_logging = true;
    }
    Ok(options)
}

/// Long operations go to stderr unless `--quiet`
fn sink(quiet: bool) -> FanoutSink {
    if quiet {
        FanoutSink::new()
    } else {
        FanoutSink::new().with(StderrSink)
    }
}

fn run(args: &Args) -> Result<()> {
    let options = load_options(args)?;
    info!("Hook options: {options:?}");

    let (summary, export) = match &args.command {
        Command::Simulate(simulate) => {
            (run_simulation(simulate, options, args.quiet)?, &simulate.export)
        }
        Command::Replay(replay) => (run_replay(replay, options, args.quiet)?, &replay.export),
    };

    print_summary(&summary, args.quiet);

    if let Some(path) = export {
        let file = File::create(path).context("Failed to create report output file")?;
        ReportExporter::from_summary(&summary)
            .export(BufWriter::new(file))
            .context("Failed to export report")?;
        if !args.quiet {
            println!("saved: {}", path.display());
        }
    }

    Ok(())
}

fn run_simulation(
    simulate: &SimulateArgs,
    options: HookOptions,
    quiet: bool,
) -> Result<RunSummary> {
    let recorder = simulate
        .record
        .as_deref()
        .map(|path| {
            TraceRecorder::create(path)
                .with_context(|| format!("Failed to create trace file {}", path.display()))
        })
        .transpose()?;

    let summary = Workload::new(simulate.workload())
        .run(options, sink(quiet), recorder)
        .context("Failed to record lifecycle trace")?;

    if let (Some(path), false) = (&simulate.record, quiet) {
        println!("recorded: {} ({} events)", path.display(), summary.events.event_count);
    }
    Ok(summary)
}

fn run_replay(replay: &ReplayArgs, options: HookOptions, quiet: bool) -> Result<RunSummary> {
    let events = read_trace_file(&replay.trace)
        .with_context(|| format!("Failed to read trace {}", replay.trace.display()))?;
    info!("Replaying {} lifecycle events", events.len());

    let mut replayer = Replayer::new(options, sink(quiet));
    replayer.replay(events);
    Ok(replayer.finish())
}

fn print_summary(summary: &RunSummary, quiet: bool) {
    for request in &summary.requests {
        print!("{}", request.to_diagnostic_string());
    }

    let hotspots = summary.hotspots();
    if !hotspots.is_empty() {
        println!("\nHOTSPOTS");
        for hotspot in &hotspots {
            println!(
                "  {:<16} {:>4} ops  {:>10.2}ms  {:>5.1}%  max {:.2}ms",
                hotspot.tag, hotspot.count, hotspot.total_ms, hotspot.percentage, hotspot.max_ms
            );
        }
    }

    if !quiet {
        eprintln!(
            "\n{} requests, {} events (runs: {}, unattributed: {}, long: {}, violations: {}, \
             live entries: {})",
            summary.requests.len(),
            summary.events.event_count,
            summary.hook.runs,
            summary.hook.unattributed_runs,
            summary.hook.long_operations,
            summary.hook.violations,
            summary.live.total(),
        );
    }
}
