//! procwatch - report when known application versions start or stop.
//!
//! Polls the OS process table and prints one line per transition until
//! interrupted with Ctrl-C.

mod printer;
mod status;

use anyhow::{Context, Result};
use clap::Parser;
use printer::ConsolePrinter;
use procwatch_core::{
    AppVersion, InitialSamplePolicy, MonitorConfig, ProcessMonitorBuilder, SysinfoProbe,
};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "procwatch")]
#[command(about = "Watch for known applications starting and stopping")]
struct Args {
    /// Poll interval in milliseconds
    #[arg(short, long, default_value_t = MonitorConfig::DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Also report applications found not running on the first poll
    #[arg(long, conflicts_with = "baseline")]
    report_initial_stop: bool,

    /// Treat the first poll as a silent baseline
    #[arg(long)]
    baseline: bool,

    /// Print the current status of each version and exit
    #[arg(long)]
    status: bool,

    /// Emit one JSON object per transition
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn initial_sample(&self) -> InitialSamplePolicy {
        if self.report_initial_stop {
            InitialSamplePolicy::Report
        } else if self.baseline {
            InitialSamplePolicy::Baseline
        } else {
            InitialSamplePolicy::SuppressInitialStop
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting procwatch on {}", procwatch_core::platform::current_platform());

    let registry = AppVersion::registry().context("Invalid identity table")?;

    if args.status {
        let status = status::query_status(&SysinfoProbe::for_app_versions(), &registry)
            .context("Failed to query process status")?;
        for (version, running) in status {
            println!("{}", status::format_status(&version, running, args.json));
        }
        return Ok(());
    }

    let monitor = ProcessMonitorBuilder::new(registry, SysinfoProbe::for_app_versions())
        .poll_interval(Duration::from_millis(args.interval_ms))
        .initial_sample(args.initial_sample())
        .listener(Arc::new(ConsolePrinter::new(args.json)))
        .build()
        .context("Invalid monitor configuration")?;

    monitor.start().context("Failed to start process monitor")?;

    // Wait for shutdown signal
    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    let _ = stop_rx.recv();
    info!("Shutdown signal received, exiting");
    monitor.shutdown();

    Ok(())
}
