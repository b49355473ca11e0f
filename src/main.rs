//! # Actuator Velocity Trace
//!
//! Collects `-n` samples of one actuator, one synchronous bus read per sample, then
//! writes them to `data-<timestamp>.csv` for offline analysis.
//!
//! ## Exit status
//! Nonzero on option-parse failure, missing or malformed configuration file, a
//! configuration with zero or several robots, or a failure to save the trace.

use clap::Parser;
use std::{path::PathBuf, time::Duration};
use log::info;

use velocity_trace::{
    acquisition::pacing::PacingStrategy,
    app::{RunOptions, run},
    utils::realtime::RealtimeOptions,
};

#[derive(Parser, Debug)]
#[command(name = "velocity_trace")]
#[command(about = "Collect a time-synchronised velocity trace from one actuator", long_about = None)]
struct Cli {
    /// Robot/bus configuration file
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Actuator index
    #[arg(short = 'a', long = "actuator", default_value_t = 0)]
    actuator: usize,

    /// Port number
    #[arg(short = 'p', long = "port", default_value_t = 0)]
    port: u32,

    /// Number of iterations (samples)
    #[arg(short = 'n', long = "number-iterations")]
    number_iterations: usize,

    /// Sleep between reads, in seconds
    #[arg(
        short = 's',
        long = "sleep-between-reads",
        default_value = "0.0003",
        value_parser = parse_seconds
    )]
    sleep_between_reads: Duration,

    /// Directory for the output table
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Pacing primitive between reads
    #[arg(long, value_enum, default_value_t = PacingStrategy::Spin)]
    pacing: PacingStrategy,

    /// Pin the acquisition thread to this CPU core
    #[arg(long)]
    core: Option<usize>,

    /// Run the acquisition thread at maximum OS priority
    #[arg(long)]
    max_priority: bool,

    /// Also render the velocity estimates to an SVG next to the table
    #[arg(long)]
    plot: bool,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("expected a non-negative number of seconds, got {}", s));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let options = RunOptions {
        config: cli.config,
        actuator: cli.actuator,
        port: cli.port,
        iterations: cli.number_iterations,
        sleep_between_reads: cli.sleep_between_reads,
        pacing: cli.pacing,
        output_dir: cli.output_dir,
        realtime: RealtimeOptions {
            core: cli.core,
            max_priority: cli.max_priority,
        },
        plot: cli.plot,
    };

    let outcome = run(&options)?;
    info!("Trace saved to: {}", outcome.table.display());
    if let Some(plot) = outcome.plot {
        info!("Plot saved to: {}", plot.display());
    }
    Ok(())
}
