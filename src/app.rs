//! End-to-end trace run: configuration → port + robot → acquisition → export.
//!
//! Configuration errors abort before the sample buffer exists. Everything after the
//! loop works on the read-only trace handed over by `AcquisitionLoop::finish`.

use anyhow::Context;
use chrono::Local;
use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};
use log::info;

use crate::acquisition::{
    acquisition_loop::{AcquisitionLoop, AcquisitionReport, AcquisitionSettings},
    pacing::{Pacer, Pacing, PacingStrategy},
    sample_buffer::SampleBuffer,
};
use crate::error::AcquisitionError;
use crate::robot_io::{
    Bus, HostClock, MonotonicClock, Robot,
    configuration::load_config,
    simulated::{SimulatedPort, SimulatedRobot},
};
use crate::utils::{
    export::export_trace,
    plot::render_velocity_plot,
    realtime::{RealtimeOptions, apply_to_current_thread},
    summary::{TraceSummary, log_summary, summarize},
};

/// Default pause between two reads (0.3 ms).
pub const DEFAULT_SLEEP_BETWEEN_READS: Duration = Duration::from_micros(300);

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: PathBuf,
    pub actuator: usize,
    pub port: u32,
    pub iterations: usize,
    pub sleep_between_reads: Duration,
    pub pacing: PacingStrategy,
    pub output_dir: PathBuf,
    pub realtime: RealtimeOptions,
    pub plot: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub table: PathBuf,
    pub plot: Option<PathBuf>,
    pub report: AcquisitionReport,
    pub summary: TraceSummary,
}

/// Runs the whole acquisition on `bus` and returns the completed trace.
pub fn acquire<B, C, P, W>(
    bus: B,
    clock: C,
    pacer: P,
    settings: AcquisitionSettings,
    progress_out: &mut W,
) -> Result<(SampleBuffer, AcquisitionReport), AcquisitionError>
where
    B: Bus,
    C: HostClock,
    P: Pacer,
    W: Write,
{
    let mut acquisition = AcquisitionLoop::new(bus, clock, pacer, settings)?;
    acquisition.run(progress_out)?;
    acquisition.finish()
}

/// Summarizes, exports and optionally plots a completed trace.
pub fn persist(
    buffer: &SampleBuffer,
    report: AcquisitionReport,
    options: &RunOptions,
) -> anyhow::Result<RunOutcome> {
    let trace = buffer.snapshot();

    let summary = summarize(trace, &report);
    log_summary(&summary);

    let table = export_trace(&options.output_dir, trace, &Local::now())
        .with_context(|| format!("failed to save trace in {}", options.output_dir.display()))?;

    let plot = if options.plot {
        render_velocity_plot(&table, trace).context("failed to render velocity plot")?
    } else {
        None
    };

    Ok(RunOutcome {
        table,
        plot,
        report,
        summary,
    })
}

pub fn run(options: &RunOptions) -> anyhow::Result<RunOutcome> {
    let clock = MonotonicClock::new();

    info!("Configuration file: {}", options.config.display());
    info!("Port: {}", options.port);

    info!("Loading config file ...");
    let robot_config = load_config(&options.config)?.into_single_robot()?;
    robot_config.check_actuator(options.actuator)?;

    info!("Creating robot ...");
    let robot = SimulatedRobot::from_config(&robot_config);
    info!(
        "Robot \"{}\": {} actuator(s), sampling actuator {}",
        robot.name(),
        robot.number_of_actuators(),
        options.actuator
    );

    info!("Creating port ...");
    let mut port = SimulatedPort::new(options.port);
    port.attach(robot);

    apply_to_current_thread(options.realtime);
    let pacing = Pacing::new(options.pacing, options.sleep_between_reads);

    let settings = AcquisitionSettings {
        actuator: options.actuator,
        iterations: options.iterations,
    };
    let (buffer, report) = acquire(port, clock, pacing, settings, &mut io::stdout().lock())?;

    persist(&buffer, report, options)
}
