//! acquisition_loop.rs
//! Fixed-length acquisition: `Idle → Sampling(0) → … → Sampling(N-1) → Done`.
//!
//! Per iteration, strictly in this order:
//! 1. synchronous bus read (a failure is logged and the iteration continues on stale registers)
//! 2. host timestamp
//! 3. device elapsed time → clock tracker → drift
//! 4. position, device velocities, latch flag and raw quadlets of the configured actuator
//! 5. finite-difference velocities against the previous sample
//! 6. write into the preallocated buffer
//! 7. progress tick
//! 8. pacing delay (not compensated for the time spent in 1-7)
//!
//! Nothing in 1-8 allocates on the success path. No cancellation: the loop always runs N iterations.

use std::io::{self, Write};
use log::{info, warn};

use crate::acquisition::{
    clock_sync::ClockTracker,
    pacing::Pacer,
    progress::Progress,
    sample_buffer::{Sample, SampleBuffer},
};
use crate::error::AcquisitionError;
use crate::robot_io::{Bus, HostClock, Robot};

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionSettings {
    pub actuator: usize,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    /// Next iteration to run.
    Sampling(usize),
    Done,
}

/// What happened during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub iteration: usize,
    pub read_ok: bool,
    pub progress_tick: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub samples: usize,
    pub read_failures: usize,
    pub warmup_read_failed: bool,
    pub progress_ticks: usize,
}

pub struct AcquisitionLoop<B: Bus, C: HostClock, P: Pacer> {
    bus: B,
    clock: C,
    pacer: P,
    actuator: usize,
    buffer: SampleBuffer,
    tracker: ClockTracker,
    progress: Progress,
    state: LoopState,
    report: AcquisitionReport,
}

impl<B: Bus, C: HostClock, P: Pacer> AcquisitionLoop<B, C, P> {
    /// Checks the attached robot and allocates the whole trace buffer.
    pub fn new(bus: B, clock: C, pacer: P, settings: AcquisitionSettings) -> Result<Self, AcquisitionError> {
        let robot = bus.robot().ok_or(AcquisitionError::NoRobotAttached)?;
        let count = robot.number_of_actuators();
        if settings.actuator >= count {
            return Err(AcquisitionError::ActuatorOutOfRange {
                index: settings.actuator,
                count,
            });
        }

        info!("Allocating memory for {} samples.", settings.iterations);
        let buffer = SampleBuffer::new(settings.iterations)?;

        Ok(Self {
            bus,
            clock,
            pacer,
            actuator: settings.actuator,
            buffer,
            tracker: ClockTracker::new(),
            progress: Progress::new(settings.iterations),
            state: LoopState::Idle,
            report: AcquisitionReport::default(),
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Warm-up read (failure tolerated) followed by the one-time encoder calibration.
    pub fn start(&mut self) -> Result<(), AcquisitionError> {
        if self.state != LoopState::Idle {
            return Err(AcquisitionError::AlreadyStarted);
        }

        // make sure there is at least one set of pot values
        if let Err(e) = self.bus.read() {
            warn!("Warm-up read failed: {}", e);
            self.report.warmup_read_failed = true;
        }
        self.bus
            .robot_mut()
            .ok_or(AcquisitionError::NoRobotAttached)?
            .calibrate_encoder_offsets_from_pots();

        info!("Starting data collection.");
        self.state = LoopState::Sampling(0);
        Ok(())
    }

    /// Runs steps 1-7 for the next iteration. Starts the loop if still idle; no-op once done.
    pub fn step(&mut self) -> Result<Option<StepOutcome>, AcquisitionError> {
        let iteration = match self.state {
            LoopState::Idle => {
                self.start()?;
                0
            }
            LoopState::Sampling(i) => i,
            LoopState::Done => return Ok(None),
        };

        let read_ok = match self.bus.read() {
            Ok(()) => true,
            Err(e) => {
                warn!("Iteration {}: {}, keeping previous register values", iteration, e);
                self.report.read_failures += 1;
                false
            }
        };

        let cpu_time = self.clock.now_secs();

        let robot = self.bus.robot().ok_or(AcquisitionError::NoRobotAttached)?;
        let feedback = robot
            .actuator(self.actuator)
            .ok_or_else(|| AcquisitionError::ActuatorOutOfRange {
                index: self.actuator,
                count: robot.number_of_actuators(),
            })?;

        let actuator_elapsed = feedback.time_stamp;
        let drift_time = self.tracker.track(actuator_elapsed, cpu_time);

        let encoder_position = feedback.encoder_position;
        let velocities = self
            .tracker
            .finite_differences(encoder_position, actuator_elapsed, cpu_time);

        self.buffer.write(
            iteration,
            Sample {
                iteration,
                cpu_time,
                actuator_elapsed,
                drift_time,
                encoder_position,
                velocity_fpga_raw: feedback.encoder_velocity,
                velocity_fpga_low_res: feedback.encoder_velocity_low_res,
                velocity_software_embedded: feedback.encoder_velocity_software,
                velocity_finite_diff_device_time: velocities.device_time,
                velocity_finite_diff_host_time: velocities.host_time,
                latched: feedback.encoder_velocity_latched,
                raw_quadlet_fpga: feedback.encoder_velocity_raw,
                raw_quadlet_fpga_low_res: feedback.encoder_velocity_low_res_raw,
            },
        )?;
        self.tracker.advance(encoder_position, cpu_time);

        let progress_tick = self.progress.advance();

        self.report.samples += 1;
        self.state = if iteration + 1 == self.buffer.capacity() {
            LoopState::Done
        } else {
            LoopState::Sampling(iteration + 1)
        };

        Ok(Some(StepOutcome {
            iteration,
            read_ok,
            progress_tick,
        }))
    }

    /// Drives the loop to `Done`: one step, one optional `.` on `progress_out`, one pacing delay.
    /// Progress output failures never stop the loop; only the first one is logged.
    pub fn run<W: Write>(&mut self, progress_out: &mut W) -> Result<AcquisitionReport, AcquisitionError> {
        let mut output_failed = false;
        while let Some(outcome) = self.step()? {
            if outcome.progress_tick {
                emit_progress(progress_out, b".", &mut output_failed);
            }
            self.pacer.pace();
        }
        emit_progress(progress_out, b"\n", &mut output_failed);

        self.report.progress_ticks = self.progress.ticks();
        Ok(self.report)
    }

    /// Hands the completed trace over for export. Only valid once the loop is `Done`.
    pub fn finish(self) -> Result<(SampleBuffer, AcquisitionReport), AcquisitionError> {
        match self.state {
            LoopState::Done => {
                let mut report = self.report;
                report.progress_ticks = self.progress.ticks();
                Ok((self.buffer, report))
            }
            LoopState::Idle => Err(AcquisitionError::NotFinished {
                remaining: self.buffer.capacity(),
            }),
            LoopState::Sampling(i) => Err(AcquisitionError::NotFinished {
                remaining: self.buffer.capacity() - i,
            }),
        }
    }
}

fn emit_progress<W: Write>(out: &mut W, bytes: &[u8], failed: &mut bool) {
    let result: io::Result<()> = out.write_all(bytes).and_then(|()| out.flush());
    if let Err(e) = result {
        if !*failed {
            warn!("Progress output failed, continuing without it: {}", e);
            *failed = true;
        }
    }
}
