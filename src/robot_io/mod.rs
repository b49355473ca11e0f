//! Robot I/O: the bus and robot collaborators consumed by the acquisition loop.
//!
//! A `Bus` owns exactly one attached `Robot`. `Bus::read` refreshes every register of
//! the robot in one synchronous transaction; `Robot::actuator` then exposes the values
//! of the most recent successful read (stale ones if the last read failed).

pub mod configuration;
pub mod simulated;

use crate::error::BusError;
use std::time::Instant;

/// Per-actuator registers after a bus read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActuatorFeedback {
    /// Device time since the previous device tick (seconds).
    pub time_stamp: f64,
    pub encoder_position: f64,
    pub encoder_velocity: f64,
    pub encoder_velocity_low_res: f64,
    pub encoder_velocity_software: f64,
    pub encoder_velocity_latched: bool,
    pub encoder_velocity_raw: u32,
    pub encoder_velocity_low_res_raw: u32,
}

pub trait Robot {
    fn name(&self) -> &str;

    fn number_of_actuators(&self) -> usize;

    /// Preloads encoder offsets from the potentiometers. Called once, before acquisition.
    fn calibrate_encoder_offsets_from_pots(&mut self);

    /// `None` if `index` is not a valid actuator.
    fn actuator(&self, index: usize) -> Option<ActuatorFeedback>;
}

pub trait Bus {
    type Robot: Robot;

    fn port(&self) -> u32;

    fn attach(&mut self, robot: Self::Robot);

    /// Synchronous, blocking refresh of all registers of the attached robot.
    fn read(&mut self) -> Result<(), BusError>;

    fn robot(&self) -> Option<&Self::Robot>;

    fn robot_mut(&mut self) -> Option<&mut Self::Robot>;
}

/// Host timebase, in seconds relative to the clock's own origin.
pub trait HostClock {
    fn now_secs(&self) -> f64;
}

/// `Instant`-based host clock; its origin is the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for MonotonicClock {
    #[inline]
    fn now_secs(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let mut last = clock.now_secs();
        assert!(last >= 0.0);
        for _ in 0..1_000 {
            let now = clock.now_secs();
            assert!(now >= last);
            last = now;
        }
    }
}
