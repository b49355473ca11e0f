//! simulated.rs
//! Software stand-in for the real-time bus and its robot.
//! - the device clock runs off host time, scaled by the configured skew and quantised to whole ticks
//! - each actuator follows a sine trajectory quantised to encoder counts
//! - velocities come from encoder edge periods, the way the FPGA measures them
//! - reads fail at random with the configured probability, leaving every register stale

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{f64::consts::TAU, time::Instant};
use log::debug;

use crate::error::BusError;
use crate::robot_io::{
    ActuatorFeedback, Bus, Robot,
    configuration::{ActuatorConfiguration, RobotConfiguration},
};

/// Width of the period counter behind each velocity quadlet.
const PERIOD_COUNTER_BITS: u32 = 22;
const PERIOD_COUNTER_MAX: u32 = (1 << PERIOD_COUNTER_BITS) - 1;
/// Set when the encoder was moving in the negative direction.
const DIRECTION_BIT: u32 = 1 << 31;

#[derive(Debug, Clone)]
struct SimulatedActuator {
    config: ActuatorConfiguration,
    /// Counts since power-up, before calibration offset.
    counts: i64,
    offset_counts: i64,
    last_edge_time: f64,
    /// Device seconds per count between the last two edges; infinite until the first edge.
    edge_period: f64,
    negative: bool,
    feedback: ActuatorFeedback,
}

impl SimulatedActuator {
    fn new(config: ActuatorConfiguration) -> Self {
        Self {
            config,
            counts: 0,
            offset_counts: 0,
            last_edge_time: 0.0,
            edge_period: f64::INFINITY,
            negative: false,
            feedback: ActuatorFeedback {
                encoder_velocity_latched: true,
                ..ActuatorFeedback::default()
            },
        }
    }

    fn true_position(&self, device_time: f64) -> f64 {
        self.config.initial_position
            + self.config.amplitude * (TAU * self.config.frequency_hz * device_time).sin()
    }

    fn position(&self) -> f64 {
        (self.counts + self.offset_counts) as f64 / self.config.encoder_counts_per_unit
    }

    fn refresh(&mut self, device_time: f64, elapsed: f64, clock_hz: f64, low_res_divider: u32) {
        let cpu = self.config.encoder_counts_per_unit;
        let previous_position = self.position();

        let counts = ((self.true_position(device_time) - self.config.initial_position) * cpu).round() as i64;
        let delta = counts - self.counts;
        if delta != 0 {
            self.edge_period = (device_time - self.last_edge_time) / delta.unsigned_abs() as f64;
            self.last_edge_time = device_time;
            self.negative = delta < 0;
            self.counts = counts;
        }

        // Without a new edge the running counter keeps growing past the last period.
        let period = self.edge_period.max(device_time - self.last_edge_time);
        let position = self.position();
        let sign = if self.negative { -1.0 } else { 1.0 };

        let (raw, ticks, saturated) = quadlet(period * clock_hz, self.negative);
        let low_res_hz = clock_hz / low_res_divider as f64;
        let (raw_low_res, ticks_low_res, _) = quadlet(period * low_res_hz, self.negative);

        let fb = &mut self.feedback;
        fb.time_stamp = elapsed;
        fb.encoder_position = position;
        fb.encoder_velocity_latched = saturated;
        fb.encoder_velocity_raw = raw;
        fb.encoder_velocity_low_res_raw = raw_low_res;
        // Latched: hold the last valid estimate.
        if !saturated && ticks > 0 {
            fb.encoder_velocity = sign / cpu / (ticks as f64 / clock_hz);
        }
        if ticks_low_res > 0 && ticks_low_res < PERIOD_COUNTER_MAX {
            fb.encoder_velocity_low_res = sign / cpu / (ticks_low_res as f64 / low_res_hz);
        }
        if elapsed > 0.0 {
            fb.encoder_velocity_software = (position - previous_position) / elapsed;
        }
    }
}

/// Packs a period (in ticks) into a velocity quadlet: direction bit plus saturating tick count.
fn quadlet(period_ticks: f64, negative: bool) -> (u32, u32, bool) {
    let saturated = !(period_ticks < PERIOD_COUNTER_MAX as f64);
    let ticks = if saturated {
        PERIOD_COUNTER_MAX
    } else {
        period_ticks.floor() as u32
    };
    let raw = if negative { ticks | DIRECTION_BIT } else { ticks };
    (raw, ticks, saturated)
}

pub struct SimulatedRobot {
    name: String,
    actuators: Vec<SimulatedActuator>,
    clock_hz: f64,
    low_res_divider: u32,
    skew: f64,
    read_failure_probability: f64,
    device_time: f64,
    last_refresh: Instant,
    rng: StdRng,
}

impl SimulatedRobot {
    pub fn from_config(config: &RobotConfiguration) -> Self {
        let sim = &config.simulation;
        let rng = match sim.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            name: config.name.clone(),
            actuators: config.actuators.iter().cloned().map(SimulatedActuator::new).collect(),
            clock_hz: sim.clock_hz,
            low_res_divider: sim.low_res_divider,
            skew: 1.0 + sim.clock_skew_ppm * 1e-6,
            read_failure_probability: sim.read_failure_probability,
            device_time: 0.0,
            last_refresh: Instant::now(),
            rng,
        }
    }

    /// Latches all registers as of `now`. Returns false on a simulated bus fault, state untouched.
    fn refresh(&mut self, now: Instant) -> bool {
        if self.read_failure_probability > 0.0 && self.rng.random_bool(self.read_failure_probability) {
            return false;
        }

        let host_elapsed = now.saturating_duration_since(self.last_refresh).as_secs_f64();
        self.last_refresh = now;
        let ticks = (host_elapsed * self.skew * self.clock_hz).round();
        let elapsed = ticks / self.clock_hz;
        self.device_time += elapsed;

        for actuator in &mut self.actuators {
            actuator.refresh(self.device_time, elapsed, self.clock_hz, self.low_res_divider);
        }
        true
    }
}

impl Robot for SimulatedRobot {
    fn name(&self) -> &str {
        &self.name
    }

    fn number_of_actuators(&self) -> usize {
        self.actuators.len()
    }

    fn calibrate_encoder_offsets_from_pots(&mut self) {
        let device_time = self.device_time;
        for (index, actuator) in self.actuators.iter_mut().enumerate() {
            let noise = actuator.config.pot_noise;
            let pot = actuator.true_position(device_time) + self.rng.random_range(-noise..=noise);
            let cpu = actuator.config.encoder_counts_per_unit;
            actuator.offset_counts = (pot * cpu).round() as i64 - actuator.counts;
            actuator.feedback.encoder_position = actuator.position();
            debug!("[{}] actuator {} encoder preloaded from pot: {:.6}", self.name, index, pot);
        }
    }

    fn actuator(&self, index: usize) -> Option<ActuatorFeedback> {
        self.actuators.get(index).map(|a| a.feedback)
    }
}

/// Simulated port: owns the attached robot and refreshes it on every read.
pub struct SimulatedPort {
    port: u32,
    robot: Option<SimulatedRobot>,
}

impl SimulatedPort {
    pub fn new(port: u32) -> Self {
        Self { port, robot: None }
    }
}

impl Bus for SimulatedPort {
    type Robot = SimulatedRobot;

    fn port(&self) -> u32 {
        self.port
    }

    fn attach(&mut self, robot: SimulatedRobot) {
        self.robot = Some(robot);
    }

    fn read(&mut self) -> Result<(), BusError> {
        let port = self.port;
        let robot = self.robot.as_mut().ok_or(BusError::NoRobot(port))?;
        if robot.refresh(Instant::now()) {
            Ok(())
        } else {
            Err(BusError::ReadFailed {
                port,
                reason: "simulated bus fault",
            })
        }
    }

    fn robot(&self) -> Option<&SimulatedRobot> {
        self.robot.as_ref()
    }

    fn robot_mut(&mut self) -> Option<&mut SimulatedRobot> {
        self.robot.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot_io::configuration::SimulationConfiguration;
    use std::time::Duration;

    fn robot_config(failure: f64) -> RobotConfiguration {
        RobotConfiguration {
            name: "PSM1".into(),
            actuators: vec![ActuatorConfiguration::default(); 2],
            simulation: SimulationConfiguration {
                read_failure_probability: failure,
                seed: Some(7),
                ..SimulationConfiguration::default()
            },
        }
    }

    #[test]
    fn quadlet_packs_direction_and_saturates() {
        assert_eq!(quadlet(10.7, false), (10, 10, false));
        assert_eq!(quadlet(10.7, true), (10 | DIRECTION_BIT, 10, false));
        assert_eq!(quadlet(1e12, false), (PERIOD_COUNTER_MAX, PERIOD_COUNTER_MAX, true));
        assert!(quadlet(f64::INFINITY, false).2);
    }

    #[test]
    fn read_without_robot_fails() {
        let mut port = SimulatedPort::new(3);
        assert_eq!(port.read(), Err(BusError::NoRobot(3)));
    }

    #[test]
    fn device_time_is_quantised_to_clock_ticks() {
        let config = robot_config(0.0);
        let mut robot = SimulatedRobot::from_config(&config);
        let start = robot.last_refresh;
        assert!(robot.refresh(start + Duration::from_micros(500)));

        let elapsed = robot.actuator(0).unwrap().time_stamp;
        let ticks = elapsed * config.simulation.clock_hz;
        assert!((ticks - ticks.round()).abs() < 1e-6);
        assert!((elapsed - 0.0005).abs() < 1e-7);
    }

    #[test]
    fn failed_read_leaves_registers_stale() {
        let mut robot = SimulatedRobot::from_config(&robot_config(1.0));
        let before = robot.actuator(1).unwrap();
        assert!(!robot.refresh(Instant::now() + Duration::from_millis(3)));
        assert_eq!(robot.actuator(1).unwrap(), before);

        let mut port = SimulatedPort::new(0);
        port.attach(SimulatedRobot::from_config(&robot_config(1.0)));
        assert!(matches!(port.read(), Err(BusError::ReadFailed { port: 0, .. })));
    }

    #[test]
    fn encoder_tracks_trajectory_and_calibration() {
        let mut robot = SimulatedRobot::from_config(&robot_config(0.0));
        let start = robot.last_refresh;
        // quarter period of a 1 Hz sine: position at +amplitude
        assert!(robot.refresh(start + Duration::from_millis(250)));
        let fb = robot.actuator(0).unwrap();
        assert!((fb.encoder_position - 0.5).abs() < 1e-3);

        robot.calibrate_encoder_offsets_from_pots();
        let calibrated = robot.actuator(0).unwrap().encoder_position;
        // power-up position is 0.0 and pot noise is bounded by 0.005
        assert!((calibrated - 0.5).abs() <= 0.005 + 1e-3);
    }

    #[test]
    fn unknown_actuator_is_none() {
        let robot = SimulatedRobot::from_config(&robot_config(0.0));
        assert_eq!(robot.number_of_actuators(), 2);
        assert!(robot.actuator(2).is_none());
        assert!(robot.actuator(0).unwrap().encoder_velocity_latched);
    }
}
