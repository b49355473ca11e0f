//! configuration.rs
//! Robot/bus configuration file (JSON).
//! - one port may describe several robots, a trace run accepts exactly one
//! - simulation parameters are optional; every field has a default

use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct PortConfiguration {
    #[serde(default)]
    pub robots: Vec<RobotConfiguration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotConfiguration {
    pub name: String,
    #[serde(default)]
    pub actuators: Vec<ActuatorConfiguration>,
    #[serde(default)]
    pub simulation: SimulationConfiguration,
}

/// Encoder scaling plus the motion profile the simulated actuator follows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActuatorConfiguration {
    /// Encoder counts per position unit.
    pub encoder_counts_per_unit: f64,
    /// Half-width of the uniform potentiometer noise (position units).
    pub pot_noise: f64,
    /// Absolute position at power-up, as seen by the potentiometer.
    pub initial_position: f64,
    pub amplitude: f64,
    pub frequency_hz: f64,
}

impl Default for ActuatorConfiguration {
    fn default() -> Self {
        Self {
            encoder_counts_per_unit: 4_000.0,
            pot_noise: 0.005,
            initial_position: 0.0,
            amplitude: 0.5,
            frequency_hz: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfiguration {
    /// Device clock used for time stamps and high resolution velocity periods.
    pub clock_hz: f64,
    /// Divider applied to `clock_hz` for the low resolution velocity.
    pub low_res_divider: u32,
    /// Device clock error relative to the host clock (parts per million).
    pub clock_skew_ppm: f64,
    pub read_failure_probability: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        Self {
            clock_hz: 49_152_000.0,
            low_res_divider: 256,
            clock_skew_ppm: 0.0,
            read_failure_probability: 0.0,
            seed: None,
        }
    }
}

/// Reads and parses the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<PortConfiguration, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl PortConfiguration {
    /// The one robot of this port; zero or several robots is a fatal configuration error.
    pub fn into_single_robot(self) -> Result<RobotConfiguration, ConfigError> {
        let count = self.robots.len();
        let mut robots = self.robots.into_iter();
        match (robots.next(), count) {
            (None, _) => Err(ConfigError::NoRobot),
            (Some(robot), 1) => {
                robot.validate()?;
                Ok(robot)
            }
            (Some(_), n) => Err(ConfigError::MultipleRobots(n)),
        }
    }
}

impl RobotConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.actuators.is_empty() {
            return Err(ConfigError::NoActuator(self.name.clone()));
        }
        if self
            .actuators
            .iter()
            .any(|a| !(a.encoder_counts_per_unit.is_finite() && a.encoder_counts_per_unit > 0.0))
        {
            return Err(ConfigError::InvalidValue {
                field: "encoder_counts_per_unit",
                reason: "must be a positive number",
            });
        }
        if self.actuators.iter().any(|a| !(a.pot_noise >= 0.0)) {
            return Err(ConfigError::InvalidValue {
                field: "pot_noise",
                reason: "must not be negative",
            });
        }

        let sim = &self.simulation;
        if !(sim.clock_hz.is_finite() && sim.clock_hz > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "clock_hz",
                reason: "must be a positive number",
            });
        }
        // At -1e6 ppm or below the device clock stands still or runs backwards.
        if !(sim.clock_skew_ppm.is_finite() && sim.clock_skew_ppm > -1e6) {
            return Err(ConfigError::InvalidValue {
                field: "clock_skew_ppm",
                reason: "must be finite and greater than -1e6",
            });
        }
        if sim.low_res_divider == 0 {
            return Err(ConfigError::InvalidValue {
                field: "low_res_divider",
                reason: "must be at least 1",
            });
        }
        if !(0.0..=1.0).contains(&sim.read_failure_probability) {
            return Err(ConfigError::InvalidValue {
                field: "read_failure_probability",
                reason: "must be within [0, 1]",
            });
        }
        Ok(())
    }

    pub fn check_actuator(&self, index: usize) -> Result<(), ConfigError> {
        if index >= self.actuators.len() {
            return Err(ConfigError::ActuatorOutOfRange {
                robot: self.name.clone(),
                index,
                count: self.actuators.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(json: &str) -> PortConfiguration {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ robots: ").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = parse(r#"{ "robots": [ { "name": "MTMR", "actuators": [ {}, { "amplitude": 2.0 } ] } ] }"#);
        let robot = config.into_single_robot().unwrap();
        assert_eq!(robot.name, "MTMR");
        assert_eq!(robot.actuators.len(), 2);
        assert_eq!(robot.actuators[1].amplitude, 2.0);
        assert_eq!(robot.actuators[1].encoder_counts_per_unit, 4_000.0);
        assert_eq!(robot.simulation.low_res_divider, 256);
        assert!(robot.simulation.seed.is_none());
    }

    #[test]
    fn zero_robots_is_fatal() {
        let err = parse(r#"{ "robots": [] }"#).into_single_robot().unwrap_err();
        assert!(matches!(err, ConfigError::NoRobot));
        let err = parse("{}").into_single_robot().unwrap_err();
        assert!(matches!(err, ConfigError::NoRobot));
    }

    #[test]
    fn several_robots_is_fatal() {
        let err = parse(
            r#"{ "robots": [ { "name": "PSM1", "actuators": [{}] }, { "name": "PSM2", "actuators": [{}] } ] }"#,
        )
        .into_single_robot()
        .unwrap_err();
        assert!(matches!(err, ConfigError::MultipleRobots(2)));
    }

    #[test]
    fn robot_without_actuators_is_fatal() {
        let err = parse(r#"{ "robots": [ { "name": "ECM" } ] }"#).into_single_robot().unwrap_err();
        assert!(matches!(err, ConfigError::NoActuator(name) if name == "ECM"));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let err = parse(
            r#"{ "robots": [ { "name": "PSM1", "actuators": [{}], "simulation": { "read_failure_probability": 1.5 } } ] }"#,
        )
        .into_single_robot()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "read_failure_probability", .. }));
    }

    #[test]
    fn device_clock_must_run_forward() {
        for skew in ["-1000000.0", "-2000000.0"] {
            let json = format!(
                r#"{{ "robots": [ {{ "name": "PSM1", "actuators": [{{}}], "simulation": {{ "clock_skew_ppm": {} }} }} ] }}"#,
                skew
            );
            let err = parse(&json).into_single_robot().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { field: "clock_skew_ppm", .. }));
        }

        let robot = parse(
            r#"{ "robots": [ { "name": "PSM1", "actuators": [{}], "simulation": { "clock_skew_ppm": -999999.0 } } ] }"#,
        )
        .into_single_robot();
        assert!(robot.is_ok());
    }

    #[test]
    fn actuator_index_is_checked() {
        let robot = parse(r#"{ "robots": [ { "name": "PSM1", "actuators": [{}, {}] } ] }"#)
            .into_single_robot()
            .unwrap();
        assert!(robot.check_actuator(1).is_ok());
        let err = robot.check_actuator(2).unwrap_err();
        assert!(matches!(err, ConfigError::ActuatorOutOfRange { index: 2, count: 2, .. }));
    }
}
