//! Error taxonomy for a trace run.
//!
//! - `ConfigError`: fatal, raised before any buffer is allocated.
//! - `BusError`: the transient read failure; consumed by the acquisition loop, never propagated past an iteration.
//! - `SampleBufferError`, `AcquisitionError`, `ExportError`: programming or I/O faults surfaced to `main`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't find file \"{0}\"")]
    NotFound(PathBuf),

    #[error("failed to read configuration file \"{path}\": {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration file \"{path}\": {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("the config file doesn't define a robot")]
    NoRobot,

    #[error("the config file defines more than one robot ({0} found)")]
    MultipleRobots(usize),

    #[error("robot \"{0}\" doesn't define any actuator")]
    NoActuator(String),

    #[error("actuator index {index} out of range, robot \"{robot}\" has {count} actuator(s)")]
    ActuatorOutOfRange {
        robot: String,
        index: usize,
        count: usize,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

/// Bus read fault. Recoverable: the next scheduled read is the implicit retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("no robot attached to port {0}")]
    NoRobot(u32),

    #[error("read failed on port {port}: {reason}")]
    ReadFailed { port: u32, reason: &'static str },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SampleBufferError {
    #[error("sample buffer capacity must be greater than zero")]
    InvalidCapacity,

    #[error("sample index {index} out of range for capacity {capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Buffer(#[from] SampleBufferError),

    #[error("no robot attached to the bus")]
    NoRobotAttached,

    #[error("actuator index {index} out of range, robot has {count} actuator(s)")]
    ActuatorOutOfRange { index: usize, count: usize },

    #[error("acquisition already started")]
    AlreadyStarted,

    #[error("acquisition not finished, {remaining} iteration(s) left")]
    NotFinished { remaining: usize },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("plot error: {0}")]
    Plot(String),
}
