//! # Actuator Velocity Trace
//!
//! Acquires a fixed-length, time-synchronised trace of one actuator over a real-time
//! bus and saves it for offline analysis of the velocity-estimation pipeline.
//!
//! ## Per sample
//! - synchronous bus read, then host timestamp
//! - device clock accumulated and compared to the host clock (drift)
//! - position, three device velocity estimates, latch flag, raw quadlets
//! - two host-side finite-difference velocities (device time and host time)
//!
//! ## Outputs
//! - `data-<timestamp>.csv`: the trace minus its 2000-sample warm-up, 17 significant digits.
//! - `data-<timestamp>.svg`: optional plot of the velocity estimates.

pub mod acquisition;
pub mod app;
pub mod error;
pub mod robot_io;
pub mod utils;
