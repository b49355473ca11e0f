//! clock_sync.rs
//! Reconciles the host clock with the device clock, one sample at a time.
//! - device elapsed times are accumulated for the whole run, never reset
//! - drift is the host timestamp minus that running total, so it includes the cold-start offset
//! - also carries the previous position/host time needed by the finite-difference velocities

/// Fixed bias added to every device-time finite difference.
/// Origin unknown. Applied to the device-time estimate only.
pub const DEVICE_TIME_VELOCITY_BIAS: f64 = 0.01;

/// The two host-computed velocity estimates for one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteDifferences {
    /// `(p_i - p_{i-1}) / e_i + DEVICE_TIME_VELOCITY_BIAS`
    pub device_time: f64,
    /// `(p_i - p_{i-1}) / (c_i - c_{i-1})`
    pub host_time: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ClockTracker {
    cumulative_device_time: f64,
    previous_encoder_position: f64,
    previous_cpu_time: f64,
}

impl ClockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the device elapsed time to the running total and returns the drift for this sample.
    #[inline]
    pub fn track(&mut self, actuator_elapsed: f64, cpu_time: f64) -> f64 {
        self.cumulative_device_time += actuator_elapsed;
        cpu_time - self.cumulative_device_time
    }

    /// Finite differences against the previous sample (position and host time start at 0.0).
    /// Zero denominators are left to IEEE semantics: `inf` or `nan`.
    #[inline]
    pub fn finite_differences(
        &self,
        encoder_position: f64,
        actuator_elapsed: f64,
        cpu_time: f64,
    ) -> FiniteDifferences {
        let delta_position = encoder_position - self.previous_encoder_position;
        FiniteDifferences {
            device_time: delta_position / actuator_elapsed + DEVICE_TIME_VELOCITY_BIAS,
            host_time: delta_position / (cpu_time - self.previous_cpu_time),
        }
    }

    /// Makes this sample the "previous" one for the next iteration.
    #[inline]
    pub fn advance(&mut self, encoder_position: f64, cpu_time: f64) {
        self.previous_encoder_position = encoder_position;
        self.previous_cpu_time = cpu_time;
    }

    pub fn cumulative_device_time(&self) -> f64 {
        self.cumulative_device_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_drift_is_cold_start_offset() {
        let mut tracker = ClockTracker::new();
        let drift = tracker.track(0.001, 0.25);
        assert_eq!(drift, 0.25 - 0.001);
        assert_eq!(tracker.cumulative_device_time(), 0.001);
    }

    #[test]
    fn drift_reflects_total_accumulated_skew() {
        let mut tracker = ClockTracker::new();
        let elapsed = [0.0010, 0.0011, 0.0, 0.0009];
        let cpu = [0.0010, 0.0020, 0.0030, 0.0040];
        let mut cumulative = 0.0;
        let mut last_total = 0.0;
        for (e, c) in elapsed.iter().zip(cpu.iter()) {
            let drift = tracker.track(*e, *c);
            cumulative += e;
            assert_eq!(drift, c - cumulative);
            assert!(tracker.cumulative_device_time() >= last_total);
            last_total = tracker.cumulative_device_time();
        }
    }

    #[test]
    fn first_sample_differences_against_zero() {
        let tracker = ClockTracker::new();
        let fd = tracker.finite_differences(2.0, 0.5, 4.0);
        assert_eq!(fd.device_time, 2.0 / 0.5 + DEVICE_TIME_VELOCITY_BIAS);
        assert_eq!(fd.host_time, 0.5);
    }

    #[test]
    fn differences_use_previous_sample_after_advance() {
        let mut tracker = ClockTracker::new();
        tracker.advance(1.0, 10.0);
        let fd = tracker.finite_differences(1.5, 0.25, 10.5);
        assert_eq!(fd.device_time, 0.5 / 0.25 + DEVICE_TIME_VELOCITY_BIAS);
        assert_eq!(fd.host_time, 1.0);
    }

    #[test]
    fn zero_elapsed_time_yields_non_finite_values() {
        let mut tracker = ClockTracker::new();
        tracker.advance(1.0, 3.0);

        let moving = tracker.finite_differences(2.0, 0.0, 3.0);
        assert_eq!(moving.device_time, f64::INFINITY);
        assert_eq!(moving.host_time, f64::INFINITY);

        let still = tracker.finite_differences(1.0, 0.0, 3.0);
        assert!(still.device_time.is_nan());
        assert!(still.host_time.is_nan());
    }
}
