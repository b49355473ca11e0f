//! sample_buffer.rs
//! Fixed-capacity trace storage for one acquisition run.
//! - every slot is allocated up front; writes never allocate
//! - the boxed slice cannot grow, so no reallocation is possible once the loop starts

use crate::error::SampleBufferError;

/// One record per iteration of the acquisition loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub iteration: usize,
    /// Host timestamp (seconds).
    pub cpu_time: f64,
    /// Device time elapsed since the previous device tick (seconds).
    pub actuator_elapsed: f64,
    /// Host time minus cumulative device time (seconds).
    pub drift_time: f64,
    pub encoder_position: f64,
    pub velocity_fpga_raw: f64,
    pub velocity_fpga_low_res: f64,
    pub velocity_software_embedded: f64,
    pub velocity_finite_diff_device_time: f64,
    pub velocity_finite_diff_host_time: f64,
    pub latched: bool,
    pub raw_quadlet_fpga: u32,
    pub raw_quadlet_fpga_low_res: u32,
}

/// Preallocated storage for exactly `capacity` samples, indexed in chronological order.
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Box<[Sample]>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Result<Self, SampleBufferError> {
        if capacity == 0 {
            return Err(SampleBufferError::InvalidCapacity);
        }
        Ok(Self {
            samples: vec![Sample::default(); capacity].into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Stores `sample` in slot `index`. Copies into an existing slot, never allocates.
    #[inline]
    pub fn write(&mut self, index: usize, sample: Sample) -> Result<(), SampleBufferError> {
        let capacity = self.samples.len();
        match self.samples.get_mut(index) {
            Some(slot) => {
                *slot = sample;
                Ok(())
            }
            None => Err(SampleBufferError::IndexOutOfRange { index, capacity }),
        }
    }

    /// Full ordered trace, read-only.
    pub fn snapshot(&self) -> &[Sample] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(SampleBuffer::new(0).unwrap_err(), SampleBufferError::InvalidCapacity);
    }

    #[test]
    fn writes_land_in_their_slot() {
        let mut buffer = SampleBuffer::new(4).unwrap();
        let sample = Sample {
            iteration: 2,
            encoder_position: 1.5,
            latched: true,
            ..Sample::default()
        };
        buffer.write(2, sample).unwrap();

        let trace = buffer.snapshot();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace[2], sample);
        assert_eq!(trace[1], Sample::default());
    }

    #[test]
    fn write_past_capacity_is_refused() {
        let mut buffer = SampleBuffer::new(3).unwrap();
        let err = buffer.write(3, Sample::default()).unwrap_err();
        assert_eq!(err, SampleBufferError::IndexOutOfRange { index: 3, capacity: 3 });
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    fn storage_does_not_move_on_write() {
        let mut buffer = SampleBuffer::new(16).unwrap();
        let before = buffer.snapshot().as_ptr();
        for i in 0..16 {
            buffer.write(i, Sample { iteration: i, ..Sample::default() }).unwrap();
        }
        assert_eq!(before, buffer.snapshot().as_ptr());
    }
}
