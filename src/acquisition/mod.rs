// Acquisition core: fixed-length sampling of one actuator.
// Preallocated trace buffer, host/device clock reconciliation,
// finite-difference velocities, progress and pacing.

pub mod sample_buffer;
pub mod clock_sync;
pub mod progress;
pub mod pacing;
pub mod acquisition_loop;
