//! pacing.rs
//! Inter-sample delay. Blocks for the configured delay only; time spent reading and
//! computing the sample is not subtracted, so the real period is `delay + work`.

use clap::ValueEnum;
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{thread, time::Duration};

/// Opaque blocking primitive called once at the end of every iteration.
pub trait Pacer {
    fn pace(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PacingStrategy {
    /// OS sleep for the bulk, spin for the last 100 µs.
    #[default]
    Spin,
    /// Plain `thread::sleep`, subject to scheduler granularity.
    Os,
}

pub enum Pacing {
    Spin { sleeper: SpinSleeper, delay: Duration },
    Os { delay: Duration },
}

impl Pacing {
    pub fn new(strategy: PacingStrategy, delay: Duration) -> Self {
        match strategy {
            PacingStrategy::Spin => Pacing::Spin {
                sleeper: SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread),
                delay,
            },
            PacingStrategy::Os => Pacing::Os { delay },
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Pacing::Spin { delay, .. } | Pacing::Os { delay } => *delay,
        }
    }
}

impl Pacer for Pacing {
    #[inline]
    fn pace(&mut self) {
        match self {
            Pacing::Spin { sleeper, delay } => {
                if !delay.is_zero() {
                    sleeper.sleep(*delay);
                }
            }
            Pacing::Os { delay } => {
                if !delay.is_zero() {
                    thread::sleep(*delay);
                }
            }
        }
    }
}
