//! Coarse progress reporting: one tick each time the counter reaches `N / 100`.
//! Runs shorter than 100 iterations have a zero period and never tick.

#[derive(Debug, Clone)]
pub struct Progress {
    period: usize,
    counter: usize,
    ticks: usize,
}

impl Progress {
    pub fn new(iterations: usize) -> Self {
        Self {
            period: iterations / 100,
            counter: 0,
            ticks: 0,
        }
    }

    /// Counts one iteration; returns true when a tick is due.
    #[inline]
    pub fn advance(&mut self) -> bool {
        self.counter += 1;
        if self.counter == self.period {
            self.counter = 0;
            self.ticks += 1;
            true
        } else {
            false
        }
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }
}
