use std::time::Duration;

/// Ring buffer of recent tick durations, measured against the tick period.
#[derive(Debug)]
pub struct TickTimer {
    period: Duration,
    history: Vec<Duration>,
    index: usize,
    filled: bool,
    overruns: u64,
}

impl TickTimer {
    pub fn new(period: Duration, capacity: usize) -> Self {
        Self {
            period,
            history: vec![Duration::ZERO; capacity.max(1)],
            index: 0,
            filled: false,
            overruns: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Record one tick. Returns `true` if it took longer than the period.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.history[self.index] = elapsed;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
        }
        let overran = elapsed > self.period;
        if overran {
            self.overruns += 1;
        }
        overran
    }

    fn recorded(&self) -> &[Duration] {
        if self.filled {
            &self.history
        } else {
            &self.history[..self.index]
        }
    }

    pub fn average(&self) -> Duration {
        let recorded = self.recorded();
        if recorded.is_empty() {
            return Duration::ZERO;
        }
        recorded.iter().sum::<Duration>() / recorded.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.recorded().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.recorded().len()
    }

    /// Ticks that overran since creation, including those rotated out.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}
