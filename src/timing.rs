use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;

/// Fixed-rate pacing for the simulator's led readout refresh.
pub struct Timing {
    refresh_rate: u64,
    last_refresh: Instant,
    sleeper: SpinSleeper,
}

impl Timing {
    pub fn new(refresh_rate: u64) -> Self {
        Self {
            refresh_rate,
            last_refresh: Instant::now(),
            sleeper: SpinSleeper::default(),
        }
    }

    pub fn should_refresh(&self) -> bool {
        self.calc_next_refresh() == 0
    }

    pub fn mark_refresh(&mut self) {
        self.last_refresh = Instant::now();
    }

    pub fn try_sleep(&self) {
        let sleep_for = self.calc_next_refresh();
        if sleep_for > 0 {
            // accounts for platform dependent sleep resolution
            self.sleeper.sleep(Duration::from_millis(sleep_for));
        }
    }

    fn calc_next_refresh(&self) -> u64 {
        calc_next_timeout(&self.last_refresh, 1000 / self.refresh_rate)
    }
}

#[inline]
fn calc_next_timeout(last: &Instant, timeout: u64) -> u64 {
    let elapsed = last.elapsed().as_millis() as u64;
    if timeout > elapsed {
        timeout - elapsed
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::Timing;
    use std::time::{Duration, Instant};

    #[test]
    fn refresh_cadence_test() {
        let mut timing = Timing::new(1);
        timing.mark_refresh();
        assert!(!timing.should_refresh());

        timing.last_refresh = Instant::now() - Duration::from_millis(1500);
        assert!(timing.should_refresh());
    }
}
