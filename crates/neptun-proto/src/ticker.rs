use std::time::{Duration, Instant};

/// Accumulating interval ticker driving a peer's send rate.
///
/// A zero interval means "fire on every call", which is how an unlimited
/// send rate is represented. Elapsed time carries over between calls so a
/// driver ticking faster than the interval still observes the configured
/// rate on average.
#[derive(Debug)]
pub struct Ticker {
    last_known_now: Instant,
    tick_interval: Duration,
    time_since_last_tick: Duration,
}

impl Ticker {
    pub fn new(now: Instant, tick_interval: Duration) -> Self {
        Self {
            last_known_now: now,
            tick_interval,
            // The first call fires immediately.
            time_since_last_tick: tick_interval,
        }
    }

    pub fn set_tick_interval(&mut self, tick_interval: Duration) {
        self.tick_interval = tick_interval;
    }

    pub fn clear_tick_interval(&mut self) {
        self.tick_interval = Duration::ZERO;
    }

    pub fn tick(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_known_now);
        self.time_since_last_tick += elapsed;
        self.last_known_now = now;

        if self.time_since_last_tick >= self.tick_interval {
            self.time_since_last_tick -= self.tick_interval;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_fires_every_call() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, Duration::ZERO);
        for ms in 0..5 {
            assert!(ticker.tick(start + Duration::from_millis(ms)));
        }
    }

    #[test]
    fn fires_at_interval_boundaries() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, Duration::from_millis(10));

        // Initial credit fires the first call.
        assert!(ticker.tick(start));
        assert!(!ticker.tick(start + Duration::from_millis(4)));
        assert!(!ticker.tick(start + Duration::from_millis(9)));
        assert!(ticker.tick(start + Duration::from_millis(10)));
        assert!(!ticker.tick(start + Duration::from_millis(15)));
        assert!(ticker.tick(start + Duration::from_millis(20)));
    }

    #[test]
    fn accumulates_fractional_progress() {
        let start = Instant::now();
        let mut ticker = Ticker::new(start, Duration::from_millis(3));
        assert!(ticker.tick(start));

        let mut fires = 0;
        for ms in 1..=30 {
            if ticker.tick(start + Duration::from_millis(ms)) {
                fires += 1;
            }
        }
        assert_eq!(fires, 10);
    }
}
