use std::time::{Duration, Instant};

/// A fixed-interval tick schedule.
///
/// Each deadline is exactly one period after the previous one, regardless of
/// when the previous tick was handled. A loop that falls behind sees
/// deadlines already in the past and so ticks back to back until it has
/// caught up: ticks bunch but are never dropped or coalesced.
#[derive(Debug, Clone)]
pub struct Ticker {
    period: Duration,
    next: Instant,
    tick: u64,
}

impl Ticker {
    /// The first tick is due one period after `start`.
    #[must_use]
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
            tick: 0,
        }
    }

    #[must_use]
    pub const fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Consume the due tick, returning its number (starting at 1).
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.next += self.period;
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlines_advance_by_period() {
        let start = Instant::now();
        let period = Duration::from_millis(250);
        let mut ticker = Ticker::new(period, start);
        assert_eq!(start + period, ticker.next_deadline());
        assert_eq!(1, ticker.advance());
        assert_eq!(start + period * 2, ticker.next_deadline());
        assert_eq!(2, ticker.advance());
        assert_eq!(start + period * 3, ticker.next_deadline());
    }

    #[test]
    fn test_late_ticks_are_not_dropped() {
        let period = Duration::from_millis(100);
        let start = Instant::now() - Duration::from_millis(350);
        let mut ticker = Ticker::new(period, start);
        let now = Instant::now();
        let overdue = std::iter::from_fn(|| {
            (ticker.next_deadline() <= now).then(|| ticker.advance())
        })
        .collect::<Vec<_>>();
        assert_eq!(vec![1, 2, 3], overdue);
        assert!(ticker.next_deadline() > now);
    }
}
