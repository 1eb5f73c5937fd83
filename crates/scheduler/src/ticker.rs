//! Scan scheduling strategies.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Interval, MissedTickBehavior};

/// Decides when the next scan runs.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick. `false` ends the schedule.
    async fn tick(&mut self) -> bool;
}

/// Fixed-period ticker. The first tick completes immediately, so a scan runs
/// as soon as the schedule starts.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        // A scan that overruns its period swallows the ticks it missed.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Yields a fixed number of ticks without waiting, then stops.
#[derive(Debug, Clone, Copy)]
pub struct FixedTicks {
    remaining: usize,
}

impl FixedTicks {
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }
}

#[async_trait]
impl Ticker for FixedTicks {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_ticks_stop_after_count() {
        let mut ticker = FixedTicks::new(2);
        assert!(ticker.tick().await);
        assert!(ticker.tick().await);
        assert!(!ticker.tick().await);
        assert!(!ticker.tick().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_first_tick_is_immediate() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(30));
        let start = tokio::time::Instant::now();

        assert!(ticker.tick().await);
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert!(ticker.tick().await);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
