//! Session timing
//!
//! A monotonic clock for stamping measurements and a pacer that holds the
//! focus loop to a fixed iteration interval.

use std::time::{Duration, Instant};

/// Monotonic clock measuring seconds since the session started
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    /// Create a clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Create a clock from an existing start instant
    ///
    /// Use this to share the same timebase between components.
    pub fn from_instant(start: Instant) -> Self {
        Self { start }
    }

    /// Seconds elapsed since the clock started
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Seconds between the clock start and `instant`
    ///
    /// Instants before the start map to zero.
    #[inline]
    pub fn secs_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.start).as_secs_f64()
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-interval loop pacing.
///
/// [`Pacer::wait`] sleeps for whatever is left of the interval since the
/// previous call. A late iteration is not made up for; the next one simply
/// starts late.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the current interval, zero on the first call
    pub fn remaining(&self) -> Duration {
        match self.last {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleep out the rest of the interval and start the next one
    pub fn wait(&mut self) -> Duration {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.last = Some(Instant::now());
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_monotonic() {
        let clock = SessionClock::new();
        let a = clock.elapsed_secs();
        let b = clock.elapsed_secs();
        assert!(b >= a);
        assert_eq!(clock.secs_at(clock.start_instant()), 0.0);
    }

    #[test]
    fn test_pacer_first_wait_is_immediate() {
        let mut pacer = Pacer::from_millis(50);
        assert_eq!(pacer.wait(), Duration::ZERO);
    }

    #[test]
    fn test_pacer_holds_interval() {
        let mut pacer = Pacer::from_millis(20);
        pacer.wait();
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_zero_interval_never_sleeps() {
        let mut pacer = Pacer::new(Duration::ZERO);
        pacer.wait();
        assert_eq!(pacer.wait(), Duration::ZERO);
    }
}
