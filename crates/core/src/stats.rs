//! Statistics (C10): a periodic DSPS RX throughput sampler (§4.9).
//!
//! The math is kept as a pure function of an elapsed duration so it can be
//! tested without depending on wall-clock time; [`crate::session::PeerSession`]
//! is the one place that owns a real timer and feeds it real durations.

use std::time::Duration;

/// Accumulates received bytes between samples and reports a speed once per
/// interval.
pub struct StatsSampler {
    interval: Duration,
    bytes_since_sample: u64,
    elapsed_since_sample: Duration,
}

impl StatsSampler {
    /// Builds a sampler that reports every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            bytes_since_sample: 0,
            elapsed_since_sample: Duration::ZERO,
        }
    }

    /// The configured sampling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Records `bytes` received just now.
    pub fn record_bytes(&mut self, bytes: u64) {
        self.bytes_since_sample += bytes;
    }

    /// Advances the sampler's clock by `tick`, the time since the previous
    /// call. Returns `Some(speed_bytes_per_sec)` once `tick` accumulation
    /// crosses the configured interval, resetting the accumulator; the
    /// speed is computed over the actual elapsed time, not the nominal
    /// interval, so a late timer tick still reports an accurate rate.
    pub fn advance(&mut self, tick: Duration) -> Option<f64> {
        self.elapsed_since_sample += tick;
        if self.elapsed_since_sample < self.interval {
            return None;
        }
        let seconds = self.elapsed_since_sample.as_secs_f64();
        let speed = if seconds > 0.0 { self.bytes_since_sample as f64 / seconds } else { 0.0 };
        self.bytes_since_sample = 0;
        self.elapsed_since_sample = Duration::ZERO;
        Some(speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_nothing_before_the_interval_elapses() {
        let mut sampler = StatsSampler::new(Duration::from_millis(1000));
        sampler.record_bytes(500);
        assert_eq!(sampler.advance(Duration::from_millis(400)), None);
    }

    #[test]
    fn reports_speed_once_interval_crossed() {
        let mut sampler = StatsSampler::new(Duration::from_millis(1000));
        sampler.record_bytes(2000);
        let speed = sampler.advance(Duration::from_millis(1000)).unwrap();
        assert!((speed - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn accumulator_resets_after_reporting() {
        let mut sampler = StatsSampler::new(Duration::from_millis(500));
        sampler.record_bytes(1000);
        let first = sampler.advance(Duration::from_millis(500)).unwrap();
        assert!((first - 2000.0).abs() < 1e-6);

        sampler.record_bytes(250);
        assert_eq!(sampler.advance(Duration::from_millis(100)), None);
    }

    #[test]
    fn zero_bytes_reports_zero_speed() {
        let mut sampler = StatsSampler::new(Duration::from_millis(200));
        let speed = sampler.advance(Duration::from_millis(200)).unwrap();
        assert_eq!(speed, 0.0);
    }

    #[test]
    fn late_tick_uses_actual_elapsed_time() {
        let mut sampler = StatsSampler::new(Duration::from_millis(1000));
        sampler.record_bytes(3000);
        let speed = sampler.advance(Duration::from_millis(1500)).unwrap();
        assert!((speed - 2000.0).abs() < 1e-6);
    }
}
