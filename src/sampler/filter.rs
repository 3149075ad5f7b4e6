use std::time::Duration;

use super::reading::SpeedReading;
use crate::settings::SamplerConfig;

/// Whether `next` differs enough from the last published reading to be published
///
/// A change counts when either direction moves by more than `threshold_bps`,
/// or when either direction crosses the zero boundary (to or from idle).
pub fn is_significant_change(last: &SpeedReading, next: &SpeedReading, threshold_bps: u64) -> bool {
    let moved = last.download_bps.abs_diff(next.download_bps) > threshold_bps
        || last.upload_bps.abs_diff(next.upload_bps) > threshold_bps;

    moved
        || crosses_zero(last.download_bps, next.download_bps)
        || crosses_zero(last.upload_bps, next.upload_bps)
}

fn crosses_zero(last: u64, next: u64) -> bool {
    (last == 0) != (next == 0)
}

/// Tracks how long traffic has stayed below the low-traffic threshold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowTrafficTracker {
    accumulated: Duration,
}

impl LowTrafficTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one tick's worth of time, or resets if the tick was not low
    pub fn record(&mut self, reading: &SpeedReading, elapsed: Duration, threshold_bps: u64) {
        if reading.download_bps < threshold_bps && reading.upload_bps < threshold_bps {
            self.accumulated = self.accumulated.saturating_add(elapsed);
        } else {
            self.accumulated = Duration::ZERO;
        }
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn is_sustained(&self, trigger: Duration) -> bool {
        self.accumulated >= trigger
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
    }
}

/// Start-to-start tick period under the given config
pub fn effective_interval(config: &SamplerConfig, sustained_low_traffic: bool) -> Duration {
    let mut millis = config.base_interval_ms as f64;
    if config.battery_saver {
        millis *= config.battery_saver_multiplier;
    }
    if config.low_traffic_throttle && sustained_low_traffic {
        millis *= config.low_traffic_multiplier;
    }

    // `as` saturates on overflow and maps NaN to zero
    Duration::from_millis(millis.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 5 * 1024;

    #[test]
    fn test_small_changes_are_filtered() {
        let last = SpeedReading::new(100_000, 20_000);
        let next = SpeedReading::new(100_000 + THRESHOLD, 20_000 - THRESHOLD);
        assert!(!is_significant_change(&last, &next, THRESHOLD));
    }

    #[test]
    fn test_large_change_in_either_direction_publishes() {
        let last = SpeedReading::new(100_000, 20_000);
        assert!(is_significant_change(
            &last,
            &SpeedReading::new(100_000 + THRESHOLD + 1, 20_000),
            THRESHOLD
        ));
        assert!(is_significant_change(
            &last,
            &SpeedReading::new(100_000, 20_000 + THRESHOLD + 1),
            THRESHOLD
        ));
        assert!(is_significant_change(
            &last,
            &SpeedReading::new(100_000 - THRESHOLD - 1, 20_000),
            THRESHOLD
        ));
    }

    #[test]
    fn test_zero_crossing_publishes_both_ways() {
        let idle = SpeedReading::ZERO;
        let trickle = SpeedReading::new(12, 0);
        assert!(is_significant_change(&trickle, &idle, THRESHOLD));
        assert!(is_significant_change(&idle, &trickle, THRESHOLD));

        // Upload going idle while download stays busy still counts
        let busy = SpeedReading::new(50_000, 300);
        let upload_idle = SpeedReading::new(50_000, 0);
        assert!(is_significant_change(&busy, &upload_idle, THRESHOLD));
    }

    #[test]
    fn test_identical_zero_readings_are_filtered() {
        assert!(!is_significant_change(
            &SpeedReading::ZERO,
            &SpeedReading::ZERO,
            THRESHOLD
        ));
    }

    #[test]
    fn test_low_traffic_accumulates_and_resets() {
        let mut tracker = LowTrafficTracker::new();
        let quiet = SpeedReading::new(100, 100);
        let trigger = Duration::from_secs(3);

        tracker.record(&quiet, Duration::from_secs(1), 1024);
        tracker.record(&quiet, Duration::from_secs(1), 1024);
        assert!(!tracker.is_sustained(trigger));
        tracker.record(&quiet, Duration::from_secs(1), 1024);
        assert!(tracker.is_sustained(trigger));

        tracker.record(&SpeedReading::new(100, 1024), Duration::from_secs(1), 1024);
        assert_eq!(tracker.accumulated(), Duration::ZERO);
        assert!(!tracker.is_sustained(trigger));
    }

    #[test]
    fn test_effective_interval_multipliers() {
        let mut config = SamplerConfig {
            base_interval_ms: 1000,
            battery_saver_multiplier: 2.0,
            low_traffic_multiplier: 1.5,
            ..SamplerConfig::default()
        };

        config.battery_saver = false;
        assert_eq!(effective_interval(&config, false), Duration::from_millis(1000));
        assert_eq!(effective_interval(&config, true), Duration::from_millis(1500));

        config.battery_saver = true;
        assert_eq!(effective_interval(&config, false), Duration::from_millis(2000));
        assert_eq!(effective_interval(&config, true), Duration::from_millis(3000));

        config.low_traffic_throttle = false;
        assert_eq!(effective_interval(&config, true), Duration::from_millis(2000));
    }
}
