//! Per-tick sampling state
//!
//! `SamplerCore` holds everything one polling loop carries between ticks and
//! is driven with explicit instants, so the whole cadence can be exercised
//! without a runtime or a real traffic source.

use std::time::Duration;
use tokio::time::Instant;

use super::filter::{LowTrafficTracker, effective_interval, is_significant_change};
use super::reading::{SpeedReading, TrafficSample, compute_rate};
use crate::settings::SamplerConfig;

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The rate computed this tick, if one could be computed
    pub reading: Option<SpeedReading>,
    /// Whether `reading` passed the change filter and should be published
    pub publish: bool,
}

impl TickOutcome {
    const NOTHING: TickOutcome = TickOutcome {
        reading: None,
        publish: false,
    };

    /// The reading to publish, if any
    pub fn published(&self) -> Option<SpeedReading> {
        self.reading.filter(|_| self.publish)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SamplerCore {
    baseline: Option<TrafficSample>,
    last_emitted: SpeedReading,
    last_tick_at: Option<Instant>,
    low_traffic: LowTrafficTracker,
    ticks: u64,
}

impl SamplerCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Period to wait, start to start, before the next tick
    pub fn interval(&self, config: &SamplerConfig) -> Duration {
        let trigger = Duration::from_millis(config.low_traffic_trigger_ms);
        effective_interval(config, self.low_traffic.is_sustained(trigger))
    }

    pub fn last_emitted(&self) -> SpeedReading {
        self.last_emitted
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Forgets the baseline; the next good read only re-establishes it
    pub fn rebaseline(&mut self) {
        self.baseline = None;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn low_traffic_for(&self) -> Duration {
        self.low_traffic.accumulated()
    }

    /// Advances the state by one tick
    ///
    /// `sample` is `None` when the counter read failed; that tick reads as
    /// zero traffic and the baseline is kept so the next good read averages
    /// over the gap.
    pub fn tick(
        &mut self,
        sample: Option<TrafficSample>,
        now: Instant,
        config: &SamplerConfig,
    ) -> TickOutcome {
        self.ticks += 1;
        let since_last_tick = self
            .last_tick_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        self.last_tick_at = Some(now);

        if !config.low_traffic_throttle {
            self.low_traffic.reset();
        }

        let reading = match sample {
            None => SpeedReading::ZERO,
            Some(current) => {
                let computed = self
                    .baseline
                    .as_ref()
                    .and_then(|previous| compute_rate(previous, &current));
                self.baseline = Some(current);
                match computed {
                    Some(reading) => reading,
                    // First tick after start, or the clock did not advance
                    None => return TickOutcome::NOTHING,
                }
            }
        };

        if config.low_traffic_throttle {
            self.low_traffic.record(
                &reading,
                since_last_tick,
                config.low_traffic_threshold_bps,
            );
        }

        let publish =
            is_significant_change(&self.last_emitted, &reading, config.change_threshold_bps);
        if publish {
            self.last_emitted = reading;
        }

        TickOutcome {
            reading: Some(reading),
            publish,
        }
    }
}
