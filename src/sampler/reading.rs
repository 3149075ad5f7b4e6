use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tokio::time::Instant;

use crate::collectors::TrafficCounters;

/// Cumulative counters together with the instant they were read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficSample {
    pub counters: TrafficCounters,
    pub taken_at: Instant,
}

impl TrafficSample {
    pub fn new(counters: TrafficCounters, taken_at: Instant) -> Self {
        Self { counters, taken_at }
    }
}

/// Download and upload rates in bytes per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct SpeedReading {
    pub download_bps: u64,
    pub upload_bps: u64,
}

impl SpeedReading {
    pub const ZERO: SpeedReading = SpeedReading {
        download_bps: 0,
        upload_bps: 0,
    };

    pub fn new(download_bps: u64, upload_bps: u64) -> Self {
        Self {
            download_bps,
            upload_bps,
        }
    }

    pub fn total_bps(&self) -> u64 {
        self.download_bps.saturating_add(self.upload_bps)
    }

    pub fn is_zero(&self) -> bool {
        self.download_bps == 0 && self.upload_bps == 0
    }
}

// The derived total is part of the serialized form so JSON consumers don't recompute it
impl Serialize for SpeedReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SpeedReading", 3)?;
        state.serialize_field("download_bps", &self.download_bps)?;
        state.serialize_field("upload_bps", &self.upload_bps)?;
        state.serialize_field("total_bps", &self.total_bps())?;
        state.end()
    }
}

/// Computes the rate between two consecutive samples
///
/// Returns `None` when the samples are not usable as a pair: the current one
/// is not strictly later than the previous one at millisecond resolution.
/// Counters that went backwards (interface reset, wrap) count as zero delta.
pub fn compute_rate(previous: &TrafficSample, current: &TrafficSample) -> Option<SpeedReading> {
    let elapsed_ms = current
        .taken_at
        .checked_duration_since(previous.taken_at)?
        .as_millis();
    if elapsed_ms == 0 {
        return None;
    }

    Some(SpeedReading::new(
        per_second(
            previous.counters.rx_bytes,
            current.counters.rx_bytes,
            elapsed_ms,
        ),
        per_second(
            previous.counters.tx_bytes,
            current.counters.tx_bytes,
            elapsed_ms,
        ),
    ))
}

fn per_second(previous: u64, current: u64, elapsed_ms: u128) -> u64 {
    let delta = u128::from(current.saturating_sub(previous));
    u64::try_from(delta * 1000 / elapsed_ms).unwrap_or(u64::MAX)
}
