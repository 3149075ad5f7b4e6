//! Traffic counter sources
//!
//! A traffic source reads the cumulative byte counters of the physical network
//! interfaces and sums them into a single pair. The sampler only ever talks to
//! the `TrafficSource` trait, so the concrete backend is chosen once at
//! configuration time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Cumulative byte counters summed across every counted interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficCounters {
    /// Total bytes received since the interfaces came up
    pub rx_bytes: u64,
    /// Total bytes transmitted since the interfaces came up
    pub tx_bytes: u64,
}

impl TrafficCounters {
    pub fn new(rx_bytes: u64, tx_bytes: u64) -> Self {
        Self { rx_bytes, tx_bytes }
    }

    /// Adds another interface's counters, saturating instead of wrapping
    pub fn accumulate(&mut self, rx_bytes: u64, tx_bytes: u64) {
        self.rx_bytes = self.rx_bytes.saturating_add(rx_bytes);
        self.tx_bytes = self.tx_bytes.saturating_add(tx_bytes);
    }
}

/// Failures a traffic source can report
///
/// None of these are fatal to the sampler; a failed read becomes a zero-delta tick.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backend cannot be used on this system (missing table, no permission, unsupported OS)
    #[error("traffic source '{source_name}' unavailable: {reason}")]
    Unavailable {
        source_name: &'static str,
        reason: String,
    },

    /// The kernel counter table could not be read
    #[error("failed to read counter table {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the counter table did not have the expected shape
    #[error("malformed counter line {line_number} in {}: {detail}", .path.display())]
    Parse {
        path: PathBuf,
        line_number: usize,
        detail: String,
    },

    /// The blocking refresh task panicked or was cancelled
    #[error("counter refresh task failed: {0}")]
    Task(String),
}

/// A backend able to report cumulative traffic counters
#[async_trait]
pub trait TrafficSource: Send + Sync {
    /// Short identifier used in logs and CLI output
    fn name(&self) -> &'static str;

    /// Reads the current cumulative counters of all counted interfaces
    async fn read_counters(&self) -> Result<TrafficCounters, SourceError>;

    /// Changes whenever the set of counted interfaces or the backend changes
    ///
    /// Counters read under different generations are not comparable.
    fn generation(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_saturates() {
        let mut counters = TrafficCounters::new(u64::MAX - 10, 5);
        counters.accumulate(100, 7);
        assert_eq!(counters.rx_bytes, u64::MAX);
        assert_eq!(counters.tx_bytes, 12);
    }

    #[test]
    fn test_error_messages_name_the_source() {
        let err = SourceError::Unavailable {
            source_name: "privileged",
            reason: "not linux".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "traffic source 'privileged' unavailable: not linux"
        );
    }
}
