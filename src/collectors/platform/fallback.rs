use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::collectors::source::{SourceError, TrafficCounters, TrafficSource};

/// Tries a primary source and falls back to a secondary one on any error
///
/// Used to put the privileged kernel-table reader in front of the portable
/// standard reader. Every tick tries the primary again, so a transient
/// failure costs one fallback read and nothing more.
pub struct FallbackSource {
    primary: Box<dyn TrafficSource>,
    fallback: Box<dyn TrafficSource>,
    consecutive_failures: AtomicU64,
}

impl FallbackSource {
    pub fn new(primary: Box<dyn TrafficSource>, fallback: Box<dyn TrafficSource>) -> Self {
        Self {
            primary,
            fallback,
            consecutive_failures: AtomicU64::new(0),
        }
    }

    /// Number of primary failures since the last primary success
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TrafficSource for FallbackSource {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn read_counters(&self) -> Result<TrafficCounters, SourceError> {
        match self.primary.read_counters().await {
            Ok(counters) => {
                let previous = self.consecutive_failures.swap(0, Ordering::Relaxed);
                if previous > 0 {
                    info!(
                        "Source '{}' recovered after {} failed reads",
                        self.primary.name(),
                        previous
                    );
                }
                Ok(counters)
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                // Only the first failure of a streak is worth a warning
                if failures == 1 {
                    warn!(
                        "Source '{}' failed ({}), falling back to '{}'",
                        self.primary.name(),
                        e,
                        self.fallback.name()
                    );
                } else {
                    debug!(
                        "Source '{}' failure #{}: {}",
                        self.primary.name(),
                        failures,
                        e
                    );
                }
                self.fallback.read_counters().await
            }
        }
    }
}
