use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::create_traffic_source;
use crate::collectors::source::{SourceError, TrafficCounters, TrafficSource};
use crate::settings::SourceSettings;

/// Traffic source that follows the live source settings
///
/// The backend is rebuilt before the first read after the settings change.
/// A rebuilt backend counts a different set of interfaces, so every rebuild
/// bumps the generation and the sampler takes a fresh baseline.
pub struct ReloadingSource {
    settings: Mutex<watch::Receiver<SourceSettings>>,
    current: Mutex<Arc<dyn TrafficSource>>,
    generation: AtomicU64,
}

impl ReloadingSource {
    pub fn new(mut settings: watch::Receiver<SourceSettings>) -> Self {
        let current = create_traffic_source(&settings.borrow_and_update());
        Self {
            settings: Mutex::new(settings),
            current: Mutex::new(current),
            generation: AtomicU64::new(0),
        }
    }

    fn active(&self) -> Arc<dyn TrafficSource> {
        let mut settings = lock(&self.settings);
        let mut current = lock(&self.current);

        if settings.has_changed().unwrap_or(false) {
            let next = settings.borrow_and_update().clone();
            *current = create_traffic_source(&next);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "Rebuilt {} traffic source from changed settings (generation {})",
                current.name(),
                generation
            );
        }

        Arc::clone(&current)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TrafficSource for ReloadingSource {
    fn name(&self) -> &'static str {
        lock(&self.current).name()
    }

    async fn read_counters(&self) -> Result<TrafficCounters, SourceError> {
        let source = self.active();
        source.read_counters().await
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::SourceKind;

    #[test]
    fn test_rebuilds_only_after_a_change() {
        let (tx, rx) = watch::channel(SourceSettings::default());
        let source = ReloadingSource::new(rx);
        assert_eq!(source.name(), "standard");

        source.active();
        assert_eq!(source.generation(), 0);

        tx.send_modify(|settings| settings.kind = SourceKind::Privileged);
        source.active();
        assert_eq!(source.generation(), 1);
        assert_eq!(source.name(), "privileged");

        source.active();
        assert_eq!(source.generation(), 1);
    }
}
