use async_trait::async_trait;
use log::{debug, trace};
use std::sync::{Arc, Mutex};
use sysinfo::Networks;

use super::interface_manager::{InterfaceInfo, InterfaceManager};
use crate::collectors::source::{SourceError, TrafficCounters, TrafficSource};

/// Portable traffic source backed by the `sysinfo` network list
///
/// Works on every platform sysinfo supports. Each read refreshes the interface
/// list, so interfaces that come up while the sampler runs are picked up.
pub struct StandardSource {
    state: Arc<Mutex<StandardState>>,
}

struct StandardState {
    networks: Networks,
    interfaces: InterfaceManager,
}

/// Per-interface counters as seen by the standard source
#[derive(Debug, Clone)]
pub struct InterfaceCounters {
    pub info: InterfaceInfo,
    pub counters: TrafficCounters,
}

impl StandardSource {
    pub fn new(interfaces: InterfaceManager) -> Self {
        Self {
            state: Arc::new(Mutex::new(StandardState {
                networks: Networks::new_with_refreshed_list(),
                interfaces,
            })),
        }
    }

    /// Lists every interface sysinfo knows about with its classification
    pub fn list_interfaces(&self) -> Result<Vec<InterfaceCounters>, SourceError> {
        let mut guard = lock_state(&self.state)?;
        let StandardState {
            networks,
            interfaces,
        } = &mut *guard;
        networks.refresh(true);

        let mut listed: Vec<InterfaceCounters> = networks
            .iter()
            .map(|(name, data)| InterfaceCounters {
                info: interfaces.analyze(name),
                counters: TrafficCounters::new(data.total_received(), data.total_transmitted()),
            })
            .collect();
        interfaces.retain_present(networks.keys().map(String::as_str));
        listed.sort_by(|a, b| a.info.name.cmp(&b.info.name));
        Ok(listed)
    }
}

fn lock_state(
    state: &Mutex<StandardState>,
) -> Result<std::sync::MutexGuard<'_, StandardState>, SourceError> {
    state
        .lock()
        .map_err(|_| SourceError::Task("standard source state lock poisoned".to_string()))
}

fn read_totals(state: &Mutex<StandardState>) -> Result<TrafficCounters, SourceError> {
    let mut guard = lock_state(state)?;
    let StandardState {
        networks,
        interfaces,
    } = &mut *guard;
    networks.refresh(true);

    let mut totals = TrafficCounters::default();
    let mut counted = 0usize;
    for (name, data) in networks.iter() {
        if interfaces.should_count(name) {
            totals.accumulate(data.total_received(), data.total_transmitted());
            counted += 1;
        }
    }

    interfaces.retain_present(networks.keys().map(String::as_str));

    if counted == 0 {
        debug!("Standard source found no physical interfaces to count");
    }
    trace!(
        "Standard source totals: rx={} tx={} across {} interfaces",
        totals.rx_bytes, totals.tx_bytes, counted
    );
    Ok(totals)
}

#[async_trait]
impl TrafficSource for StandardSource {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn read_counters(&self) -> Result<TrafficCounters, SourceError> {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || read_totals(&state))
            .await
            .map_err(|e| SourceError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_standard_source_reads_without_panicking() {
        let source = StandardSource::new(InterfaceManager::new());
        // Containers may have no physical interfaces, which reads as zero
        for _ in 0..3 {
            let result = source.read_counters().await;
            assert!(result.is_ok(), "standard read failed: {:?}", result.err());
        }
    }

    #[test]
    fn test_list_interfaces_is_sorted() {
        let source = StandardSource::new(InterfaceManager::new());
        let listed = source.list_interfaces().expect("listing should succeed");
        let names: Vec<&str> = listed.iter().map(|i| i.info.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
