use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::collectors::source::TrafficSource;
use crate::settings::SourceSettings;

// Traffic counter backends
// The standard source works everywhere sysinfo does; the privileged source reads
// the kernel table directly and falls back to the standard one when it cannot

/// Cross-platform network interface classification
/// Decides which interfaces are physical transports and therefore counted
pub mod interface_manager;

/// Portable backend built on sysinfo's network list
pub mod standard;

/// Kernel counter table backend (`/proc/net/dev`)
pub mod privileged;

/// Primary-then-fallback composition of two sources
pub mod fallback;

/// Privilege checks and guidance when a source is unavailable
pub mod privileges;

/// Source that is rebuilt when the live source settings change
pub mod reloading;

use fallback::FallbackSource;
use interface_manager::InterfaceManager;
use privileged::PrivilegedSource;
use standard::StandardSource;

/// Which traffic backend the sampler reads through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Portable sysinfo reader
    #[default]
    Standard,
    /// Kernel counter table, falling back to the standard reader on failure
    Privileged,
}

fn interface_manager_for(settings: &SourceSettings) -> InterfaceManager {
    InterfaceManager::new().with_filters(
        settings.blacklist.iter().cloned(),
        settings.include.iter().cloned(),
    )
}

/// Builds the traffic source selected by the settings
pub fn create_traffic_source(settings: &SourceSettings) -> Arc<dyn TrafficSource> {
    let standard = StandardSource::new(interface_manager_for(settings));

    match settings.kind {
        SourceKind::Standard => {
            info!("Using standard traffic source");
            Arc::new(standard)
        }
        SourceKind::Privileged => {
            #[cfg(not(target_os = "linux"))]
            {
                log::warn!(
                    "Privileged traffic source needs a Linux counter table; every read will fall back"
                );
            }
            info!(
                "Using privileged traffic source at {} with standard fallback",
                settings.proc_net_dev.display()
            );
            let privileged =
                PrivilegedSource::new(settings.proc_net_dev.clone(), interface_manager_for(settings));
            Arc::new(FallbackSource::new(Box::new(privileged), Box::new(standard)))
        }
    }
}
