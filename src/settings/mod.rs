//! User settings
//!
//! Settings are one structured document: sampler tuning, traffic source
//! selection and the display preferences of the overlay and notification
//! renderers. They are layered with the `config` crate (defaults, optional
//! TOML file, `PULSE__` environment variables, explicit overrides) and handed
//! to consumers through `watch` channels so that a change replaces the whole
//! config object at once.

use config::{Config, Environment, File, FileFormat};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collectors::SourceKind;
use crate::collectors::platform::privileged::DEFAULT_PROC_NET_DEV;

pub const ENV_PREFIX: &str = "PULSE";

pub const MIN_INTERVAL_MS: u64 = 100;
pub const MAX_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to carry runtime edits: {0}")]
    Runtime(#[from] serde_json::Error),

    #[error("failed to inspect settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tuning of the rate sampler's cadence and publication filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Start-to-start tick period before any multiplier
    pub base_interval_ms: u64,
    /// Whether the battery saver multiplier applies
    pub battery_saver: bool,
    pub battery_saver_multiplier: f64,
    /// Whether sustained low traffic stretches the interval
    pub low_traffic_throttle: bool,
    pub low_traffic_multiplier: f64,
    /// Both directions must stay below this rate to count as low traffic
    pub low_traffic_threshold_bps: u64,
    /// How long traffic must stay low before the interval stretches
    pub low_traffic_trigger_ms: u64,
    /// Minimum per-direction change that makes a new reading worth publishing
    pub change_threshold_bps: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 1500,
            battery_saver: false,
            battery_saver_multiplier: 2.0,
            low_traffic_throttle: true,
            low_traffic_multiplier: 2.0,
            low_traffic_threshold_bps: 1024,
            low_traffic_trigger_ms: 10_000,
            change_threshold_bps: 5 * 1024,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.base_interval_ms) {
            return Err(SettingsError::Invalid {
                field: "sampler.base_interval_ms",
                reason: format!(
                    "{} is outside {}..={}",
                    self.base_interval_ms, MIN_INTERVAL_MS, MAX_INTERVAL_MS
                ),
            });
        }
        check_multiplier(
            "sampler.battery_saver_multiplier",
            self.battery_saver_multiplier,
        )?;
        check_multiplier("sampler.low_traffic_multiplier", self.low_traffic_multiplier)?;
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }
}

fn check_multiplier(field: &'static str, value: f64) -> Result<(), SettingsError> {
    if !value.is_finite() || value < 1.0 {
        return Err(SettingsError::Invalid {
            field,
            reason: format!("{value} must be a finite number >= 1.0"),
        });
    }
    Ok(())
}

/// Which backend to read counters from and which interfaces count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Kernel counter table used by the privileged source
    pub proc_net_dev: PathBuf,
    /// Interfaces never counted, even when physical
    pub blacklist: Vec<String>,
    /// When non-empty, only these interfaces are counted
    pub include: Vec<String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Standard,
            proc_net_dev: PathBuf::from(DEFAULT_PROC_NET_DEV),
            blacklist: Vec::new(),
            include: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayPrefs {
    pub text_up: String,
    pub text_down: String,
    pub up_first: bool,
}

impl Default for OverlayPrefs {
    fn default() -> Self {
        Self {
            text_up: "▲ ".to_string(),
            text_down: "▼ ".to_string(),
            up_first: true,
        }
    }
}

/// Which rate the notification badge shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Total,
    Upload,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPrefs {
    pub enabled: bool,
    /// Compact short-text style instead of the value/unit badge
    pub live_update: bool,
    pub text_up: String,
    pub text_down: String,
    pub up_first: bool,
    pub display_mode: DisplayMode,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            live_update: false,
            text_up: "▲ ".to_string(),
            text_down: "▼ ".to_string(),
            up_first: true,
            display_mode: DisplayMode::Total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sampler: SamplerConfig,
    pub source: SourceSettings,
    pub overlay: OverlayPrefs,
    pub notification: NotificationPrefs,
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.sampler.validate()?;
        if self.source.kind == SourceKind::Privileged
            && self.source.proc_net_dev.as_os_str().is_empty()
        {
            return Err(SettingsError::Invalid {
                field: "source.proc_net_dev",
                reason: "path must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Builds `Settings` from the layered sources
#[derive(Debug, Clone, Default)]
pub struct SettingsLoader {
    path: Option<PathBuf>,
    overrides: Vec<(String, config::Value)>,
}

impl SettingsLoader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            overrides: Vec::new(),
        }
    }

    /// Adds a highest-priority value, e.g. from a CLI flag
    pub fn with_override(mut self, key: &str, value: impl Into<config::Value>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = &self.path {
            debug!("Loading settings file {}", path.display());
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("source.blacklist")
                .with_list_parse_key("source.include"),
        );

        for (key, value) in &self.overrides {
            builder = builder.set_override(key.as_str(), value.clone())?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Live settings shared between the sampler and its consumers
///
/// The sampler subscribes to the `SamplerConfig` channel and snapshots it once
/// per tick; the traffic source follows the `SourceSettings` channel and
/// renderers subscribe to the full document.
///
/// Sampler fields edited at runtime are pinned on top of the loaded layers,
/// so a reload after a file edit keeps them.
pub struct SettingsHandle {
    loader: SettingsLoader,
    settings: watch::Sender<Settings>,
    sampler: watch::Sender<SamplerConfig>,
    source: watch::Sender<SourceSettings>,
    pinned: Mutex<Map<String, Value>>,
}

impl SettingsHandle {
    pub fn new(loader: SettingsLoader, initial: Settings) -> Self {
        let (sampler, _) = watch::channel(initial.sampler.clone());
        let (source, _) = watch::channel(initial.source.clone());
        let (settings, _) = watch::channel(initial);
        Self {
            loader,
            settings,
            sampler,
            source,
            pinned: Mutex::new(Map::new()),
        }
    }

    pub fn load(loader: SettingsLoader) -> Result<Self, SettingsError> {
        let initial = loader.load()?;
        Ok(Self::new(loader, initial))
    }

    pub fn current(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.settings.subscribe()
    }

    pub fn sampler_config(&self) -> watch::Receiver<SamplerConfig> {
        self.sampler.subscribe()
    }

    pub fn source_settings(&self) -> watch::Receiver<SourceSettings> {
        self.source.subscribe()
    }

    fn pinned(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.pinned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the settings; returns whether anything changed
    pub fn apply(&self, next: Settings) -> Result<bool, SettingsError> {
        next.validate()?;

        replace_if_changed(&self.sampler, next.sampler.clone());
        if replace_if_changed(&self.source, next.source.clone()) {
            debug!("Traffic source settings changed");
        }

        Ok(replace_if_changed(&self.settings, next))
    }

    /// Edits the sampler section in place, e.g. toggling battery saver at runtime
    ///
    /// Fields the edit changes stay pinned across later reloads.
    pub fn update_sampler(
        &self,
        edit: impl FnOnce(&mut SamplerConfig),
    ) -> Result<bool, SettingsError> {
        let mut next = self.current();
        let before = serde_json::to_value(&next.sampler)?;
        edit(&mut next.sampler);
        let after = serde_json::to_value(&next.sampler)?;

        let changed = self.apply(next)?;
        if let (Value::Object(before), Value::Object(after)) = (before, after) {
            let mut pinned = self.pinned();
            for (field, value) in after {
                if before.get(&field) != Some(&value) {
                    debug!("Pinning runtime edit of sampler.{}", field);
                    pinned.insert(field, value);
                }
            }
        }
        Ok(changed)
    }

    /// Re-reads every layer, re-applies pinned runtime edits and applies the result
    pub fn reload(&self) -> Result<bool, SettingsError> {
        let mut next = self.loader.load()?;
        {
            let pinned = self.pinned();
            if !pinned.is_empty() {
                let mut sampler = serde_json::to_value(&next.sampler)?;
                if let Value::Object(fields) = &mut sampler {
                    fields.extend(pinned.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                next.sampler = serde_json::from_value(sampler)?;
            }
        }

        let changed = self.apply(next)?;
        if changed {
            info!("Settings reloaded with changes");
        }
        Ok(changed)
    }

    /// Polls the settings file and reloads it when its modification time changes
    ///
    /// Returns `None` when no settings file is configured. Invalid edits are
    /// logged and the previous settings stay in effect.
    pub fn spawn_reloader(self: &Arc<Self>, period: Duration) -> Option<JoinHandle<()>> {
        let path = self.loader.path()?.to_path_buf();
        let handle = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut last_modified = modified_time(&path).await.ok();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let modified = match modified_time(&path).await {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!("{e}");
                        continue;
                    }
                };
                if last_modified == Some(modified) {
                    continue;
                }
                last_modified = Some(modified);

                if let Err(e) = handle.reload() {
                    warn!("Ignoring settings change in {}: {}", path.display(), e);
                }
            }
        }))
    }
}

fn replace_if_changed<T: PartialEq>(sender: &watch::Sender<T>, next: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    })
}

async fn modified_time(path: &Path) -> Result<SystemTime, SettingsError> {
    let io_error = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::metadata(path)
        .await
        .map_err(io_error)?
        .modified()
        .map_err(io_error)
}
