use anyhow::{Context, Result, bail};
use chrono::Local;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cli::commands::WatchMode;
use crate::collectors::platform::interface_manager::InterfaceManager;
use crate::collectors::platform::privileged::PrivilegedSource;
use crate::collectors::platform::privileges::unavailable_hint;
use crate::collectors::platform::standard::StandardSource;
use crate::collectors::{
    ReloadingSource, SourceKind, TrafficCounters, TrafficSource, create_traffic_source,
};
use crate::display::formatting::{format_bytes, format_speed_line};
use crate::display::{NotificationRenderer, render_overlay};
use crate::sampler::{RateSampler, SpeedReading, TrafficSample, compute_rate};
use crate::settings::{MAX_INTERVAL_MS, MIN_INTERVAL_MS, SettingsHandle};

/// How often `watch` checks the settings file for edits
const RELOAD_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct StatusReport {
    timestamp: String,
    source: &'static str,
    measurement_ms: u64,
    reading: SpeedReading,
    counters: TrafficCounters,
}

/// Runs the non-interactive commands against the shared settings
pub struct MonitorCommandHandler {
    settings: Arc<SettingsHandle>,
}

impl MonitorCommandHandler {
    pub fn new(settings: Arc<SettingsHandle>) -> Self {
        Self { settings }
    }

    fn source(&self) -> Arc<dyn TrafficSource> {
        create_traffic_source(&self.settings.current().source)
    }

    /// Probes the privileged table directly so its failure is reported instead of silently falling back
    async fn report_privileged_availability(&self) {
        let source = self.settings.current().source;
        if source.kind != SourceKind::Privileged {
            return;
        }

        let privileged = PrivilegedSource::new(
            source.proc_net_dev.clone(),
            InterfaceManager::new().with_filters(source.blacklist, source.include),
        );
        if let Err(e) = privileged.read_counters().await {
            eprintln!("⚠️  {e}");
            if let Some(hint) = unavailable_hint(&e) {
                eprintln!("    {hint}");
            }
            eprintln!("    Falling back to the standard source.");
            eprintln!();
        }
    }

    pub async fn handle_watch_command(&self, duration: Option<u64>, mode: WatchMode) -> Result<()> {
        self.report_privileged_availability().await;

        let reloader = self.settings.spawn_reloader(RELOAD_PERIOD);
        let source = Arc::new(ReloadingSource::new(self.settings.source_settings()));
        let sampler = RateSampler::new(source, self.settings.sampler_config());
        let mut readings = sampler.subscribe();
        let mut prefs = self.settings.subscribe();
        let mut notifications = NotificationRenderer::new();

        sampler.start().context("Failed to start rate sampler")?;
        println!(
            "📡 Sampling via {} source (Press Ctrl+C to stop)\n",
            sampler.source_name()
        );

        let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping sampler");
                    break;
                }
                _ = &mut expired => {
                    println!("\n⏰ Watch duration completed");
                    break;
                }
                changed = readings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let reading = *readings.borrow_and_update();
                    let settings = prefs.borrow_and_update().clone();
                    let stamp = Local::now().format("%H:%M:%S");
                    match mode {
                        WatchMode::Overlay => {
                            println!("{stamp}  {}", render_overlay(&reading, &settings.overlay));
                        }
                        WatchMode::Notification => {
                            if let Some(content) = notifications.render(&reading, &settings.notification) {
                                println!("{stamp}  {content}");
                            }
                        }
                    }
                }
            }
        }

        sampler.stop();
        if let Some(reloader) = reloader {
            reloader.abort();
        }
        Ok(())
    }

    pub async fn handle_status_command(&self, measurement_ms: u64, json: bool) -> Result<()> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&measurement_ms) {
            bail!(
                "Measurement duration must be between {} and {} ms, got {}",
                MIN_INTERVAL_MS,
                MAX_INTERVAL_MS,
                measurement_ms
            );
        }
        if !json {
            self.report_privileged_availability().await;
        }

        let source = self.source();
        debug!("Measuring for {} ms via {}", measurement_ms, source.name());

        let first = TrafficSample::new(
            source
                .read_counters()
                .await
                .context("Failed to read baseline traffic counters")?,
            Instant::now(),
        );
        tokio::time::sleep(Duration::from_millis(measurement_ms)).await;
        let second = TrafficSample::new(
            source
                .read_counters()
                .await
                .context("Failed to read traffic counters")?,
            Instant::now(),
        );

        let reading = compute_rate(&first, &second).unwrap_or_else(|| {
            warn!("Clock did not advance during measurement");
            SpeedReading::ZERO
        });

        let report = StatusReport {
            timestamp: Local::now().to_rfc3339(),
            source: source.name(),
            measurement_ms,
            reading,
            counters: second.counters,
        };

        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize status")?
            );
            return Ok(());
        }

        println!("Network Throughput");
        println!("==================");
        println!("Source:        {}", report.source);
        println!("Measured over: {:.1}s", measurement_ms as f64 / 1000.0);
        println!();
        println!("  Download: {}", format_speed_line(reading.download_bps));
        println!("  Upload:   {}", format_speed_line(reading.upload_bps));
        println!("  Total:    {}", format_speed_line(reading.total_bps()));
        println!();
        println!("  Total Received: {}", format_bytes(report.counters.rx_bytes));
        println!("  Total Sent:     {}", format_bytes(report.counters.tx_bytes));
        Ok(())
    }

    pub async fn handle_interfaces_command(&self, json: bool) -> Result<()> {
        let source = self.settings.current().source;
        let listing = StandardSource::new(
            InterfaceManager::new().with_filters(source.blacklist, source.include),
        );
        let interfaces = tokio::task::spawn_blocking(move || listing.list_interfaces())
            .await
            .context("Interface listing task failed")?
            .context("Failed to list network interfaces")?;

        if json {
            let rows: Vec<serde_json::Value> = interfaces
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "name": entry.info.name,
                        "kind": entry.info.kind,
                        "decision": entry.info.decision,
                        "counted": entry.info.is_counted(),
                        "rx_bytes": entry.counters.rx_bytes,
                        "tx_bytes": entry.counters.tx_bytes,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("Failed to serialize interfaces")?
            );
            return Ok(());
        }

        self.report_privileged_availability().await;

        if interfaces.is_empty() {
            println!("No network interfaces found.");
            return Ok(());
        }

        println!("{:<16} {:<10} {:<12} {:>12} {:>12}", "Interface", "Kind", "Counted", "Received", "Sent");
        println!("{}", "-".repeat(66));
        for entry in &interfaces {
            let counted = if entry.info.is_counted() {
                "yes".to_string()
            } else {
                format!("{:?}", entry.info.decision)
            };
            println!(
                "{:<16} {:<10} {:<12} {:>12} {:>12}",
                entry.info.name,
                format!("{:?}", entry.info.kind),
                counted,
                format_bytes(entry.counters.rx_bytes),
                format_bytes(entry.counters.tx_bytes)
            );
        }
        Ok(())
    }

    pub fn handle_config_command(&self) -> Result<()> {
        let settings = self.settings.current();
        println!(
            "{}",
            serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?
        );
        Ok(())
    }
}
