use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::collectors::SourceKind;
use crate::settings::SettingsLoader;

/// Main CLI structure for the pulse meter
/// Uses clap's derive macros for automatic CLI generation
#[derive(Parser)]
#[command(author = "Kaipo Chen")]
#[command(version)] // Automatically uses version from Cargo.toml
#[command(about = "Real-time network throughput meter with adaptive sampling")]
#[command(long_about = "Pulse samples the cumulative traffic counters of the physical network interfaces \
and turns them into download and upload rates. The sampling interval stretches under battery saver \
and during sustained low traffic, and only meaningful rate changes are published.\n\n\
Settings are read from an optional TOML file and PULSE__ environment variables \
(e.g. PULSE__SAMPLER__BASE_INTERVAL_MS=1000).")]
pub struct Cli {
    /// TOML settings file; reloaded automatically when it changes
    #[arg(short, long, global = true, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,

    /// Override the configured traffic source
    #[arg(long, global = true, value_enum, help = "Traffic counter source")]
    pub source: Option<SourceKind>,

    /// Stretch the sampling interval by the battery saver multiplier
    #[arg(long, global = true, help = "Enable battery saver sampling")]
    pub battery_saver: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings loader with the global flags applied as top-priority overrides
    pub fn settings_loader(&self) -> SettingsLoader {
        let mut loader = SettingsLoader::new(self.config.clone());
        if let Some(kind) = self.source {
            let value = match kind {
                SourceKind::Standard => "standard",
                SourceKind::Privileged => "privileged",
            };
            loader = loader.with_override("source.kind", value);
        }
        if self.battery_saver {
            loader = loader.with_override("sampler.battery_saver", true);
        }
        if let Commands::Live {
            interval_ms: Some(interval_ms),
        } = &self.command
        {
            loader = loader.with_override("sampler.base_interval_ms", *interval_ms as i64);
        }
        loader
    }
}

/// How `watch` renders each published reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum WatchMode {
    /// Two-line overlay text joined on one line
    #[default]
    Overlay,
    /// Notification title, badge and body
    Notification,
}

/// Available CLI commands
/// Each variant represents a different mode of operation
#[derive(Subcommand)]
pub enum Commands {
    /// Interactive dashboard with live rates and sparkline history
    #[command(about = "Monitor throughput with an interactive dashboard")]
    #[command(long_about = "Launches a terminal dashboard showing download, upload and total rates, \
sparkline history, the sampler's running state and its effective interval.\n\
Press 's' to stop or start sampling, 'q' or ESC to exit.\n\n\
Examples:\n  \
pulse live                            # Default cadence\n  \
pulse live --interval-ms 1000         # Sample every second\n  \
pulse --battery-saver live            # Stretched cadence")]
    Live {
        /// Base sampling interval in milliseconds
        #[arg(short, long, help = "Base sampling interval in milliseconds (100-60000)")]
        interval_ms: Option<u64>,
    },

    /// Headless sampling that prints every published reading
    #[command(about = "Print each published reading until interrupted")]
    #[command(long_about = "Runs the sampler without a UI and prints one line per published reading, \
rendered as the overlay or the notification would show it. Stops on Ctrl+C or after --duration.\n\n\
Examples:\n  \
pulse watch                           # Overlay lines until Ctrl+C\n  \
pulse watch --mode notification       # Notification content\n  \
pulse watch --duration 30             # Stop after 30 seconds")]
    Watch {
        /// Stop after this many seconds
        #[arg(short, long, help = "Stop after this many seconds")]
        duration: Option<u64>,

        #[arg(short, long, value_enum, default_value_t = WatchMode::Overlay, help = "Output rendering")]
        mode: WatchMode,
    },

    /// One-time measurement from two counter reads
    #[command(about = "Measure current throughput once")]
    #[command(long_about = "Reads the traffic counters, waits for the measurement duration, reads \
them again and prints the resulting rates.\n\n\
Examples:\n  \
pulse status                          # 2 second measurement\n  \
pulse status -m 5000 --json           # 5 second measurement as JSON")]
    Status {
        /// Time between the two counter reads in milliseconds
        #[arg(
            short,
            long,
            default_value = "2000",
            help = "Measurement duration in milliseconds (100-60000)"
        )]
        measurement_ms: u64,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    /// Interface list with classification and counting decision
    #[command(about = "List network interfaces and whether they are counted")]
    Interfaces {
        #[arg(long, help = "Print the list as JSON")]
        json: bool,
    },

    /// Effective settings after all layers are applied
    #[command(about = "Print the effective settings as JSON")]
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_become_overrides() {
        let cli = Cli::parse_from([
            "pulse",
            "--source",
            "privileged",
            "--battery-saver",
            "live",
            "--interval-ms",
            "1000",
        ]);
        let settings = cli.settings_loader().load().unwrap();
        assert_eq!(settings.source.kind, SourceKind::Privileged);
        assert!(settings.sampler.battery_saver);
        assert_eq!(settings.sampler.base_interval_ms, 1000);
    }

    #[test]
    fn test_watch_defaults() {
        let cli = Cli::parse_from(["pulse", "watch"]);
        match cli.command {
            Commands::Watch { duration, mode } => {
                assert_eq!(duration, None);
                assert_eq!(mode, WatchMode::Overlay);
            }
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_out_of_range_interval_is_rejected_by_settings() {
        let cli = Cli::parse_from(["pulse", "live", "--interval-ms", "5"]);
        assert!(cli.settings_loader().load().is_err());
    }
}
