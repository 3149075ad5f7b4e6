use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use pulse_meter::cli::{Cli, MonitorCommandHandler, commands::Commands};
use pulse_meter::collectors::ReloadingSource;
use pulse_meter::dashboard::Dashboard;
use pulse_meter::sampler::RateSampler;
use pulse_meter::settings::SettingsHandle;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Arc::new(
        SettingsHandle::load(cli.settings_loader()).context("Failed to load settings")?,
    );
    debug!("Effective settings: {:?}", settings.current());

    let handler = MonitorCommandHandler::new(Arc::clone(&settings));

    match cli.command {
        Commands::Live { .. } => {
            let reloader = settings.spawn_reloader(Duration::from_secs(2));
            let source = Arc::new(ReloadingSource::new(settings.source_settings()));
            let sampler = RateSampler::new(source, settings.sampler_config());
            let mut dashboard = Dashboard::new(sampler, Arc::clone(&settings));
            dashboard.run().await?;
            if let Some(reloader) = reloader {
                reloader.abort();
            }
        }
        Commands::Watch { duration, mode } => {
            handler.handle_watch_command(duration, mode).await?;
        }
        Commands::Status {
            measurement_ms,
            json,
        } => {
            handler.handle_status_command(measurement_ms, json).await?;
        }
        Commands::Interfaces { json } => {
            handler.handle_interfaces_command(json).await?;
        }
        Commands::Config => {
            handler.handle_config_command()?;
        }
    }

    Ok(())
}
