use std::path::PathBuf;

use anyhow::Context;
use brewd::Config;
use brewd::Monitor;
use brewd::NotificationSink;
use brewd::TokioSleeper;
use brewd::integrations::HueBridge;
use brewd::integrations::ShellySensor;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Infer a coffee brewer's phase from smart plug power readings
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "brewd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets())
        .init();

    tracing::info!("brewd starting");
    tracing::info!("Loaded config from: {}", args.config.display());
    tracing::info!("Reading power from {}", config.sensor.url);

    let mut sensor =
        ShellySensor::new(&config.sensor).context("Failed to create power sensor client")?;

    brewd::wait_for_sensor(&mut sensor, &TokioSleeper, config.sensor.connect_attempts).await?;

    let sink = match config.enabled_hue() {
        Some(hue) => {
            tracing::info!("Using Hue bridge at {}", hue.bridge);
            let mut bridge = HueBridge::new(hue).context("Failed to create Hue client")?;
            if let Err(e) = bridge.discover().await {
                tracing::warn!("Hue light discovery failed, will retry on first command: {}", e);
            }
            NotificationSink::Hue(bridge)
        }
        None => {
            tracing::info!("Hue is disabled, phase changes will only be logged");
            NotificationSink::NoOp
        }
    };

    let mut monitor = Monitor::new(sensor, sink, TokioSleeper, config.timing.clone());

    tokio::select! {
        _ = monitor.run() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => tracing::info!("Received shutdown signal"),
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    tracing::info!("brewd shutdown complete in phase {}", monitor.phase());

    Ok(())
}
