//! Smart Spice Rack controller daemon (spicerackd) - Main entry point
//!
//! Wires the sensor devices, record store, and reference table into the
//! coordination loop, spawns the background monitors, and handles shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use spicerack::calibration::ConsoleOperator;
use spicerack::config::Config;
use spicerack::convert::ReferenceTable;
use spicerack::engine::Coordinator;
use spicerack::monitor::spawn_monitors;
use spicerack::sensor::{FileButtonInput, FilePresenceSensor, FileWeightSensor};
use spicerack::store::RecordStore;
use spicerack::RackContext;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Command-line arguments for spicerackd
#[derive(Parser, Debug)]
#[command(name = "spicerackd")]
#[command(about = "Smart spice rack controller daemon")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "SPICERACK_CONFIG")]
    config: Option<PathBuf>,

    /// Record store file (overrides config)
    #[arg(long, env = "SPICERACK_STORE")]
    store: Option<PathBuf>,

    /// Density reference table CSV (overrides config)
    #[arg(long, env = "SPICERACK_REFERENCE_TABLE")]
    reference_table: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spicerack=debug".into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting spicerackd v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(store) = args.store {
        config.store_path = store;
    }
    if let Some(table) = args.reference_table {
        config.reference_table_path = table;
    }
    info!("Record store: {}", config.store_path.display());
    info!("Rack size: {} slots", config.rack_size);

    let store =
        RecordStore::open(&config.store_path).context("Failed to open record store")?;
    let reference_table = ReferenceTable::load(&config.reference_table_path)
        .context("Failed to load reference table")?;

    let weight = Box::new(FileWeightSensor::new(&config.weight_device));
    let presence = Box::new(FilePresenceSensor::new(&config.presence_device));
    let button = Box::new(FileButtonInput::new(&config.button_device));

    let ctx = Arc::new(RackContext::new(
        config,
        weight,
        presence,
        button,
        store,
        reference_table,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handles = spawn_monitors(ctx.clone(), shutdown_rx.clone());

    // The signal handler only flips the flag; the coordinator finishes any
    // in-flight store rewrite or calibration step before observing it
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let coordinator = Coordinator::new(ctx);
    let mut operator = ConsoleOperator;
    coordinator
        .run(&mut operator, shutdown_rx)
        .await
        .context("Coordinator error")?;

    // Wait for the monitors before exiting
    for handle in monitor_handles {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
