//! LED Toggler - Main Entry Point
//!
//! Connects to the configured broker and publishes an alternating ON/OFF state
//! until interrupted.

use clap::{Parser, Subcommand};
use led_toggler::config::{TogglerConfig, DEFAULT_CONFIG_PATHS};
use led_toggler::observability::init_default_logging;
use led_toggler::publisher::PeriodicPublisher;
use led_toggler::transport::mqtt::MqttClient;
use std::path::{Path, PathBuf};
use std::process;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Periodic MQTT LED toggler
#[derive(Parser)]
#[command(name = "led-toggler")]
#[command(about = "Publishes an alternating ON/OFF state to an MQTT topic")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and publish until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting LED toggler v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_publisher(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<TogglerConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(TogglerConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(TogglerConfig::load_from_file(path)?);
        }
    }

    info!("No configuration file found, using built-in defaults");
    Ok(TogglerConfig::default())
}

async fn run_publisher(config: TogglerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        broker = %config.mqtt.broker_url,
        topic = %config.publisher.topic,
        "Application starting"
    );

    let client = MqttClient::new(config.mqtt)?;
    info!(client_id = %client.client_id(), "MQTT client created");

    let mut publisher = PeriodicPublisher::new(client, config.publisher);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
        if shutdown_tx.send(true).is_err() {
            warn!("Publisher already stopped");
        }
    });

    let stats = publisher.run(shutdown_rx).await?;
    info!(
        published = stats.accepted,
        rejected = stats.rejected,
        "Publisher finished"
    );
    Ok(())
}

fn handle_config_command(
    config: &TogglerConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
