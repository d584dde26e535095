//! ledwatch-broker - serial port arbitration daemon
//!
//! Grants exclusive use of the serial ports to one poller at a time, in
//! request order. Runs until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use ledwatch_core::config::{self, MonitorConfig};
use ledwatch_core::core::arbitration::{ArbitrationBroker, BrokerConfig};
use ledwatch_core::core::logger;
use std::path::PathBuf;

/// Serial port arbitration broker
#[derive(Parser, Debug)]
#[command(
    name = "ledwatch-broker",
    version,
    about = "Serial port arbitration broker for ledwatch pollers"
)]
struct Args {
    /// Config file (JSON, or TOML by extension)
    #[arg(short, long, env = "LEDWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "LEDWATCH_BROKER")]
    address: Option<String>,

    /// Log level, overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Write daily log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let settings = match &config_path {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    let mut log_options = settings.log_options();
    if let Some(level) = args.log_level {
        log_options.level = level;
    }
    if let Some(dir) = args.log_dir {
        log_options.directory = Some(dir);
    }
    log_options.file_prefix = "ledwatch-broker.log".to_string();
    let _guard = logger::init(&log_options)?;

    tracing::info!("Starting ledwatch-broker v{}", ledwatch_core::VERSION);

    let broker_config = BrokerConfig {
        address: args.address.unwrap_or(settings.broker.address),
    };
    let broker = ArbitrationBroker::bind(&broker_config)
        .await
        .with_context(|| format!("binding {}", broker_config.address))?;
    let stats = broker.stats();

    broker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let snapshot = stats.snapshot();
    tracing::info!(
        "Served {} grant(s), {} completed, max concurrent holders {}",
        snapshot.grants,
        snapshot.completions,
        snapshot.max_holders
    );
    Ok(())
}
