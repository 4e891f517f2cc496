mod broker;
mod collector;
mod config;
mod error;
mod export;
mod http;
mod hub;
mod metrics;
mod stage;

use crate::broker::{BrokerClient, ProcessExecutor};
use crate::collector::MetricsCollector;
use crate::config::Config;
use crate::http::{AppState, HttpServer};
use crate::hub::BroadcastHub;
use crate::stage::{HttpProducer, ProducerControl, StageController, StageTimings};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lag-dashboard")]
#[command(about = "Live consumer lag and throughput dashboard for a Kafka partitioning demo")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Starting lag-dashboard");

    let config = Config::load(Some(&args.config))?;
    info!(
        bootstrap_servers = %config.broker.bootstrap_servers,
        topic = %config.broker.topic,
        group = %config.broker.consumer_group,
        poll_interval = ?config.dashboard.poll_interval,
        stages = config.stages.len(),
        "Configuration loaded"
    );

    let executor = Arc::new(ProcessExecutor::new(config.dashboard.command_timeout));
    let client = Arc::new(BrokerClient::new(&config.broker, executor));
    let hub = Arc::new(BroadcastHub::new());
    let collector = Arc::new(MetricsCollector::new(client, hub, &config.dashboard));

    let producer: Option<Arc<dyn ProducerControl>> = if config.producer.enabled {
        Some(Arc::new(HttpProducer::new(&config.producer)?))
    } else {
        info!("Producer control disabled");
        None
    };
    let stages = Arc::new(StageController::new(
        config.stages.clone(),
        Arc::clone(&collector),
        producer,
        StageTimings::from_config(&config.broker, &config.producer),
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let collector_handle = tokio::spawn(Arc::clone(&collector).run(shutdown_tx.subscribe()));

    let http_server = HttpServer::new(
        &config.dashboard.http_host,
        config.dashboard.http_port,
        AppState::new(collector, stages),
    )?;

    let shutdown_rx = shutdown_tx.subscribe();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!(error = %e, "HTTP server error");
        }
    });

    shutdown_signal().await;
    info!("Shutdown signal received, stopping...");

    let _ = shutdown_tx.send(());

    let shutdown_timeout = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        futures::future::join_all([server_handle, collector_handle]),
    );

    match shutdown_timeout.await {
        Ok(_) => info!("All tasks stopped"),
        Err(_) => error!("Timeout waiting for tasks to stop"),
    }

    info!("lag-dashboard stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
