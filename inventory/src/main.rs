mod config;
mod errors;
mod ingest;
mod manager;
mod metrics;
mod model;
mod mqtt;
mod registry;
mod rest;
mod store;
mod web;

use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use config::Config;
use ingest::TelemetryIngestor;
use manager::InventoryManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "inventory", about = "IoT location and device inventory with MQTT telemetry")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "INVENTORY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    info!("Starting IoT Inventory");
    info!("REST API: {}{}", config.rest_addr(), config.rest.api_prefix);
    info!("Web view: {}", config.web_addr());
    info!(
        "MQTT broker: {}:{} ({})",
        config.mqtt.broker_ip, config.mqtt.broker_port, config.mqtt.target_telemetry_topic
    );

    metrics::init_metrics().context("failed to register metrics")?;

    let manager = Arc::new(InventoryManager::new());
    if config.demo_data {
        manager
            .seed_demo_data()
            .context("failed to seed demo data")?;
        let stats = manager.stats();
        info!(
            "Demo data loaded: {} locations, {} devices",
            stats.locations, stats.devices
        );
    }
    metrics::REGISTERED_DEVICES.set(manager.stats().devices as f64);

    let client_id = format!("{}-{}", config.mqtt.client_id_prefix, uuid::Uuid::new_v4());
    let ingestor = TelemetryIngestor::new(manager.clone());
    let mqtt_config = config.mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt::run_mqtt(mqtt_config, client_id, ingestor).await {
            error!("MQTT task failed: {}", e);
        }
    });

    let rest_app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(manager.clone(), &config.rest.api_prefix));
    let web_app = web::create_router(manager.clone());

    let rest_listener = tokio::net::TcpListener::bind(config.rest_addr())
        .await
        .with_context(|| format!("failed to bind REST API to {}", config.rest_addr()))?;
    let web_listener = tokio::net::TcpListener::bind(config.web_addr())
        .await
        .with_context(|| format!("failed to bind web view to {}", config.web_addr()))?;

    info!("REST API listening on {}", config.rest_addr());
    info!("Web view listening on {}", config.web_addr());

    let rest_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(rest_listener, rest_app).await {
            error!("REST server error: {}", e);
        }
    });
    let web_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(web_listener, web_app).await {
            error!("Web server error: {}", e);
        }
    });

    tokio::select! {
        _ = mqtt_handle => {
            error!("MQTT task terminated");
        }
        _ = rest_handle => {
            error!("REST server terminated");
        }
        _ = web_handle => {
            error!("Web server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    let stats = manager.stats();
    info!(
        "Shutting down with {} readings across {} series",
        stats.readings, stats.series
    );
    Ok(())
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
