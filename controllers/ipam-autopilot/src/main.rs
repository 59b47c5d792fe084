//! IPAM Autopilot
//!
//! Hands out non-overlapping IPv4 subnets from a hierarchy of ranges.
//!
//! Ranges are allocated through the REST API or, for Config Connector
//! `ComputeSubnetwork` objects, through the mutating admission webhook.
//! Subnets that exist in the cloud but were created elsewhere are picked up
//! from Cloud Asset Inventory when `CAI_ORG_ID` is set.

mod api;
mod config;
mod error;
mod inventory;
mod metrics;

use crate::api::AppState;
use crate::config::Config;
use crate::error::ControllerError;
use crate::inventory::AssetInventory;
use crate::metrics::Metrics;
use asset_inventory_client::{AssetInventoryClient, TokenSource};
use ipam_core::Allocator;
use ipam_store::PgRepository;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting IPAM Autopilot");

    // kube, reqwest and sqlx all link rustls; pick one provider for the process
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Port: {}", config.port);
    info!("  Max database connections: {}", config.database_max_connections);
    info!("  Allocation timeout: {:?}", config.allocation_timeout);
    info!("  Lock timeout: {:?}", config.lock_timeout);
    info!(
        "  Cloud Asset Inventory: {}",
        config
            .inventory
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |cai| cai.scope())
    );
    if let Some(cai) = &config.inventory {
        info!("  Inventory attempts per page: {}", cai.max_attempts);
    }

    let repository = PgRepository::connect(&config.database_url, config.database_max_connections)
        .await?
        .with_lock_timeout(config.lock_timeout);

    let mut allocator =
        Allocator::new(Arc::new(repository)).with_scope_timeout(config.allocation_timeout);
    if let Some(cai) = &config.inventory {
        let token = match &cai.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::metadata(),
        };
        let client = AssetInventoryClient::new(cai.base_url.clone(), token)?
            .with_max_attempts(cai.max_attempts);
        allocator = allocator.with_inventory(cai.scope(), Arc::new(AssetInventory::new(Arc::new(client))));
    }

    let state = AppState::new(allocator, Metrics::new()?);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("IPAM Autopilot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
