//! Runtime configuration from environment variables

use crate::error::ControllerError;
use asset_inventory_client::{DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cloud Asset Inventory settings; present only when `CAI_ORG_ID` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryConfig {
    pub org_id: String,
    pub base_url: String,
    /// Static bearer token; the metadata server is used when absent
    pub access_token: Option<String>,
    /// Attempts per page fetch before a transient failure is reported
    pub max_attempts: u32,
}

impl InventoryConfig {
    /// `ListAssets` parent for the organization
    pub fn scope(&self) -> String {
        format!("organizations/{}", self.org_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub allocation_timeout: Duration,
    pub lock_timeout: Duration,
    pub inventory: Option<InventoryConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or_else(|| {
            ControllerError::InvalidConfig(
                "DATABASE_URL environment variable is required".to_string(),
            )
        })?;

        let inventory = match var("CAI_ORG_ID") {
            Some(org_id) => Some(InventoryConfig {
                org_id,
                base_url: var("CAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                access_token: var("CAI_ACCESS_TOKEN"),
                max_attempts: parse_or(
                    var("CAI_MAX_ATTEMPTS"),
                    "CAI_MAX_ATTEMPTS",
                    DEFAULT_MAX_ATTEMPTS,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            port: parse_or(var("PORT"), "PORT", 8080)?,
            database_url,
            database_max_connections: parse_or(
                var("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                100,
            )?,
            allocation_timeout: Duration::from_secs(parse_or(
                var("ALLOCATION_TIMEOUT_SECS"),
                "ALLOCATION_TIMEOUT_SECS",
                30,
            )?),
            lock_timeout: Duration::from_millis(parse_or(
                var("LOCK_TIMEOUT_MS"),
                "LOCK_TIMEOUT_MS",
                10_000,
            )?),
            inventory,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ControllerError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{} has an invalid value: {:?}", key, raw))
        }),
        None => Ok(default),
    }
}
