//! Configuration module for clinic-service.

use crate::services::BookingConflictPolicy;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub booking_policy: BookingConflictPolicy,
}

/// Where entities are persisted.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Postgres(DatabaseConfig),
    /// Process memory; contents are lost on restart.
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            url: env::var("DATABASE_URL").map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required for the postgres store"
                ))
            })?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        })
    }
}

impl ClinicConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres(DatabaseConfig::from_env()?),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let booking_policy = match env::var("BOOKING_CONFLICT_POLICY") {
            Ok(value) => value
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            Err(_) => BookingConflictPolicy::default(),
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "clinic-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            store,
            booking_policy,
        })
    }
}
