use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings common to every service, read from an optional `configuration`
/// file and `APP__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.grpc_port()?;
        Ok(config)
    }

    /// The gRPC listener sits one above the HTTP port. Port 0 stays 0 so
    /// tests can ask the OS for two ephemeral ports.
    pub fn grpc_port(&self) -> Result<u16, AppError> {
        if self.port == 0 {
            return Ok(0);
        }
        self.port.checked_add(1).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "port {} leaves no room for the gRPC listener at port + 1",
                self.port
            ))
        })
    }
}
