//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// HTTP server settings, read from `RENT_SERVER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port for the inference, health and metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Train a model at startup when no usable artifact exists
    #[serde(default = "default_auto_train")]
    pub auto_train: bool,
}

fn default_api_port() -> u16 {
    8000
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_auto_train() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_host: default_bind_host(),
            auto_train: default_auto_train(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RENT_SERVER").try_parsing(true))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.api_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert!(config.auto_train);
    }

    #[test]
    fn test_empty_source_uses_defaults() {
        let config: ServerConfig = config::Config::builder()
            .set_override("api_port", 9100)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.bind_host, "0.0.0.0");
        assert!(config.auto_train);
    }
}
