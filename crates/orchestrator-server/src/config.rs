//! Configuration for the orchestrator gateway
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// URL of the workflow engine API; `memory://` selects the in-memory engine
    pub engine_api_url: String,

    /// Seconds between workflow cache refreshes
    #[serde(default = "default_cache_refresh_interval")]
    pub cache_refresh_interval_seconds: u64,

    /// Path to the YAML permission grants file
    #[serde(default)]
    pub permissions_file: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_cache_refresh_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> ServerResult<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override from environment variables
        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.port = port;
            } else {
                warn!("Invalid SERVER_PORT value: {}", port);
            }
        }

        if let Ok(host) = env::var("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Ok(engine_api_url) = env::var("ENGINE_API_URL") {
            config.engine_api_url = engine_api_url;
        }

        if let Ok(interval) = env::var("CACHE_REFRESH_INTERVAL_SECONDS") {
            if let Ok(seconds) = interval.parse::<u64>() {
                config.cache_refresh_interval_seconds = seconds;
            } else {
                warn!("Invalid CACHE_REFRESH_INTERVAL_SECONDS value: {}", interval);
            }
        }

        if let Ok(permissions_file) = env::var("PERMISSIONS_FILE") {
            config.permissions_file = Some(permissions_file);
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level;
        }

        // Validate required fields
        if config.engine_api_url.is_empty() {
            return Err(ServerError::ConfigurationError(
                "Engine API URL is required".to_string(),
            ));
        }

        if config.cache_refresh_interval_seconds == 0 {
            return Err(ServerError::ConfigurationError(
                "Cache refresh interval must be at least one second".to_string(),
            ));
        }

        // Add warnings for missing optional fields
        if config.permissions_file.is_none() {
            warn!("No PERMISSIONS_FILE provided - every caller will be granted every permission!");
        }

        info!("Loaded server configuration");
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            engine_api_url: String::new(),
            cache_refresh_interval_seconds: default_cache_refresh_interval(),
            permissions_file: None,
            log_level: default_log_level(),
        }
    }
}
