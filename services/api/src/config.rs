use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Listener settings for the websocket server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub path: String,
    pub log_filter: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to. Defaults to "0.0.0.0:8080".
    /// *   `BRIDGE_PATH`: The websocket route clients connect to. Defaults to "/realtime".
    /// *   `RUST_LOG`: (Optional) A tracing filter directive. Defaults to "info".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let path = std::env::var("BRIDGE_PATH").unwrap_or_else(|_| "/realtime".to_string());
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "BRIDGE_PATH".to_string(),
                format!("'{}' must start with '/'", path),
            ));
        }

        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&log_filter)
            .map_err(|e| ConfigError::InvalidValue("RUST_LOG".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            path,
            log_filter,
        })
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::new(&self.log_filter)
    }
}
