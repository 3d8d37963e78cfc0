//! Bridge configuration.
//!
//! Everything can be set through [`ConfigBuilder`]; [`Config::from_env`] reads the same
//! settings from the environment (and a `.env` file, when present).

use std::env;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use secrecy::SecretString;

use crate::upstream::consts::{
    AZURE_API_VERSION, BASE_URL, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CLOSE_GRACE_MS,
    DEFAULT_MAX_PENDING_CALLS, DEFAULT_MODEL, DEFAULT_PENDING_CALL_TTL_SECS,
};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which flavour of the realtime service to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    OpenAI,
    Azure,
}

#[derive(Debug)]
pub struct Config {
    backend: Backend,
    base_url: String,
    model: String,
    endpoint: Option<String>,
    deployment: Option<String>,
    api_version: String,
    secret: SecretString,
    secret_expires_at: Option<SystemTime>,
    channel_capacity: usize,
    close_grace: Duration,
    max_pending_calls: usize,
    pending_call_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_deployment(mut self, deployment: &str) -> Self {
        self.config.deployment = Some(deployment.to_string());
        self
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.config.api_version = api_version.to_string();
        self
    }

    /// API key (OpenAI) or pre-issued bearer token (Azure).
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.config.secret = SecretString::from(secret.to_string());
        self
    }

    pub fn with_secret_expiry(mut self, expires_at: SystemTime) -> Self {
        self.config.secret_expires_at = Some(expires_at);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.config.close_grace = grace;
        self
    }

    pub fn with_max_pending_calls(mut self, max: usize) -> Self {
        self.config.max_pending_calls = max.max(1);
        self
    }

    pub fn with_pending_call_ttl(mut self, ttl: Duration) -> Self {
        self.config.pending_call_ttl = ttl;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend: Backend::OpenAI,
            base_url: BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            deployment: None,
            api_version: AZURE_API_VERSION.to_string(),
            secret: SecretString::from(String::new()),
            secret_expires_at: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            close_grace: Duration::from_millis(DEFAULT_CLOSE_GRACE_MS),
            max_pending_calls: DEFAULT_MAX_PENDING_CALLS,
            pending_call_ttl: Duration::from_secs(DEFAULT_PENDING_CALL_TTL_SECS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads configuration from environment variables.
    ///
    /// *   `BACKEND`: `openai` (default) or `azure`.
    /// *   `OPENAI_API_KEY`: required for the `openai` backend.
    /// *   `OPENAI_MODEL`: model for the `openai` backend.
    /// *   `OPENAI_ENDPOINT`, `OPENAI_DEPLOYMENT`: required for the `azure` backend.
    /// *   `OPENAI_API_VERSION`: api-version query parameter for `azure`.
    /// *   `AZURE_OPENAI_TOKEN`: bearer token for `azure`.
    /// *   `AZURE_OPENAI_TOKEN_EXPIRES_AT`: optional token expiry, unix seconds.
    /// *   `BRIDGE_CLOSE_GRACE_MS`, `BRIDGE_CHANNEL_CAPACITY`, `BRIDGE_MAX_PENDING_CALLS`,
    ///     `BRIDGE_PENDING_CALL_TTL_SECS`: session tuning.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let backend = match env::var("BACKEND")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "azure" => Backend::Azure,
            _ => Backend::OpenAI,
        };

        let mut builder = Config::builder().with_backend(backend.clone());

        if let Ok(model) = env::var("OPENAI_MODEL") {
            builder = builder.with_model(&model);
        }
        if let Ok(version) = env::var("OPENAI_API_VERSION") {
            builder = builder.with_api_version(&version);
        }
        if let Some(grace) = parse_var::<u64>("BRIDGE_CLOSE_GRACE_MS")? {
            builder = builder.with_close_grace(Duration::from_millis(grace));
        }
        if let Some(capacity) = parse_var::<usize>("BRIDGE_CHANNEL_CAPACITY")? {
            builder = builder.with_channel_capacity(capacity);
        }
        if let Some(max) = parse_var::<usize>("BRIDGE_MAX_PENDING_CALLS")? {
            builder = builder.with_max_pending_calls(max);
        }
        if let Some(ttl) = parse_var::<u64>("BRIDGE_PENDING_CALL_TTL_SECS")? {
            builder = builder.with_pending_call_ttl(Duration::from_secs(ttl));
        }

        // Validate that the required values are present for the selected backend.
        match backend {
            Backend::OpenAI => {
                let key = required_var("OPENAI_API_KEY")?;
                builder = builder.with_secret(&key);
            }
            Backend::Azure => {
                builder = builder
                    .with_endpoint(&required_var("OPENAI_ENDPOINT")?)
                    .with_deployment(&required_var("OPENAI_DEPLOYMENT")?)
                    .with_secret(&required_var("AZURE_OPENAI_TOKEN")?);
                if let Some(secs) = parse_var::<u64>("AZURE_OPENAI_TOKEN_EXPIRES_AT")? {
                    builder = builder.with_secret_expiry(UNIX_EPOCH + Duration::from_secs(secs));
                }
            }
        }

        Ok(builder.build())
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn deployment(&self) -> Option<&str> {
        self.deployment.as_deref()
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub fn secret_expires_at(&self) -> Option<SystemTime> {
        self.secret_expires_at
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn close_grace(&self) -> Duration {
        self.close_grace
    }

    pub fn max_pending_calls(&self) -> usize {
        self.max_pending_calls
    }

    pub fn pending_call_ttl(&self) -> Duration {
        self.pending_call_ttl
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}
