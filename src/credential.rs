use std::time::SystemTime;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::Config;
use crate::error::{BridgeError, Result};

/// A credential handed out by a [`CredentialProvider`].
#[derive(Debug)]
pub struct AccessToken {
    token: SecretString,
    expires_at: Option<SystemTime>,
}

impl AccessToken {
    pub fn new(token: SecretString, expires_at: Option<SystemTime>) -> Self {
        Self { token, expires_at }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Source of upstream credentials, asked once per session open.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Hands out one fixed secret: an API key or a pre-issued bearer token.
pub struct StaticCredential {
    secret: SecretString,
    expires_at: Option<SystemTime>,
}

impl StaticCredential {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            expires_at: None,
        }
    }

    /// The API key or bearer token the configuration was loaded with.
    pub fn from_config(config: &Config) -> Self {
        let credential = Self::new(SecretString::from(config.secret().expose_secret().to_string()));
        match config.secret_expires_at() {
            Some(expires_at) => credential.with_expiry(expires_at),
            None => credential,
        }
    }

    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(BridgeError::Credential("no secret configured".to_string()));
        }
        Ok(AccessToken::new(
            SecretString::from(secret.to_string()),
            self.expires_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn static_credential_returns_its_secret() {
        let provider = StaticCredential::new(SecretString::from("sk-test".to_string()));
        let token = provider.get_token("openai").await.unwrap();
        assert_eq!(token.token().expose_secret(), "sk-test");
        assert!(!token.is_expired(SystemTime::now()));
    }

    #[tokio::test]
    async fn empty_secret_is_a_credential_error() {
        let provider = StaticCredential::new(SecretString::from(String::new()));
        let err = provider.get_token("openai").await.unwrap_err();
        assert!(matches!(err, BridgeError::Credential(_)));
    }

    #[tokio::test]
    async fn credential_from_config_uses_configured_secret() {
        let config = Config::builder().with_secret("sk-config").build();
        let token = StaticCredential::from_config(&config)
            .get_token("openai")
            .await
            .unwrap();
        assert_eq!(token.token().expose_secret(), "sk-config");
    }

    #[tokio::test]
    async fn credential_from_config_carries_token_expiry() {
        let expires_at = SystemTime::now() - Duration::from_secs(60);
        let config = Config::builder()
            .with_secret("bearer")
            .with_secret_expiry(expires_at)
            .build();
        let token = StaticCredential::from_config(&config)
            .get_token("azure")
            .await
            .unwrap();
        assert_eq!(token.expires_at(), Some(expires_at));
        assert!(token.is_expired(SystemTime::now()));
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = SystemTime::now();
        let token = AccessToken::new(SecretString::from("t".to_string()), Some(now));
        assert!(token.is_expired(now));
        assert!(!token.is_expired(now - Duration::from_secs(1)));
    }
}
