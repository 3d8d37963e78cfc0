use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::config::{Backend, Config};
use crate::credential::AccessToken;
use crate::upstream::consts::{
    AUTHORIZATION_HEADER, AZURE_TOKEN_SCOPE, OPENAI_BETA_HEADER, OPENAI_BETA_VALUE,
    OPENAI_TOKEN_SCOPE,
};

pub fn endpoint_url(config: &Config) -> String {
    match config.backend() {
        Backend::OpenAI => format!(
            "{}/realtime?model={}",
            config.base_url().trim_end_matches('/'),
            config.model()
        ),
        Backend::Azure => format!(
            "{}/openai/realtime?deployment={}&api-version={}",
            websocket_scheme(config.endpoint().unwrap_or_default()).trim_end_matches('/'),
            config.deployment().unwrap_or_default(),
            config.api_version()
        ),
    }
}

pub fn token_scope(config: &Config) -> &'static str {
    match config.backend() {
        Backend::OpenAI => OPENAI_TOKEN_SCOPE,
        Backend::Azure => AZURE_TOKEN_SCOPE,
    }
}

pub fn build_request(
    config: &Config,
    token: &AccessToken,
) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = endpoint_url(config).into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Bearer {}", token.token().expose_secret())
            .as_str()
            .parse()?,
    );
    request
        .headers_mut()
        .insert(OPENAI_BETA_HEADER, OPENAI_BETA_VALUE.parse()?);
    Ok(request)
}

fn websocket_scheme(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = endpoint.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn token() -> AccessToken {
        AccessToken::new(SecretString::from("secret".to_string()), None)
    }

    #[test]
    fn openai_request_carries_model_and_headers() {
        let config = Config::builder().with_secret("secret").build();
        let request = build_request(&config, &token()).unwrap();
        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Bearer secret");
        assert_eq!(request.headers()[OPENAI_BETA_HEADER], "realtime=v1");
    }

    #[test]
    fn azure_endpoint_is_rewritten_to_websocket() {
        let config = Config::builder()
            .with_backend(Backend::Azure)
            .with_endpoint("https://contoso.openai.azure.com/")
            .with_deployment("rt")
            .build();
        assert_eq!(
            endpoint_url(&config),
            "wss://contoso.openai.azure.com/openai/realtime?deployment=rt&api-version=2024-10-01-preview"
        );
        assert_eq!(token_scope(&config), AZURE_TOKEN_SCOPE);
    }
}
