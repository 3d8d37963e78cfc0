use thiserror::Error;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Failures a session deals with. None of these leave the session that raised them.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The upstream service could not be reached or refused the handshake.
    #[error("failed to connect upstream: {0}")]
    Connect(String),

    /// No usable credential for the upstream service.
    #[error("credential unavailable: {0}")]
    Credential(String),

    /// A frame on either link was not valid JSON for its protocol.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// The accumulated arguments of a finished tool call are not valid JSON.
    #[error("malformed arguments for function call {call_id}: {source}")]
    MalformedFunctionArguments {
        call_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A completion arrived for a call that is not pending (never started, already
    /// completed, or evicted).
    #[error("no pending function call with id {0}")]
    UnknownFunctionCall(String),

    /// The link is closed or its writer has gone away.
    #[error("{0} link closed")]
    LinkClosed(&'static str),

    #[error("unhandled upstream event type: {0}")]
    UnhandledEventType(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::Connect(e.to_string())
    }
}
