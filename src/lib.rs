mod audio;
pub mod config;
pub mod credential;
pub mod error;
pub mod link;
pub mod session;
pub mod upstream;

pub use realtime_bridge_types as types;

pub use config::{Backend, Config, ConfigError};
pub use credential::{AccessToken, CredentialProvider, StaticCredential};
pub use error::{BridgeError, Result};
pub use link::{ClientEndpoint, ClientLink, InboundFrame, OutboundFrame, UpstreamEndpoint, UpstreamLink};
pub use session::{accept, SessionOptions, SessionState, Stats};
pub use upstream::{open, Connector, RealtimeConnector};
