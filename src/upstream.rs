//! Upstream connection adapter.
//!
//! [`open`] connects through a [`Connector`] and immediately configures the realtime
//! session. [`RealtimeConnector`] is the production connector; it runs one writer task
//! and one reader task per socket.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::config::Config;
use crate::credential::CredentialProvider;
use crate::error::{BridgeError, Result};
use crate::link::UpstreamLink;
use crate::types::audio::{AudioFormat, ServerVadTurnDetection, TranscriptionModel, TurnDetection, Voice};
use crate::types::events::command::SessionUpdateEvent;
use crate::types::tools::{FunctionTool, Tool, ToolChoice};
use crate::types::{Session, UpstreamCommand, UpstreamEvent};

pub(crate) mod consts;
mod utils;

pub use utils::{build_request, endpoint_url};

/// Establishes the transport to the realtime service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<UpstreamLink>;
}

/// Opens an upstream link and sends the session configuration built from `instructions`.
pub async fn open(connector: &dyn Connector, instructions: &str) -> Result<UpstreamLink> {
    let link = connector.connect().await?;
    let update = UpstreamCommand::SessionUpdate(SessionUpdateEvent::new(session_config(
        instructions,
    )));
    link.send(update)
        .await
        .map_err(|e| BridgeError::Connect(format!("session configuration not sent: {}", e)))?;
    Ok(link)
}

/// The fixed realtime session configuration, with the caller's instructions.
pub fn session_config(instructions: &str) -> Session {
    let turn_detection = TurnDetection::ServerVad(ServerVadTurnDetection::new(
        consts::VAD_THRESHOLD,
        consts::VAD_SILENCE_DURATION_MS,
    ));

    Session::builder()
        .with_modalities_enable_audio()
        .with_instructions(instructions)
        .with_voice(Voice::Alloy)
        .with_input_audio_format(AudioFormat::Pcm16)
        .with_input_audio_transcription_enable(TranscriptionModel::Whisper)
        .with_turn_detection_enable(turn_detection)
        .with_tools(vec![Tool::Function(FunctionTool::new(
            consts::TOOL_NAME,
            consts::TOOL_DESCRIPTION,
            tool_parameters(),
        ))])
        .with_tool_choice(ToolChoice::Auto)
        .build()
}

fn tool_parameters() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "tab": { "type": "string" },
            "information": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "dob": { "type": "string" },
                    "gender": { "type": "string" },
                },
                "required": ["name", "dob", "gender"],
            },
            "symptoms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "number" },
                        "description": { "type": "string" },
                        "duration": { "type": "string" },
                        "severity": { "type": "number" },
                    },
                    "required": ["id", "description", "duration", "severity"],
                },
            },
            "vitals": {
                "type": "object",
                "properties": {
                    "temperature": { "type": "number" },
                    "bloodPressure": { "type": "string" },
                    "heartRate": { "type": "number" },
                },
                "required": ["temperature", "bloodPressure", "heartRate"],
            },
        },
        "required": ["tab", "information", "symptoms", "vitals"],
    })
}

/// Connects to the OpenAI or Azure realtime endpoint over a websocket.
pub struct RealtimeConnector {
    config: Arc<Config>,
    credentials: Arc<dyn CredentialProvider>,
}

impl RealtimeConnector {
    pub fn new(config: Arc<Config>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl Connector for RealtimeConnector {
    async fn connect(&self) -> Result<UpstreamLink> {
        let token = self
            .credentials
            .get_token(utils::token_scope(&self.config))
            .await
            .map_err(|e| BridgeError::Connect(e.to_string()))?;
        if token.is_expired(SystemTime::now()) {
            return Err(BridgeError::Connect("credential has expired".to_string()));
        }

        let request = build_request(&self.config, &token)?;
        tracing::debug!("connecting to {}", request.uri());
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;

        Ok(spawn_transport(ws_stream, self.config.channel_capacity()))
    }
}

/// Splits the socket and pumps it through a new [`UpstreamLink`].
pub fn spawn_transport<S>(ws_stream: WebSocketStream<S>, capacity: usize) -> UpstreamLink
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws_stream.split();
    let (mut link, endpoint) = UpstreamLink::channel(capacity);
    let mut commands = endpoint.commands;
    let mut shutdown = endpoint.shutdown;
    let events = endpoint.events;

    // Only this task writes to the socket.
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    match serde_json::to_string(&command) {
                        Ok(text) => {
                            tracing::debug!("sending {}", command.kind());
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                                break;
                            }
                        }
                        Err(e) => tracing::error!("failed to serialize command: {}", e),
                    }
                }
                _ = &mut shutdown => break,
            }
        }
        if let Err(e) = write.send(Message::Close(None)).await {
            tracing::debug!("close frame not sent: {}", e);
        }
    });

    let reader = tokio::spawn(async move {
        // Once the session stops listening keep draining, so the close handshake can finish.
        let mut forwarding = true;
        while let Some(message) = read.next().await {
            let message = match message {
                Err(e) => {
                    tracing::error!("failed to read message: {}", e);
                    break;
                }
                Ok(message) => message,
            };
            match message {
                Message::Text(text) => {
                    let Some(event) = parse_event(&text) else { continue };
                    if forwarding && events.send(event).await.is_err() {
                        forwarding = false;
                    }
                }
                Message::Binary(bin) => {
                    tracing::warn!("unexpected binary message: {} bytes", bin.len());
                }
                Message::Close(reason) => {
                    tracing::info!("upstream connection closed: {:?}", reason);
                    if forwarding {
                        let close = UpstreamEvent::Close {
                            reason: reason.map(|frame| frame.reason.to_string()),
                        };
                        let _ = events.send(close).await;
                    }
                    break;
                }
                _ => {}
            }
        }
    });

    link.attach(reader);
    link.attach(writer);
    link
}

/// Parses one upstream text frame. Malformed frames are logged and dropped.
fn parse_event(text: &str) -> Option<UpstreamEvent> {
    let json = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("{}, text=> {:?}", BridgeError::MalformedMessage(e), text);
            return None;
        }
    };
    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");
    let event_id = json.get("event_id").and_then(|v| v.as_str());
    tracing::debug!(
        "received message: {}, id={}",
        event_type,
        event_id.unwrap_or("unknown")
    );

    match serde_json::from_value::<UpstreamEvent>(json.clone()) {
        Ok(UpstreamEvent::Unknown) => {
            tracing::debug!("{}", BridgeError::UnhandledEventType(event_type.to_string()));
            Some(UpstreamEvent::Unknown)
        }
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("failed to deserialize event: {}, type=> {}", e, event_type);
            None
        }
    }
}
