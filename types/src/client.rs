//! Client-facing protocol: JSON text frames exchanged with the browser.
//!
//! Audio travels in binary frames on that connection and has no JSON shape.

/// Messages a client may send as text frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// First message on a connection. Instructions are forwarded verbatim, even when empty.
    #[serde(rename = "init")]
    Init {
        #[serde(default)]
        instructions: String,
    },
    #[serde(rename = "user_message")]
    UserMessage {
        #[serde(default)]
        id: Option<String>,
        text: String,
    },
    #[serde(other)]
    Other,
}

/// What a `control` message signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    SpeechStarted,
    TextDone,
}

/// Messages the bridge sends to a client as text frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "transcription")]
    Transcription { text: String },
    #[serde(rename = "text_delta")]
    TextDelta { id: String, delta: String },
    #[serde(rename = "control")]
    Control {
        action: ControlAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl OutboundMessage {
    pub fn speech_started() -> Self {
        OutboundMessage::Control {
            action: ControlAction::SpeechStarted,
            id: None,
        }
    }

    pub fn text_done(id: &str) -> Self {
        OutboundMessage::Control {
            action: ControlAction::TextDone,
            id: Some(id.to_string()),
        }
    }
}
