//! Mapping between the two protocols.
//!
//! Upstream events become client frames or function-call signals; client messages
//! become upstream commands. Nothing here keeps state across events: content streams are
//! forwarded delta by delta and the client assembles them.

use bytes::Bytes;

use crate::audio;
use crate::link::OutboundFrame;
use crate::types::events::command::{
    ConversationItemCreateEvent, InputAudioBufferAppendEvent, ResponseCreateEvent,
};
use crate::types::{InboundMessage, Item, OutboundMessage, UpstreamCommand, UpstreamEvent};

/// Where the outcome of one upstream event goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Client(OutboundFrame),
    Call(CallSignal),
}

/// Function-call progress, handed to the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum CallSignal {
    Started { call_id: String, name: String },
    ArgumentsDelta { call_id: String, delta: String },
    Done { call_id: String, arguments: Option<String> },
}

pub struct Translator {
    fallback_id: String,
}

impl Translator {
    /// `fallback_id` names content streams whose events carry no item id.
    pub fn new(fallback_id: &str) -> Self {
        Self {
            fallback_id: fallback_id.to_string(),
        }
    }

    pub fn upstream_event(&self, event: &UpstreamEvent) -> Vec<Routed> {
        match event {
            UpstreamEvent::SessionCreated(created) => {
                tracing::info!(
                    upstream_session = created.session().id().unwrap_or("unknown"),
                    "realtime session created"
                );
                vec![]
            }
            UpstreamEvent::SessionUpdated(_) => {
                tracing::info!("session configuration updated");
                vec![]
            }
            UpstreamEvent::InputAudioBufferSpeechStarted(_) => {
                vec![client(OutboundMessage::speech_started())]
            }
            UpstreamEvent::InputAudioBufferCommitted(committed) => match committed.transcript() {
                Some(text) if !text.is_empty() => {
                    tracing::debug!(transcription_length = text.len(), "input audio committed");
                    vec![client(OutboundMessage::Transcription {
                        text: text.to_string(),
                    })]
                }
                _ => vec![],
            },
            UpstreamEvent::ResponseAudioDelta(delta) => {
                if delta.delta().is_empty() {
                    return vec![];
                }
                match audio::decode(delta.delta()) {
                    Ok(pcm16) => vec![Routed::Client(OutboundFrame::Audio(Bytes::from(pcm16)))],
                    Err(e) => {
                        tracing::warn!(item_id = ?delta.item_id(), "undecodable audio delta: {}", e);
                        vec![]
                    }
                }
            }
            UpstreamEvent::ResponseAudioTranscriptDelta(delta)
            | UpstreamEvent::ResponseTextDelta(delta) => {
                if delta.delta().is_empty() {
                    return vec![];
                }
                vec![client(OutboundMessage::TextDelta {
                    id: self.content_id(delta.item_id()),
                    delta: delta.delta().to_string(),
                })]
            }
            UpstreamEvent::ResponseAudioTranscriptDone(done)
            | UpstreamEvent::ResponseTextDone(done) => {
                vec![client(OutboundMessage::text_done(&self.content_id(done.item_id())))]
            }
            UpstreamEvent::ResponseOutputItemAdded(added) if added.item().is_function_call() => {
                match added.item().call_id() {
                    Some(call_id) => vec![Routed::Call(CallSignal::Started {
                        call_id: call_id.to_string(),
                        name: added.item().name().unwrap_or_default().to_string(),
                    })],
                    None => {
                        tracing::warn!("function call item without call_id");
                        vec![]
                    }
                }
            }
            UpstreamEvent::ResponseFunctionCall(call) => {
                tracing::debug!(call_id = call.call_id(), name = call.name(), "function call received");
                vec![Routed::Call(CallSignal::Started {
                    call_id: call.call_id().to_string(),
                    name: call.name().to_string(),
                })]
            }
            UpstreamEvent::ResponseFunctionCallArgumentsDelta(delta) => {
                vec![Routed::Call(CallSignal::ArgumentsDelta {
                    call_id: delta.call_id().to_string(),
                    delta: delta.delta().to_string(),
                })]
            }
            UpstreamEvent::ResponseFunctionCallArgumentsDone(done)
            | UpstreamEvent::ResponseFunctionCallDone(done) => {
                vec![Routed::Call(CallSignal::Done {
                    call_id: done.call_id().to_string(),
                    arguments: done.arguments().map(str::to_string),
                })]
            }
            UpstreamEvent::ResponseDone(done) => {
                tracing::debug!(
                    response_id = done.response().id().unwrap_or("unknown"),
                    status = done.response().status().unwrap_or("unknown"),
                    "response generation completed"
                );
                vec![]
            }
            UpstreamEvent::Error(error) => {
                let details = error.error();
                tracing::error!(
                    error_type = details.error_type(),
                    code = details.code().unwrap_or(""),
                    "realtime API error: {}",
                    details.message()
                );
                vec![]
            }
            UpstreamEvent::ConversationItemInputAudioTranscriptionFailed(failed) => {
                tracing::error!(
                    item_id = ?failed.item_id(),
                    "transcription failed: {}",
                    failed.error().map(|e| e.message()).unwrap_or("unknown error")
                );
                vec![]
            }
            UpstreamEvent::ConversationItemInputAudioTranscriptionCompleted(done) => {
                tracing::debug!(item_id = ?done.item_id(), transcript = done.transcript(), "transcription completed");
                vec![]
            }
            UpstreamEvent::InputAudioBufferCleared(_) => {
                tracing::debug!("input audio buffer cleared");
                vec![]
            }
            UpstreamEvent::ResponseAudioDone(done) => {
                tracing::debug!(item_id = ?done.item_id(), "audio response completed");
                vec![]
            }
            UpstreamEvent::ResponseContentPartAdded(part) => {
                tracing::debug!(item_id = ?part.item_id(), "content part added");
                vec![]
            }
            UpstreamEvent::ConversationItemCreated(created) => {
                tracing::debug!(item_id = ?created.item().id(), "conversation item created");
                vec![]
            }
            UpstreamEvent::RateLimitsUpdated(limits) => {
                for limit in limits.rate_limits() {
                    tracing::debug!(name = limit.name(), remaining = limit.remaining(), "rate limit");
                }
                vec![]
            }
            other => {
                tracing::trace!("no client mapping for {:?}", other);
                vec![]
            }
        }
    }

    /// Commands for one client text message. A user message always yields the item
    /// followed by the response trigger.
    pub fn client_message(&self, message: &InboundMessage) -> Vec<UpstreamCommand> {
        match message {
            InboundMessage::UserMessage { text, .. } => vec![
                UpstreamCommand::ConversationItemCreate(ConversationItemCreateEvent::new(
                    Item::user_text(text),
                )),
                UpstreamCommand::ResponseCreate(ResponseCreateEvent::new()),
            ],
            InboundMessage::Init { .. } | InboundMessage::Other => vec![],
        }
    }

    pub fn client_audio(&self, pcm16: &[u8]) -> UpstreamCommand {
        UpstreamCommand::InputAudioBufferAppend(InputAudioBufferAppendEvent::new(audio::encode(
            pcm16,
        )))
    }

    fn content_id(&self, item_id: Option<&str>) -> String {
        item_id.unwrap_or(&self.fallback_id).to_string()
    }
}

fn client(message: OutboundMessage) -> Routed {
    Routed::Client(OutboundFrame::Message(message))
}
