//! Payloads of the events the realtime service sends.
//!
//! Fields the bridge does not rely on are optional so that a newer service
//! revision adding or dropping bookkeeping fields still parses.

mod error;

pub use error::ErrorDetails;

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: Option<String>,

    /// Details about the error
    error: ErrorDetails,
}

impl ErrorEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn error(&self) -> &ErrorDetails {
        &self.error
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionResource {
    id: Option<String>,
    model: Option<String>,
}

impl SessionResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// `session.created` / `session.updated` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionEvent {
    event_id: Option<String>,
    session: SessionResource,
}

impl SessionEvent {
    pub fn session(&self) -> &SessionResource {
        &self.session
    }
}

/// `input_audio_buffer.speech_started` / `input_audio_buffer.speech_stopped` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InputAudioBufferSpeechEvent {
    event_id: Option<String>,
    /// Milliseconds since the session started
    #[serde(alias = "audio_end_ms")]
    audio_start_ms: Option<i64>,
    /// The ID of the user message item that will be created
    item_id: Option<String>,
}

impl InputAudioBufferSpeechEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `input_audio_buffer.committed` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InputAudioBufferCommittedEvent {
    event_id: Option<String>,
    /// The ID of the preceding item after which the new item will be inserted
    previous_item_id: Option<String>,
    /// The ID of the user message item that will be created
    item_id: Option<String>,
    /// Transcript of the committed audio, when the service attaches one
    transcript: Option<String>,
}

impl InputAudioBufferCommittedEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }
}

/// `input_audio_buffer.cleared` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InputAudioBufferClearedEvent {
    event_id: Option<String>,
}

/// Loose view of a conversation item: only what routing needs.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ItemResource {
    id: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    role: Option<String>,
    /// Set for `function_call` items
    call_id: Option<String>,
    /// Set for `function_call` items
    name: Option<String>,
}

impl ItemResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn call_id(&self) -> Option<&str> {
        self.call_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_function_call(&self) -> bool {
        self.item_type.as_deref() == Some("function_call")
    }
}

/// `conversation.item.created` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConversationItemCreatedEvent {
    event_id: Option<String>,
    previous_item_id: Option<String>,
    item: ItemResource,
}

impl ConversationItemCreatedEvent {
    pub fn item(&self) -> &ItemResource {
        &self.item
    }
}

/// `conversation.item.input_audio_transcription.completed` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TranscriptionCompletedEvent {
    event_id: Option<String>,
    item_id: Option<String>,
    content_index: Option<i32>,
    transcript: String,
}

impl TranscriptionCompletedEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

/// `conversation.item.input_audio_transcription.failed` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TranscriptionFailedEvent {
    event_id: Option<String>,
    item_id: Option<String>,
    error: Option<ErrorDetails>,
}

impl TranscriptionFailedEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn error(&self) -> Option<&ErrorDetails> {
        self.error.as_ref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Usage {
    total_tokens: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl Usage {
    pub fn new(total_tokens: u64, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            total_tokens,
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResponseResource {
    id: Option<String>,
    /// "in_progress", "completed", "cancelled", "failed" or "incomplete"
    status: Option<String>,
    usage: Option<Usage>,
}

impl ResponseResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

/// `response.created` / `response.done` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResponseEvent {
    event_id: Option<String>,
    response: ResponseResource,
}

impl ResponseEvent {
    pub fn response(&self) -> &ResponseResource {
        &self.response
    }
}

/// `response.output_item.added` / `response.output_item.done` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputItemEvent {
    event_id: Option<String>,
    response_id: Option<String>,
    output_index: Option<i32>,
    item: ItemResource,
}

impl OutputItemEvent {
    pub fn item(&self) -> &ItemResource {
        &self.item
    }
}

/// `response.content_part.added` / `response.content_part.done` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContentPartEvent {
    event_id: Option<String>,
    response_id: Option<String>,
    item_id: Option<String>,
    output_index: Option<i32>,
    content_index: Option<i32>,
}

impl ContentPartEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// `response.text.delta`, `response.audio_transcript.delta` and `response.audio.delta` events
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContentDeltaEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
    /// The ID of the item
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    output_index: Option<i32>,
    #[serde(default)]
    content_index: Option<i32>,
    /// Text fragment, or base64 audio for `response.audio.delta`
    #[serde(default)]
    delta: String,
}

impl ContentDeltaEvent {
    pub fn response_id(&self) -> Option<&str> {
        self.response_id.as_deref()
    }

    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn content_index(&self) -> Option<i32> {
        self.content_index
    }

    pub fn delta(&self) -> &str {
        &self.delta
    }
}

/// `response.text.done`, `response.audio_transcript.done` and `response.audio.done` events
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ContentDoneEvent {
    event_id: Option<String>,
    response_id: Option<String>,
    item_id: Option<String>,
    output_index: Option<i32>,
    content_index: Option<i32>,
    /// Full text, for `response.text.done`
    text: Option<String>,
    /// Full transcript, for `response.audio_transcript.done`
    transcript: Option<String>,
}

impl ContentDoneEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }
}

/// `response.function_call` event, announcing a tool invocation
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionCallStartedEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    /// The ID of the function call
    call_id: String,
    /// The name of the invoked tool
    #[serde(default)]
    name: String,
}

impl FunctionCallStartedEvent {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// `response.function_call_arguments.delta` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionCallArgumentsDeltaEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
    /// The ID of the function call item
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    output_index: Option<i32>,
    /// The ID of the function call
    call_id: String,
    /// The delta in the function calling arguments
    delta: String,
}

impl FunctionCallArgumentsDeltaEvent {
    pub fn item_id(&self) -> Option<&str> {
        self.item_id.as_deref()
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn delta(&self) -> &str {
        &self.delta
    }
}

/// `response.function_call_arguments.done` / `response.function_call.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionCallArgumentsDoneEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
    #[serde(default)]
    item_id: Option<String>,
    #[serde(default)]
    output_index: Option<i32>,
    /// The ID of the function call
    call_id: String,
    /// Newer service revisions repeat the tool name here
    #[serde(default)]
    name: Option<String>,
    /// The completed function calling arguments
    #[serde(default)]
    arguments: Option<String>,
}

impl FunctionCallArgumentsDoneEvent {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref().filter(|args| !args.is_empty())
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RateLimitInformation {
    /// The name of the rate limit ("requests", "tokens")
    name: String,
    limit: u64,
    remaining: u64,
    reset_seconds: f64,
}

impl RateLimitInformation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

/// `rate_limits.updated` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RateLimitsUpdatedEvent {
    event_id: Option<String>,
    rate_limits: Vec<RateLimitInformation>,
}

impl RateLimitsUpdatedEvent {
    pub fn rate_limits(&self) -> &[RateLimitInformation] {
        &self.rate_limits
    }
}
