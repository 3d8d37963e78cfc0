pub mod command;
pub mod event;

use command::*;
use event::*;

/// Commands the bridge sends to the realtime service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamCommand {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend(InputAudioBufferAppendEvent),
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate(ConversationItemCreateEvent),
    #[serde(rename = "response.create")]
    ResponseCreate(ResponseCreateEvent),
}

impl UpstreamCommand {
    /// The wire tag of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamCommand::SessionUpdate(_) => "session.update",
            UpstreamCommand::InputAudioBufferAppend(_) => "input_audio_buffer.append",
            UpstreamCommand::ConversationItemCreate(_) => "conversation.item.create",
            UpstreamCommand::ResponseCreate(_) => "response.create",
        }
    }
}

/// Events emitted by the realtime service.
///
/// Kinds the bridge does not know land in `Unknown` instead of failing to parse.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    /// Synthesized by the transport when the socket closes; never sent by the service.
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(InputAudioBufferSpeechEvent),
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped(InputAudioBufferSpeechEvent),
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted(InputAudioBufferCommittedEvent),
    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared(InputAudioBufferClearedEvent),
    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated(ConversationItemCreatedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(TranscriptionCompletedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    ConversationItemInputAudioTranscriptionFailed(TranscriptionFailedEvent),
    #[serde(rename = "response.created")]
    ResponseCreated(ResponseEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseEvent),
    #[serde(rename = "response.output_item.added")]
    ResponseOutputItemAdded(OutputItemEvent),
    #[serde(rename = "response.output_item.done")]
    ResponseOutputItemDone(OutputItemEvent),
    #[serde(rename = "response.content_part.added")]
    ResponseContentPartAdded(ContentPartEvent),
    #[serde(rename = "response.content_part.done")]
    ResponseContentPartDone(ContentPartEvent),
    #[serde(rename = "response.text.delta")]
    ResponseTextDelta(ContentDeltaEvent),
    #[serde(rename = "response.text.done")]
    ResponseTextDone(ContentDoneEvent),
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta(ContentDeltaEvent),
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone(ContentDoneEvent),
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta(ContentDeltaEvent),
    #[serde(rename = "response.audio.done")]
    ResponseAudioDone(ContentDoneEvent),
    #[serde(rename = "response.function_call")]
    ResponseFunctionCall(FunctionCallStartedEvent),
    #[serde(rename = "response.function_call_arguments.delta")]
    ResponseFunctionCallArgumentsDelta(FunctionCallArgumentsDeltaEvent),
    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone(FunctionCallArgumentsDoneEvent),
    #[serde(rename = "response.function_call.done")]
    ResponseFunctionCallDone(FunctionCallArgumentsDoneEvent),
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated(RateLimitsUpdatedEvent),
    #[serde(other)]
    Unknown,
}
