//! One client connection paired with one upstream connection.
//!
//! A session waits for the client's `init` message, opens the upstream link with the
//! instructions it carries, then relays both directions from a single task until either
//! side goes away. Both links are closed on the way out, whichever side ended first.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::link::{ClientLink, InboundFrame, UpstreamLink};
use crate::types::events::command::ConversationItemCreateEvent;
use crate::types::{InboundMessage, Item, UpstreamCommand, UpstreamEvent};
use crate::upstream::{self, consts, Connector};

mod accumulator;
mod stats;
mod translate;

pub use accumulator::{CompletedCall, FunctionCallAccumulator, PendingFunctionCall};
pub use stats::Stats;
pub use translate::{CallSignal, Routed, Translator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Active,
    Closing,
    Closed,
}

/// Per-session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    close_grace: Duration,
    max_pending_calls: usize,
    pending_call_ttl: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            close_grace: Duration::from_millis(consts::DEFAULT_CLOSE_GRACE_MS),
            max_pending_calls: consts::DEFAULT_MAX_PENDING_CALLS,
            pending_call_ttl: Duration::from_secs(consts::DEFAULT_PENDING_CALL_TTL_SECS),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            close_grace: config.close_grace(),
            max_pending_calls: config.max_pending_calls(),
            pending_call_ttl: config.pending_call_ttl(),
        }
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn with_max_pending_calls(mut self, max: usize) -> Self {
        self.max_pending_calls = max;
        self
    }

    pub fn with_pending_call_ttl(mut self, ttl: Duration) -> Self {
        self.pending_call_ttl = ttl;
        self
    }
}

/// Runs a session on an accepted client link until both links are closed.
///
/// Returns the token usage reported by the upstream service over the session.
pub async fn accept(
    client: ClientLink,
    connector: Arc<dyn Connector>,
    options: SessionOptions,
) -> Stats {
    let id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("session", session_id = %id);
    Session::new(&id, client, &options)
        .run(connector.as_ref())
        .instrument(span)
        .await
}

enum Step {
    Client(Option<InboundFrame>),
    Upstream(Option<UpstreamEvent>),
}

struct Session {
    state: SessionState,
    client: ClientLink,
    upstream: Option<UpstreamLink>,
    calls: FunctionCallAccumulator,
    translator: Translator,
    stats: Stats,
    close_grace: Duration,
}

impl Session {
    fn new(id: &str, client: ClientLink, options: &SessionOptions) -> Self {
        Self {
            state: SessionState::Initializing,
            client,
            upstream: None,
            calls: FunctionCallAccumulator::new(options.max_pending_calls, options.pending_call_ttl),
            translator: Translator::new(id),
            stats: Stats::new(),
            close_grace: options.close_grace,
        }
    }

    async fn run(mut self, connector: &dyn Connector) -> Stats {
        match self.await_init().await {
            Some(instructions) => {
                if self.initialize(connector, &instructions).await.is_ok() {
                    self.relay().await;
                }
            }
            None => tracing::info!("client left before init"),
        }
        self.teardown().await;
        self.stats
    }

    /// Reads client frames until `init`. Anything before it is dropped.
    async fn await_init(&mut self) -> Option<String> {
        while let Some(frame) = self.client.recv().await {
            match frame {
                InboundFrame::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                    Ok(InboundMessage::Init { instructions }) => return Some(instructions),
                    Ok(message) => tracing::debug!("ignoring {:?} before init", message),
                    Err(e) => tracing::warn!("dropping client frame: {}", BridgeError::from(e)),
                },
                InboundFrame::Binary(audio) => {
                    tracing::debug!(bytes = audio.len(), "ignoring audio before init")
                }
            }
        }
        None
    }

    async fn initialize(&mut self, connector: &dyn Connector, instructions: &str) -> Result<()> {
        if instructions.is_empty() {
            tracing::warn!("init carried no instructions, forwarding as is");
        }
        let link = upstream::open(connector, instructions).await.map_err(|e| {
            tracing::error!("upstream unavailable: {}", e);
            e
        })?;
        self.upstream = Some(link);
        self.state = SessionState::Active;
        tracing::info!("session active");
        Ok(())
    }

    async fn relay(&mut self) {
        while self.state == SessionState::Active {
            let Some(upstream) = self.upstream.as_mut() else {
                break;
            };
            let step = tokio::select! {
                frame = self.client.recv() => Step::Client(frame),
                event = upstream.next_event() => Step::Upstream(event),
            };

            match step {
                Step::Client(Some(frame)) => self.on_client_frame(frame).await,
                Step::Client(None) => {
                    tracing::info!("client disconnected");
                    break;
                }
                Step::Upstream(Some(UpstreamEvent::Close { reason })) => {
                    tracing::info!(reason = ?reason, "upstream closed");
                    break;
                }
                Step::Upstream(Some(event)) => self.on_upstream_event(event).await,
                Step::Upstream(None) => {
                    tracing::warn!("upstream transport ended without close");
                    break;
                }
            }
        }
    }

    async fn on_client_frame(&mut self, frame: InboundFrame) {
        if self.state != SessionState::Active {
            tracing::trace!(state = ?self.state, "dropping client frame");
            return;
        }

        let commands = match frame {
            InboundFrame::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(InboundMessage::Init { .. }) => {
                    tracing::warn!("ignoring repeated init");
                    return;
                }
                Ok(InboundMessage::Other) => {
                    tracing::debug!("ignoring unknown client message");
                    return;
                }
                Ok(message) => self.translator.client_message(&message),
                Err(e) => {
                    tracing::warn!("dropping client frame: {}", BridgeError::from(e));
                    return;
                }
            },
            InboundFrame::Binary(audio) if audio.is_empty() => return,
            InboundFrame::Binary(audio) => vec![self.translator.client_audio(&audio)],
        };

        for command in commands {
            self.send_upstream(command).await;
        }
    }

    async fn on_upstream_event(&mut self, event: UpstreamEvent) {
        if self.state != SessionState::Active {
            return;
        }
        if let UpstreamEvent::ResponseDone(done) = &event {
            if let Some(usage) = done.response().usage() {
                self.stats.update_usage(usage);
            }
        }

        for routed in self.translator.upstream_event(&event) {
            match routed {
                Routed::Client(frame) => {
                    if let Err(e) = self.client.send(frame).await {
                        tracing::debug!("client frame not delivered: {}", e);
                    }
                }
                Routed::Call(signal) => self.on_call_signal(signal).await,
            }
        }
    }

    async fn on_call_signal(&mut self, signal: CallSignal) {
        match signal {
            CallSignal::Started { call_id, name } => {
                tracing::debug!(call_id = %call_id, name = %name, "function call started");
                self.calls.start(&call_id, &name);
            }
            CallSignal::ArgumentsDelta { call_id, delta } => self.calls.append(&call_id, &delta),
            CallSignal::Done { call_id, arguments } => {
                match self.calls.complete(&call_id, arguments.as_deref()) {
                    Ok(call) => {
                        tracing::info!(call_id = %call.call_id, name = ?call.name, "function call completed");
                        let item = Item::function_call_output(&call.call_id, &call.output());
                        self.send_upstream(UpstreamCommand::ConversationItemCreate(
                            ConversationItemCreateEvent::new(item),
                        ))
                        .await;
                    }
                    Err(e) => tracing::warn!("function call dropped: {}", e),
                }
            }
        }
    }

    async fn send_upstream(&mut self, command: UpstreamCommand) {
        let Some(upstream) = self.upstream.as_ref() else {
            return;
        };
        let kind = command.kind();
        if let Err(e) = upstream.send(command).await {
            tracing::warn!(command = kind, "{}", e);
        }
    }

    /// Closes whichever links are still open. Safe to call more than once.
    async fn teardown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        tracing::debug!("session closing");

        if let Some(upstream) = self.upstream.as_mut() {
            if upstream.close(self.close_grace).await {
                tracing::debug!("upstream link closed");
            }
        }
        if self.client.close().await {
            tracing::debug!("client link closed");
        }
        if !self.calls.is_empty() {
            tracing::debug!(pending = self.calls.len(), "discarding unfinished function calls");
        }

        self.state = SessionState::Closed;
        tracing::info!(
            responses = self.stats.responses(),
            total_tokens = self.stats.total_tokens(),
            input_tokens = self.stats.input_tokens(),
            output_tokens = self.stats.output_tokens(),
            "session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ClientEndpoint, OutboundFrame, UpstreamEndpoint};
    use crate::types::OutboundMessage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    struct FakeConnector {
        link: Mutex<Option<UpstreamLink>>,
        connects: AtomicUsize,
    }

    impl FakeConnector {
        fn new() -> (Arc<Self>, UpstreamEndpoint) {
            let (link, endpoint) = UpstreamLink::channel(32);
            let connector = Arc::new(Self {
                link: Mutex::new(Some(link)),
                connects: AtomicUsize::new(0),
            });
            (connector, endpoint)
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self) -> Result<UpstreamLink> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.link
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| BridgeError::Connect("already connected".to_string()))
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self) -> Result<UpstreamLink> {
            Err(BridgeError::Connect("401 Unauthorized".to_string()))
        }
    }

    fn options() -> SessionOptions {
        SessionOptions::default().with_close_grace(Duration::from_millis(50))
    }

    fn text(value: serde_json::Value) -> InboundFrame {
        InboundFrame::Text(value.to_string())
    }

    fn event(value: serde_json::Value) -> UpstreamEvent {
        serde_json::from_value(value).unwrap()
    }

    async fn start(
        connector: Arc<dyn Connector>,
    ) -> (tokio::task::JoinHandle<Stats>, ClientEndpoint) {
        let (client, endpoint) = ClientLink::channel(32);
        let session = tokio::spawn(accept(client, connector, options()));
        (session, endpoint)
    }

    async fn init(
        inbound: &mpsc::Sender<InboundFrame>,
        upstream: &mut UpstreamEndpoint,
        instructions: &str,
    ) {
        inbound
            .send(text(json!({ "type": "init", "instructions": instructions })))
            .await
            .unwrap();
        match upstream.commands.recv().await.unwrap() {
            UpstreamCommand::SessionUpdate(update) => {
                assert_eq!(update.session().instructions(), Some(instructions))
            }
            other => panic!("expected session.update, got {:?}", other),
        }
    }

    fn function_output(command: UpstreamCommand) -> (String, String) {
        match command {
            UpstreamCommand::ConversationItemCreate(create) => match create.item() {
                Item::FunctionCallOutput(output) => {
                    (output.call_id().to_string(), output.output().to_string())
                }
                other => panic!("expected function_call_output, got {:?}", other),
            },
            other => panic!("expected conversation.item.create, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn user_message_follows_session_update() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector.clone()).await;

        init(&client.inbound, &mut upstream, "be terse").await;
        client
            .inbound
            .send(text(json!({ "type": "user_message", "id": "u1", "text": "hello" })))
            .await
            .unwrap();

        match upstream.commands.recv().await.unwrap() {
            UpstreamCommand::ConversationItemCreate(create) => {
                assert_eq!(create.item(), &Item::user_text("hello"))
            }
            other => panic!("expected conversation.item.create, got {:?}", other),
        }
        assert!(matches!(
            upstream.commands.recv().await.unwrap(),
            UpstreamCommand::ResponseCreate(_)
        ));

        drop(client);
        session.await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn audio_before_init_opens_nothing() {
        let (connector, _upstream) = FakeConnector::new();
        let (session, client) = start(connector.clone()).await;
        let ClientEndpoint {
            inbound,
            mut outbound,
        } = client;

        inbound
            .send(InboundFrame::Binary(Bytes::from_static(&[1, 2, 3, 4])))
            .await
            .unwrap();
        inbound
            .send(text(json!({ "type": "user_message", "text": "too early" })))
            .await
            .unwrap();
        drop(inbound);
        session.await.unwrap();

        assert_eq!(connector.connects(), 0);
        while let Some(frame) = outbound.recv().await {
            assert_eq!(frame, OutboundFrame::Close);
        }
    }

    #[tokio::test]
    async fn client_close_closes_upstream_once() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;

        init(&client.inbound, &mut upstream, "be terse").await;
        drop(client);
        session.await.unwrap();

        assert!(upstream.shutdown.await.is_ok());
        assert!(upstream.commands.recv().await.is_none());
    }

    #[tokio::test]
    async fn upstream_close_closes_client() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        let ClientEndpoint {
            inbound,
            mut outbound,
        } = client;

        inbound
            .send(text(json!({ "type": "init", "instructions": "" })))
            .await
            .unwrap();
        assert!(matches!(
            upstream.commands.recv().await.unwrap(),
            UpstreamCommand::SessionUpdate(_)
        ));
        upstream
            .events
            .send(UpstreamEvent::Close {
                reason: Some("going away".to_string()),
            })
            .await
            .unwrap();

        session.await.unwrap();
        assert_eq!(outbound.recv().await, Some(OutboundFrame::Close));
        assert!(inbound.send(InboundFrame::Binary(Bytes::from_static(&[0, 0]))).await.is_err());
    }

    #[tokio::test]
    async fn connect_failure_closes_client() {
        let (session, client) = start(Arc::new(RefusingConnector)).await;
        let ClientEndpoint {
            inbound,
            mut outbound,
        } = client;

        inbound
            .send(text(json!({ "type": "init", "instructions": "be terse" })))
            .await
            .unwrap();
        session.await.unwrap();

        assert_eq!(outbound.recv().await, Some(OutboundFrame::Close));
        assert_eq!(outbound.recv().await, None);
    }

    #[tokio::test]
    async fn upstream_events_reach_the_client() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        let ClientEndpoint {
            inbound,
            mut outbound,
        } = client;
        init(&inbound, &mut upstream, "be terse").await;

        for value in [
            json!({ "type": "input_audio_buffer.speech_started", "item_id": "i0" }),
            json!({ "type": "response.text.delta", "item_id": "i1", "delta": "Hel" }),
            json!({ "type": "response.text.delta", "item_id": "i1", "delta": "lo" }),
            json!({ "type": "response.text.done", "item_id": "i1", "text": "Hello" }),
        ] {
            upstream.events.send(event(value)).await.unwrap();
        }

        assert_eq!(
            outbound.recv().await,
            Some(OutboundFrame::Message(OutboundMessage::speech_started()))
        );
        for delta in ["Hel", "lo"] {
            assert_eq!(
                outbound.recv().await,
                Some(OutboundFrame::Message(OutboundMessage::TextDelta {
                    id: "i1".to_string(),
                    delta: delta.to_string(),
                }))
            );
        }
        assert_eq!(
            outbound.recv().await,
            Some(OutboundFrame::Message(OutboundMessage::text_done("i1")))
        );

        drop(inbound);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn upstream_error_keeps_session_running() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        let ClientEndpoint {
            inbound,
            mut outbound,
        } = client;
        init(&inbound, &mut upstream, "be terse").await;

        for value in [
            json!({
                "type": "error",
                "error": { "type": "invalid_request_error", "code": "bad", "message": "oops" }
            }),
            json!({ "type": "response.text.delta", "item_id": "i1", "delta": "still here" }),
        ] {
            upstream.events.send(event(value)).await.unwrap();
        }

        assert_eq!(
            outbound.recv().await,
            Some(OutboundFrame::Message(OutboundMessage::TextDelta {
                id: "i1".to_string(),
                delta: "still here".to_string(),
            }))
        );
        assert!(outbound.try_recv().is_err());

        drop(inbound);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn client_audio_is_appended_upstream() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        init(&client.inbound, &mut upstream, "be terse").await;

        client
            .inbound
            .send(InboundFrame::Binary(Bytes::from_static(&[0x10, 0x00, 0xf0, 0xff])))
            .await
            .unwrap();
        client.inbound.send(InboundFrame::Text("{not json".to_string())).await.unwrap();
        client
            .inbound
            .send(text(json!({ "type": "init", "instructions": "again" })))
            .await
            .unwrap();
        client
            .inbound
            .send(InboundFrame::Binary(Bytes::from_static(&[0x01, 0x00])))
            .await
            .unwrap();

        for expected in [vec![0x10, 0x00, 0xf0, 0xff], vec![0x01, 0x00]] {
            match upstream.commands.recv().await.unwrap() {
                UpstreamCommand::InputAudioBufferAppend(append) => {
                    assert_eq!(crate::audio::decode(append.audio()).unwrap(), expected)
                }
                other => panic!("expected input_audio_buffer.append, got {:?}", other),
            }
        }

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn interleaved_calls_produce_their_own_outputs() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        init(&client.inbound, &mut upstream, "be terse").await;

        for value in [
            json!({ "type": "response.output_item.added", "item": { "type": "function_call", "call_id": "c1", "name": "get_json_object" } }),
            json!({ "type": "response.function_call_arguments.delta", "call_id": "c1", "delta": "{\"a\":1" }),
            json!({ "type": "response.function_call_arguments.delta", "call_id": "c2", "delta": "{\"z\":" }),
            json!({ "type": "response.function_call_arguments.delta", "call_id": "c1", "delta": ",\"b\":2}" }),
            json!({ "type": "response.function_call_arguments.done", "call_id": "c1" }),
            json!({ "type": "response.function_call_arguments.delta", "call_id": "c2", "delta": "true}" }),
            json!({ "type": "response.function_call_arguments.done", "call_id": "c2" }),
        ] {
            upstream.events.send(event(value)).await.unwrap();
        }

        assert_eq!(
            function_output(upstream.commands.recv().await.unwrap()),
            ("c1".to_string(), r#"{"a":1,"b":2}"#.to_string())
        );
        assert_eq!(
            function_output(upstream.commands.recv().await.unwrap()),
            ("c2".to_string(), r#"{"z":true}"#.to_string())
        );

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_or_unknown_calls_send_nothing() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        init(&client.inbound, &mut upstream, "be terse").await;

        for value in [
            json!({ "type": "response.function_call_arguments.delta", "call_id": "c1", "delta": "{\"a\":" }),
            json!({ "type": "response.function_call_arguments.done", "call_id": "c1" }),
            json!({ "type": "response.function_call_arguments.done", "call_id": "c1", "arguments": "{}" }),
            json!({ "type": "response.function_call.done", "call_id": "never-started", "arguments": "{}" }),
        ] {
            upstream.events.send(event(value)).await.unwrap();
        }
        client
            .inbound
            .send(text(json!({ "type": "user_message", "text": "still there?" })))
            .await
            .unwrap();

        match upstream.commands.recv().await.unwrap() {
            UpstreamCommand::ConversationItemCreate(create) => {
                assert_eq!(create.item(), &Item::user_text("still there?"))
            }
            other => panic!("expected the user message, got {:?}", other),
        }

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn legacy_call_uses_done_arguments() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        init(&client.inbound, &mut upstream, "be terse").await;

        for value in [
            json!({ "type": "response.function_call", "call_id": "c9", "name": "get_json_object" }),
            json!({ "type": "response.function_call.done", "call_id": "c9", "arguments": "{\"ok\": true}" }),
        ] {
            upstream.events.send(event(value)).await.unwrap();
        }

        assert_eq!(
            function_output(upstream.commands.recv().await.unwrap()),
            ("c9".to_string(), r#"{"ok":true}"#.to_string())
        );

        drop(client);
        session.await.unwrap();
    }

    #[tokio::test]
    async fn usage_is_summed_over_responses() {
        let (connector, mut upstream) = FakeConnector::new();
        let (session, client) = start(connector).await;
        init(&client.inbound, &mut upstream, "be terse").await;

        for tokens in [(12, 5, 7), (8, 3, 5)] {
            upstream
                .events
                .send(event(json!({
                    "type": "response.done",
                    "response": {
                        "id": "r",
                        "status": "completed",
                        "usage": { "total_tokens": tokens.0, "input_tokens": tokens.1, "output_tokens": tokens.2 },
                    },
                })))
                .await
                .unwrap();
        }
        upstream.events.send(UpstreamEvent::Close { reason: None }).await.unwrap();

        let stats = session.await.unwrap();
        assert_eq!(stats.responses(), 2);
        assert_eq!(stats.total_tokens(), 20);
        assert_eq!(stats.input_tokens(), 8);
        assert_eq!(stats.output_tokens(), 12);
        drop(client);
    }

    #[tokio::test]
    async fn frames_after_close_are_dropped() {
        let (client, _client_endpoint) = ClientLink::channel(4);
        let (link, mut upstream) = UpstreamLink::channel(4);
        let mut session = Session::new("s1", client, &options());
        session.upstream = Some(link);
        session.state = SessionState::Active;

        session.teardown().await;
        assert_eq!(session.state, SessionState::Closed);
        session.teardown().await;

        session
            .on_client_frame(InboundFrame::Binary(Bytes::from_static(&[1, 2])))
            .await;
        session
            .on_client_frame(text(json!({ "type": "user_message", "text": "late" })))
            .await;
        assert!(matches!(
            upstream.commands.try_recv(),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected)
        ));
    }
}
