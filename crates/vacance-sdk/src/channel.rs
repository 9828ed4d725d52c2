//! Real-time assistant chat channel.
//!
//! [`ChatChannel`] owns at most one live socket per conversation, reconnects
//! with exponential backoff when it drops, turns inbound frames into a typed
//! message log and forwards embedded [`UiAction`]s to a caller-supplied
//! handler.
//!
//! # State machine
//!
//! ```text
//!            open(id)                 transport open
//!   Idle ──────────────▶ Connecting ───────────────────▶ Connected
//!    ▲                      ▲   │                            │
//!    │ close()              │   │ transport close / error    │
//!    │ (from any state)     │   ▼                            │
//!    │                   Disconnected ◀──────────────────────┘
//!    │                      │
//!    │                      │ retry_count >= max_retries
//!    └──────────────────── Failed  (terminal until close + open)
//! ```
//!
//! The surface is synchronous: [`open`](ChatChannel::open),
//! [`send_message`](ChatChannel::send_message) and
//! [`close`](ChatChannel::close) never block and never return errors.
//! Connection work runs on a background Tokio task, one per session, and
//! every change is published on a [`watch`] channel.
//!
//! A session is torn down by flipping its liveness flag while holding the
//! snapshot lock. Every state mutation performed by the background task
//! re-checks that flag under the same lock, so nothing from a closed session
//! can reach the observable state or the action handler.
//!
//! ```rust,no_run
//! use vacance_models::{ConversationId, UiAction};
//! use vacance_sdk::{ChatChannel, ChatConfig, WsConnector};
//!
//! # async fn run() {
//! let mut channel = ChatChannel::new(WsConnector, ChatConfig::from_env());
//! channel.set_action_handler(|action: &UiAction| println!("action: {}", action.kind()));
//! channel.open(ConversationId::new("c-1"));
//!
//! let mut updates = channel.subscribe();
//! let _ = updates.wait_for(|s| s.is_connected()).await;
//! channel.send_message("Une semaine au soleil ?", None);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vacance_models::{ChatMessage, ConversationId, InboundFrame, OutboundFrame, UiAction};

use crate::config::{ChatConfig, RetryPolicy};
use crate::endpoint::ChatEndpoints;
use crate::telemetry::{AttrValue, ChatEvent, TelemetrySink};
use crate::transport::{Connector, FrameSink, FrameStream};

/// Callback invoked once per [`UiAction`], in arrival order.
pub type ActionHandler = Arc<dyn Fn(&UiAction) + Send + Sync>;

type HandlerSlot = Arc<Mutex<Option<ActionHandler>>>;
type Telemetry = Option<Arc<dyn TelemetrySink>>;

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Lifecycle state of a [`ChatChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// No conversation open.
    #[default]
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket closed; a reconnect may be scheduled.
    Disconnected,
    /// The retry budget is exhausted.
    Failed,
}

/// Everything a UI needs to render the chat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSnapshot {
    /// Conversation of the current session.
    pub conversation_id: Option<ConversationId>,
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Append-only log, in send / arrival order.
    pub messages: Vec<ChatMessage>,
    /// `true` from a send until the next inbound frame or transport drop.
    pub is_typing: bool,
    /// Reconnect attempts used since the last successful open.
    pub retry_count: u32,
}

impl ChannelSnapshot {
    /// `true` while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// `true` once the retry budget is exhausted.
    pub fn connection_error(&self) -> bool {
        self.state == ConnectionState::Failed
    }
}

// ---------------------------------------------------------------------------
// ChatChannel
// ---------------------------------------------------------------------------

struct Session {
    id: ConversationId,
    alive: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    outbound: mpsc::UnboundedSender<String>,
}

/// A reconnecting chat channel bound to one conversation at a time.
///
/// Must be used from within a Tokio runtime. Dropping the channel closes it.
pub struct ChatChannel {
    connector: Arc<dyn Connector>,
    config: ChatConfig,
    telemetry: Telemetry,
    handler: HandlerSlot,
    state: Arc<watch::Sender<ChannelSnapshot>>,
    session: Option<Session>,
    driver: Option<JoinHandle<()>>,
}

impl ChatChannel {
    /// Create an idle channel.
    pub fn new(connector: impl Connector, config: ChatConfig) -> Self {
        let (state, _) = watch::channel(ChannelSnapshot::default());
        Self {
            connector: Arc::new(connector),
            config,
            telemetry: None,
            handler: Arc::new(Mutex::new(None)),
            state: Arc::new(state),
            session: None,
            driver: None,
        }
    }

    /// Install a telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the channel for `conversation_id`.
    ///
    /// No-op for an empty id or for the id already open. Any other id closes
    /// the current session first; the new session does not attempt to
    /// connect until the previous socket is fully closed.
    pub fn open(&mut self, conversation_id: ConversationId) {
        if conversation_id.is_empty() {
            debug!("ignoring open with empty conversation id");
            return;
        }
        if self
            .session
            .as_ref()
            .is_some_and(|session| session.id == conversation_id)
        {
            return;
        }
        self.close();

        let alive = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let url = ChatEndpoints::conversation_socket(&self.config.api_url, &conversation_id);
        let initial = if url.is_ok() {
            ConnectionState::Connecting
        } else {
            ConnectionState::Failed
        };
        self.state.send_modify(|snapshot| {
            *snapshot = ChannelSnapshot {
                conversation_id: Some(conversation_id.clone()),
                state: initial,
                ..ChannelSnapshot::default()
            };
        });

        match url {
            Ok(url) => {
                let driver = Driver {
                    id: conversation_id.clone(),
                    url,
                    connector: Arc::clone(&self.connector),
                    retry: self.config.retry,
                    telemetry: self.telemetry.clone(),
                    handler: Arc::clone(&self.handler),
                    state: Arc::clone(&self.state),
                    alive: Arc::clone(&alive),
                    shutdown: shutdown_rx,
                    outbound: outbound_rx,
                    previous: self.driver.take(),
                };
                self.driver = Some(tokio::spawn(driver.run()));
            }
            Err(e) => {
                emit(
                    &self.telemetry,
                    ChatEvent::Error,
                    &conversation_id,
                    &[("reason", "invalid_endpoint".into())],
                );
                error!(conversation = %conversation_id, error = %e, "cannot derive chat endpoint");
            }
        }

        self.session = Some(Session {
            id: conversation_id,
            alive,
            shutdown: shutdown_tx,
            outbound: outbound_tx,
        });
    }

    /// Close the current session.
    ///
    /// Cancels any in-flight connection attempt and any scheduled retry.
    /// Nothing from the closed session reaches the snapshot or the action
    /// handler afterwards. Idempotent.
    ///
    /// Does not wait for a handler call that is already running on another
    /// worker thread; that call completes, but no further action of the
    /// closed session is dispatched.
    pub fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.state.send_modify(|snapshot| {
            session.alive.store(false, Ordering::Release);
            *snapshot = ChannelSnapshot::default();
        });
        let _ = session.shutdown.send(true);
        info!(conversation = %session.id, "chat channel closed");
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Send a user message.
    ///
    /// Requires an open socket and non-blank `content`; otherwise the call
    /// is logged and ignored. On success the user message is appended to the
    /// log immediately, before any reply, and the typing flag is raised.
    pub fn send_message(&self, content: &str, context: Option<Map<String, Value>>) {
        let Some(session) = self.session.as_ref() else {
            error!("chat channel is not open");
            return;
        };
        if content.trim().is_empty() {
            error!(conversation = %session.id, "refusing to send an empty message");
            return;
        }
        let text = match OutboundFrame::new(content, context).encode() {
            Ok(text) => text,
            Err(e) => {
                error!(conversation = %session.id, error = %e, "failed to encode chat frame");
                return;
            }
        };

        let alive = &session.alive;
        let accepted = self.state.send_if_modified(|snapshot| {
            if !alive.load(Ordering::Acquire) || !snapshot.is_connected() {
                return false;
            }
            snapshot.messages.push(ChatMessage::user(content));
            snapshot.is_typing = true;
            true
        });
        if !accepted {
            error!(conversation = %session.id, "websocket not connected");
            return;
        }

        emit(&self.telemetry, ChatEvent::Send, &session.id, &[]);
        if session.outbound.send(text).is_err() {
            warn!(conversation = %session.id, "chat task has stopped; message not transmitted");
        }
    }

    /// Replace the action handler.
    ///
    /// Takes effect for the next dispatched action; the connection is left
    /// untouched.
    pub fn set_action_handler<F>(&self, handler: F)
    where
        F: Fn(&UiAction) + Send + Sync + 'static,
    {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    /// Remove the action handler. Actions are still logged with their message.
    pub fn clear_action_handler(&self) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// A copy of the current state.
    pub fn snapshot(&self) -> ChannelSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ChannelSnapshot> {
        self.state.subscribe()
    }

    /// Conversation of the current session, if open.
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.session.as_ref().map(|session| &session.id)
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum PumpExit {
    Shutdown,
    Dropped,
}

/// Background task running the connect / pump / backoff loop of one session.
struct Driver {
    id: ConversationId,
    url: String,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    telemetry: Telemetry,
    handler: HandlerSlot,
    state: Arc<watch::Sender<ChannelSnapshot>>,
    alive: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
    outbound: mpsc::UnboundedReceiver<String>,
    previous: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self) {
        // The previous session's socket must be closed before we dial.
        if let Some(previous) = self.previous.take() {
            let _ = previous.await;
        }

        let mut retries = 0u32;
        loop {
            if !self.is_alive() {
                return;
            }
            self.update(|s| s.state = ConnectionState::Connecting);
            debug!(conversation = %self.id, url = %self.url, attempt = retries, "connecting");

            let attempt = self.connector.connect(&self.url);
            let result = tokio::select! {
                result = attempt => result,
                _ = self.shutdown.changed() => return,
            };

            match result {
                Ok((mut sink, stream)) => {
                    if !self.is_alive() {
                        let _ = sink.close().await;
                        return;
                    }
                    retries = 0;
                    self.update(|s| {
                        s.state = ConnectionState::Connected;
                        s.retry_count = 0;
                    });
                    self.emit(ChatEvent::Connect, &[]);
                    info!(conversation = %self.id, "chat connected");

                    if self.pump(sink, stream).await == PumpExit::Shutdown {
                        return;
                    }
                }
                Err(e) => {
                    self.emit(ChatEvent::Error, &[("reason", "websocket_error".into())]);
                    warn!(conversation = %self.id, error = %e, "chat connection failed");
                }
            }

            if !self.is_alive() {
                return;
            }
            self.update(|s| {
                s.state = ConnectionState::Disconnected;
                s.is_typing = false;
            });
            self.emit(ChatEvent::Disconnect, &[]);
            info!(conversation = %self.id, "chat disconnected");
            self.discard_pending();

            if retries >= self.retry.max_retries {
                self.update(|s| s.state = ConnectionState::Failed);
                self.emit(
                    ChatEvent::Error,
                    &[("reason", "max_retries_exceeded".into())],
                );
                warn!(conversation = %self.id, retries, "max reconnection retries exceeded");
                return;
            }

            let delay = self.retry.delay_for(retries);
            retries += 1;
            self.update(|s| s.retry_count = retries);
            debug!(
                conversation = %self.id,
                retry = retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnect scheduled"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => return,
            }
        }
    }

    /// Shuttle frames until the transport drops or the session is closed.
    async fn pump(&mut self, mut sink: FrameSink, mut stream: FrameStream) -> PumpExit {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => {
                    if let Err(e) = sink.close().await {
                        debug!(conversation = %self.id, error = %e, "error while closing socket");
                    }
                    return PumpExit::Shutdown;
                }
                Some(text) = self.outbound.recv() => {
                    if let Err(e) = sink.send(text).await {
                        self.emit(ChatEvent::Error, &[("reason", "websocket_error".into())]);
                        warn!(conversation = %self.id, error = %e, "failed to write chat frame");
                        return PumpExit::Dropped;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) => {
                        self.emit(ChatEvent::Error, &[("reason", "websocket_error".into())]);
                        warn!(conversation = %self.id, error = %e, "chat transport error");
                        return PumpExit::Dropped;
                    }
                    None => return PumpExit::Dropped,
                },
            }
        }
    }

    /// Process one inbound frame. Parse failures and server-reported errors
    /// drop the frame without touching the connection.
    fn handle_frame(&self, text: &str) {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.emit(ChatEvent::Error, &[("reason", "invalid_json".into())]);
                error!(conversation = %self.id, error = %e, "failed to parse chat frame");
                return;
            }
        };

        self.update(|s| s.is_typing = false);
        let has_error = frame.server_error().is_some();
        self.emit(ChatEvent::Receive, &[("hasError", has_error.into())]);

        if let Some(reason) = frame.server_error() {
            error!(conversation = %self.id, error = %reason, "assistant reported an error");
            return;
        }

        let message = frame.into_message();
        let actions = message.ui_actions.clone().unwrap_or_default();
        if !self.update(move |s| s.messages.push(message)) {
            return;
        }

        // The liveness check and the handler call are not atomic: a close()
        // racing with this loop may let the in-flight call finish.
        for action in &actions {
            if !self.is_alive() {
                return;
            }
            let handler = self
                .handler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match handler {
                Some(handler) => handler(action),
                None => debug!(conversation = %self.id, kind = action.kind(), "no action handler"),
            }
        }
    }

    fn discard_pending(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(conversation = %self.id, dropped, "discarded frames queued on a closed socket");
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Apply `f` to the snapshot unless the session was closed.
    fn update(&self, f: impl FnOnce(&mut ChannelSnapshot)) -> bool {
        let alive = &self.alive;
        self.state.send_if_modified(|snapshot| {
            if !alive.load(Ordering::Acquire) {
                return false;
            }
            f(snapshot);
            true
        })
    }

    fn emit(&self, event: ChatEvent, extra: &[(&'static str, AttrValue)]) {
        if self.is_alive() {
            emit(&self.telemetry, event, &self.id, extra);
        }
    }
}

fn emit(
    telemetry: &Telemetry,
    event: ChatEvent,
    id: &ConversationId,
    extra: &[(&'static str, AttrValue)],
) {
    let Some(sink) = telemetry else {
        return;
    };
    let mut attributes = Vec::with_capacity(extra.len() + 1);
    attributes.push(("conversationId", AttrValue::from(id.as_str())));
    attributes.extend_from_slice(extra);
    sink.record(event, &attributes);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use crate::telemetry::Attributes;
    use futures::channel::mpsc as fmpsc;
    use futures::future::BoxFuture;
    use futures::{FutureExt, Sink};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::time::Instant;

    const API: &str = "http://backend.test";

    // -- test doubles -------------------------------------------------------

    /// Server side of one accepted mock connection.
    struct MockServer {
        to_client: fmpsc::UnboundedSender<Result<String, SdkError>>,
        from_client: fmpsc::UnboundedReceiver<String>,
    }

    impl MockServer {
        fn push(&self, frame: impl Into<String>) {
            let _ = self.to_client.unbounded_send(Ok(frame.into()));
        }

        fn push_json(&self, frame: &Value) {
            self.push(frame.to_string());
        }

        fn received_nothing(&mut self) -> bool {
            self.from_client.try_recv().is_err()
        }

        async fn next_frame(&mut self) -> Value {
            let text = self.from_client.next().await.expect("client frame");
            serde_json::from_str(&text).unwrap()
        }
    }

    #[derive(Default)]
    struct MockInner {
        /// Per attempt: `true` accepts, `false` refuses. Empty means refuse.
        plan: VecDeque<bool>,
        attempts: Vec<Instant>,
        events: Vec<String>,
        servers: VecDeque<MockServer>,
        observer: Option<watch::Receiver<ChannelSnapshot>>,
        error_flag_at_attempt: Vec<bool>,
    }

    #[derive(Clone, Default)]
    struct MockConnector {
        inner: Arc<Mutex<MockInner>>,
    }

    impl MockConnector {
        fn plan(accepts: &[bool]) -> Self {
            let connector = Self::default();
            connector.inner.lock().unwrap().plan = accepts.iter().copied().collect();
            connector
        }

        fn observe(&self, rx: watch::Receiver<ChannelSnapshot>) {
            self.inner.lock().unwrap().observer = Some(rx);
        }

        fn server(&self) -> MockServer {
            self.inner.lock().unwrap().servers.pop_front().expect("accepted connection")
        }

        fn attempts(&self) -> Vec<Instant> {
            self.inner.lock().unwrap().attempts.clone()
        }

        fn events(&self) -> Vec<String> {
            self.inner.lock().unwrap().events.clone()
        }
    }

    impl Connector for MockConnector {
        fn connect(
            &self,
            url: &str,
        ) -> BoxFuture<'static, Result<(FrameSink, FrameStream), SdkError>> {
            let label = url.rsplit('/').next().unwrap_or_default().to_string();
            let mut inner = self.inner.lock().unwrap();
            inner.attempts.push(Instant::now());
            inner.events.push(format!("attempt:{label}"));
            let flag = inner
                .observer
                .as_ref()
                .is_some_and(|rx| rx.borrow().connection_error());
            inner.error_flag_at_attempt.push(flag);

            if !inner.plan.pop_front().unwrap_or(false) {
                return async { Err(SdkError::Transport("connection refused".into())) }.boxed();
            }

            let (client_tx, from_client) = fmpsc::unbounded();
            let (to_client, client_rx) = fmpsc::unbounded();
            inner.events.push(format!("open:{label}"));
            inner.servers.push_back(MockServer {
                to_client,
                from_client,
            });
            let sink: FrameSink = Box::pin(RecordingSink {
                tx: client_tx,
                label,
                inner: Arc::clone(&self.inner),
            });
            let stream: FrameStream = Box::pin(client_rx);
            async move { Ok((sink, stream)) }.boxed()
        }
    }

    struct RecordingSink {
        tx: fmpsc::UnboundedSender<String>,
        label: String,
        inner: Arc<Mutex<MockInner>>,
    }

    impl Sink<String> for RecordingSink {
        type Error = SdkError;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), SdkError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), SdkError> {
            self.tx
                .unbounded_send(item)
                .map_err(|e| SdkError::Transport(e.to_string()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), SdkError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), SdkError>> {
            let this = self.get_mut();
            this.inner.lock().unwrap().events.push(format!("close:{}", this.label));
            this.tx.close_channel();
            Poll::Ready(Ok(()))
        }
    }

    #[derive(Default)]
    struct RecordingTelemetry {
        records: Mutex<Vec<(ChatEvent, Vec<(&'static str, AttrValue)>)>>,
    }

    impl TelemetrySink for RecordingTelemetry {
        fn record(&self, event: ChatEvent, attributes: &Attributes) {
            self.records.lock().unwrap().push((event, attributes.to_vec()));
        }
    }

    impl RecordingTelemetry {
        fn error_reasons(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(event, _)| *event == ChatEvent::Error)
                .filter_map(|(_, attrs)| {
                    attrs.iter().find(|(k, _)| *k == "reason").map(|(_, v)| v.to_string())
                })
                .collect()
        }

        fn receive_flags(&self) -> Vec<bool> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(event, _)| *event == ChatEvent::Receive)
                .filter_map(|(_, attrs)| {
                    attrs.iter().find_map(|(k, v)| match (k, v) {
                        (&"hasError", AttrValue::Bool(flag)) => Some(*flag),
                        _ => None,
                    })
                })
                .collect()
        }

        fn count(&self, wanted: ChatEvent) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(event, _)| *event == wanted)
                .count()
        }
    }

    // -- helpers ------------------------------------------------------------

    fn channel(connector: &MockConnector) -> ChatChannel {
        ChatChannel::new(connector.clone(), ChatConfig::new(API))
    }

    async fn wait(channel: &ChatChannel, cond: impl FnMut(&ChannelSnapshot) -> bool) {
        let mut rx = channel.subscribe();
        tokio::time::timeout(Duration::from_secs(600), rx.wait_for(cond))
            .await
            .expect("timed out waiting for channel state")
            .expect("channel state sender dropped");
    }

    fn recording_handler(channel: &ChatChannel) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        channel.set_action_handler(move |action: &UiAction| {
            sink.lock().unwrap().push(action.kind().to_string());
        });
        seen
    }

    fn reply(text: &str) -> Value {
        json!({"response": text, "timestamp": "2025-01-01T00:00:00"})
    }

    // -- lifecycle ----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn empty_id_is_a_noop() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("  "));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(chat.snapshot().state, ConnectionState::Idle);
        assert!(connector.attempts().is_empty());
        assert!(chat.conversation_id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn open_connects_and_resets_flags() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        chat.open(ConversationId::new("c-1"));
        assert_eq!(chat.snapshot().state, ConnectionState::Connecting);

        wait(&chat, ChannelSnapshot::is_connected).await;
        let snap = chat.snapshot();
        assert!(!snap.connection_error());
        assert_eq!(snap.retry_count, 0);
        assert_eq!(snap.conversation_id, Some(ConversationId::new("c-1")));
        assert_eq!(telemetry.count(ChatEvent::Connect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_same_id_is_idempotent() {
        let connector = MockConnector::plan(&[true, true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        chat.open(ConversationId::new("c-1"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert!(chat.snapshot().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_api_url_fails_without_dialing() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = ChatChannel::new(connector.clone(), ChatConfig::new("localhost:8080"));
        chat.open(ConversationId::new("c-1"));
        assert!(chat.snapshot().connection_error());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(connector.attempts().is_empty());
    }

    // -- backoff ------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn backoff_schedule_then_terminal_error() {
        let connector = MockConnector::default();
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        connector.observe(chat.subscribe());

        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::connection_error).await;

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 6, "initial attempt plus five retries");
        let delays: Vec<u128> = attempts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(delays, [1000, 2000, 4000, 8000, 16000]);

        let flags = connector.inner.lock().unwrap().error_flag_at_attempt.clone();
        assert!(flags.iter().all(|flag| !flag), "error raised too early: {flags:?}");

        let reasons = telemetry.error_reasons();
        let mut expected = vec!["websocket_error"; 6];
        expected.push("max_retries_exceeded");
        assert_eq!(reasons, expected);
        assert_eq!(telemetry.count(ChatEvent::Disconnect), 6);
        assert_eq!(chat.snapshot().retry_count, 5);

        // Terminal: nothing else is attempted.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_open_resets_retry_budget() {
        let connector = MockConnector::plan(&[false, false, true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        assert_eq!(chat.snapshot().retry_count, 0);

        let attempts = connector.attempts();
        assert_eq!((attempts[1] - attempts[0]).as_millis(), 1000);
        assert_eq!((attempts[2] - attempts[1]).as_millis(), 2000);

        // Server drops the connection: the next delay starts over at 1s.
        let dropped_at = Instant::now();
        drop(connector.server());
        wait(&chat, |s| s.state == ConnectionState::Disconnected).await;
        tokio::time::timeout(Duration::from_secs(60), async {
            while connector.attempts().len() < 4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        let retry_at = connector.attempts()[3];
        assert_eq!((retry_at - dropped_at).as_millis(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_scheduled_retry() {
        let connector = MockConnector::default();
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, |s| s.retry_count == 1).await;
        chat.close();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts().len(), 1);
        assert_eq!(chat.snapshot(), ChannelSnapshot::default());
    }

    // -- inbound frames -----------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn log_keeps_send_then_arrival_order() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let mut server = connector.server();

        chat.send_message("Je cherche une plage", None);
        // Appended before any reply.
        let snap = chat.snapshot();
        assert_eq!(snap.messages.len(), 1);
        assert!(snap.is_typing);
        assert_eq!(server.next_frame().await, json!({"message": "Je cherche une plage"}));

        for text in ["un", "deux", "trois"] {
            server.push_json(&reply(text));
        }
        wait(&chat, |s| s.messages.len() == 4).await;

        let snap = chat.snapshot();
        let log: Vec<(String, &str)> = snap
            .messages
            .iter()
            .map(|m| (m.role.to_string(), m.content.as_str()))
            .collect();
        assert_eq!(
            log,
            [
                ("user".to_string(), "Je cherche une plage"),
                ("assistant".to_string(), "un"),
                ("assistant".to_string(), "deux"),
                ("assistant".to_string(), "trois"),
            ]
        );
        assert!(!snap.is_typing);
        assert_eq!(snap.messages[1].timestamp.as_deref(), Some("2025-01-01T00:00:00"));
        assert_eq!(telemetry.receive_flags(), [false, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn context_is_forwarded() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let mut server = connector.server();

        let mut ctx = Map::new();
        ctx.insert("user".into(), json!({"id": "u-1", "name": "Léa"}));
        chat.send_message("bonjour", Some(ctx));
        assert_eq!(
            server.next_frame().await,
            json!({"message": "bonjour", "context": {"user": {"id": "u-1", "name": "Léa"}}})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frame_is_isolated() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let server = connector.server();

        server.push("{not json");
        server.push_json(&reply("ok"));
        wait(&chat, |s| s.messages.len() == 1).await;

        let snap = chat.snapshot();
        assert!(snap.is_connected());
        assert_eq!(snap.messages[0].content, "ok");
        assert_eq!(telemetry.error_reasons(), ["invalid_json"]);
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_frame_is_dropped() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let mut server = connector.server();

        chat.send_message("hello", None);
        let _ = server.next_frame().await;
        server.push_json(&json!({"error": "boom", "response": "Une erreur"}));
        wait(&chat, |s| !s.is_typing).await;

        let snap = chat.snapshot();
        assert_eq!(snap.messages.len(), 1, "only the user message");
        assert!(snap.is_connected());
        assert!(!snap.connection_error());
        assert_eq!(telemetry.receive_flags(), [true]);
        assert!(telemetry.error_reasons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn structured_error_clears_typing_and_next_reply_lands() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let mut server = connector.server();

        chat.send_message("hello", None);
        let _ = server.next_frame().await;
        server.push_json(&json!({"error": {"code": 500}}));
        wait(&chat, |s| !s.is_typing).await;
        assert_eq!(chat.snapshot().messages.len(), 1);

        server.push_json(&json!({"response": "ok", "timestamp": 1_700_000_000}));
        wait(&chat, |s| s.messages.len() == 2).await;

        let snap = chat.snapshot();
        assert_eq!(snap.messages[1].content, "ok");
        assert!(snap.messages[1].timestamp.is_none());
        assert_eq!(telemetry.receive_flags(), [true, false]);
        assert!(telemetry.error_reasons().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mistyped_reply_fields_read_as_absent() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        let seen = recording_handler(&chat);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let server = connector.server();

        server.push_json(&json!({
            "response": 5,
            "ui_actions": {"action": "navigate", "page": "home"}
        }));
        wait(&chat, |s| s.messages.len() == 1).await;
        tokio::task::yield_now().await;

        let snap = chat.snapshot();
        assert_eq!(snap.messages[0].content, "");
        assert!(snap.messages[0].ui_actions.is_none());
        assert!(seen.lock().unwrap().is_empty());
        assert!(snap.is_connected());
    }

    // -- action dispatch ----------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn actions_dispatch_in_order() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        let seen = recording_handler(&chat);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let server = connector.server();

        server.push_json(&json!({
            "response": "Voici",
            "ui_actions": [
                {"action": "show_search_results", "packages": []},
                {"action": "something_new", "x": 1},
                {"action": "navigate", "page": "search"}
            ]
        }));
        wait(&chat, |s| s.messages.len() == 1).await;
        tokio::task::yield_now().await;

        assert_eq!(
            *seen.lock().unwrap(),
            ["show_search_results", "something_new", "navigate"]
        );
        assert_eq!(chat.snapshot().messages[0].actions().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_swap_does_not_reconnect() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        let first = recording_handler(&chat);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let server = connector.server();

        server.push_json(&json!({"response": "a", "ui_actions": [{"action": "navigate", "page": "home"}]}));
        wait(&chat, |s| s.messages.len() == 1).await;
        tokio::task::yield_now().await;

        let second = recording_handler(&chat);
        server.push_json(&json!({"response": "b", "ui_actions": [{"action": "show_message", "message": "hi"}]}));
        wait(&chat, |s| s.messages.len() == 2).await;
        tokio::task::yield_now().await;

        assert_eq!(*first.lock().unwrap(), ["navigate"]);
        assert_eq!(*second.lock().unwrap(), ["show_message"]);
        assert_eq!(connector.attempts().len(), 1);
    }

    // -- send preconditions -------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn blank_messages_are_not_sent() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let mut server = connector.server();

        chat.send_message("", None);
        chat.send_message("   ", None);
        tokio::task::yield_now().await;
        assert!(chat.snapshot().messages.is_empty());
        assert!(!chat.snapshot().is_typing);
        assert!(server.received_nothing());

        chat.send_message("hi", None);
        assert_eq!(server.next_frame().await, json!({"message": "hi"}));
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_disconnected_is_ignored() {
        let connector = MockConnector::default();
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());

        chat.send_message("hi", None);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, |s| s.state == ConnectionState::Disconnected).await;
        chat.send_message("hi", None);

        assert!(chat.snapshot().messages.is_empty());
        assert_eq!(telemetry.count(ChatEvent::Send), 0);
    }

    // -- teardown -----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent_and_silences_late_frames() {
        let connector = MockConnector::plan(&[true]);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let mut chat = channel(&connector).with_telemetry(telemetry.clone());
        let seen = recording_handler(&chat);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let server = connector.server();
        let events_before = telemetry.records.lock().unwrap().len();

        chat.close();
        chat.close();
        server.push_json(&json!({"response": "late", "ui_actions": [{"action": "navigate", "page": "home"}]}));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(chat.snapshot(), ChannelSnapshot::default());
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(telemetry.records.lock().unwrap().len(), events_before);
        let closes = connector
            .events()
            .iter()
            .filter(|e| e.starts_with("close:"))
            .count();
        assert_eq!(closes, 1);
        assert_eq!(connector.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_conversation_closes_old_socket_first() {
        let connector = MockConnector::plan(&[true, true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("conv-a"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        let old_server = connector.server();

        chat.open(ConversationId::new("conv-b"));
        assert_eq!(chat.snapshot().conversation_id, Some(ConversationId::new("conv-b")));
        old_server.push_json(&reply("late for a"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(
            connector.events(),
            ["attempt:conv-a", "open:conv-a", "close:conv-a", "attempt:conv-b", "open:conv-b"]
        );
        assert!(chat.snapshot().messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_channel_closes_the_socket() {
        let connector = MockConnector::plan(&[true]);
        let mut chat = channel(&connector);
        chat.open(ConversationId::new("c-1"));
        wait(&chat, ChannelSnapshot::is_connected).await;
        drop(chat);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(connector.events().contains(&"close:c-1".to_string()));
    }
}
