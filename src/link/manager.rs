//! Link manager - owns one robot connection and keeps it alive.
//!
//! All lifecycle transitions run inside a single actor task fed by one ordered
//! command queue. Callers, timers, handshake tasks and the transport only ever
//! post commands to it, so no two transitions run at once:
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ok──▶ Open ──disconnect──▶ Closing ──▶ Idle
//!                       │               │ ▲
//!                     error       lost  │ │ ok
//!                       ▼               ▼ │
//!                    Failed ◀──ceiling── Reconnecting ⟲ retry
//! ```
//!
//! Timers are tokio tasks whose handles are aborted when the state they serve
//! is left. Every connection gets a generation number and anything tagged with
//! an older generation is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use crate::error::{LinkError, Result};
use crate::link::config::{LinkConfig, NORMAL_CLOSURE};
use crate::link::event::LinkEvent;
use crate::link::periodic::PeriodicSender;
use crate::link::state::{LinkState, LinkStatus};
use crate::link::transport::{Connection, Connector, Inbound, InboundTx};
use crate::link::ws::WsConnector;
use crate::sink::LogSink;

/// Schemes accepted by `connect`
pub const ACCEPTED_SCHEMES: &[&str] = &["ws", "wss"];

/// Messages processed by the link actor
pub(crate) enum Command {
    Connect {
        url: Url,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        payload: Outbound,
        reply: oneshot::Sender<Result<()>>,
    },
    HandshakeDone {
        generation: u64,
        result: Result<Box<dyn Connection>>,
    },
    Transport {
        generation: u64,
        event: Inbound,
    },
    KeepaliveDue {
        generation: u64,
    },
    ReconnectDue {
        generation: u64,
    },
    CloseGraceElapsed {
        generation: u64,
    },
    Shutdown,
}

/// One outbound frame
pub(crate) enum Outbound {
    Text(String),
    Binary(Vec<u8>),
}

impl Outbound {
    fn sent_event(self) -> LinkEvent {
        match self {
            Outbound::Text(text) => LinkEvent::Sent { text },
            Outbound::Binary(bytes) => LinkEvent::SentBinary { len: bytes.len() },
        }
    }
}

/// Validate a target address: non-empty `ws://` or `wss://` URL with a host
pub fn parse_address(address: &str) -> Result<Url> {
    let invalid = |reason: String| LinkError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(invalid("address is empty".to_string()));
    }
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !ACCEPTED_SCHEMES.contains(&url.scheme()) {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected ws or wss",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Handle to a link. Clones share the same connection.
///
/// The link shuts down when `shutdown` is called or when every clone is gone.
/// A running `PeriodicSender` holds a clone of its own, so the link outlives
/// the caller's handles until that sender is cancelled or dropped.
#[derive(Clone)]
pub struct LinkManager {
    config: LinkConfig,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedSender<LinkEvent>,
    status: watch::Receiver<LinkStatus>,
}

impl LinkManager {
    /// Start a link over `connector`, reporting to `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: LinkConfig, connector: Arc<dyn Connector>, sink: Arc<dyn LogSink>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(LinkStatus::default());

        tokio::spawn(dispatch_events(event_rx, sink));

        let actor = LinkActor {
            config: config.clone(),
            connector,
            commands: commands.downgrade(),
            events: events.clone(),
            status: status_tx,
            state: LinkState::Idle,
            attempts: 0,
            target: None,
            generation: 0,
            connection: None,
            keepalive: None,
            reconnect: None,
            grace: None,
            handshake: None,
            pending_connect: None,
            pending_disconnect: None,
        };
        tokio::spawn(actor.run(command_rx));

        Self {
            config,
            commands,
            events,
            status,
        }
    }

    /// Start a link over WebSocket
    pub fn websocket(config: LinkConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::new(config, Arc::new(WsConnector), sink)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> LinkState {
        self.status.borrow().state
    }

    /// Current state plus reconnect attempt count
    pub fn status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Wait until the link reaches `state`
    pub async fn wait_for_state(&self, state: LinkState) -> Result<LinkStatus> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| s.state == state)
            .await
            .map_err(|_| LinkError::Shutdown)?;
        Ok(*status)
    }

    /// Open the link to `address`.
    ///
    /// Resolves once the first handshake succeeds or fails. A no-op (logged)
    /// unless the link is `Idle` or `Failed`.
    pub async fn connect(&self, address: &str) -> Result<()> {
        let url = match parse_address(address) {
            Ok(url) => url,
            Err(err) => {
                let _ = self.events.send(LinkEvent::Error(err.clone()));
                return Err(err);
            }
        };
        let (reply, rx) = oneshot::channel();
        self.request(Command::Connect { url, reply })?;
        rx.await.map_err(|_| LinkError::Shutdown)?
    }

    /// Close the link with a normal-closure code.
    ///
    /// Returns once the link is `Idle` or the grace period ran out. A no-op
    /// (logged) unless the link is `Open`.
    pub async fn disconnect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Disconnect { reply })?;
        // The actor enforces the grace period; this bound only guards a wedged transport
        let limit = self.config.disconnect_grace * 2 + Duration::from_millis(100);
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(LinkError::Shutdown),
            Err(_) => Err(LinkError::TransportError(format!(
                "disconnect not confirmed within {}ms",
                limit.as_millis()
            ))),
        }
    }

    /// Send one text message. Fails fast with `NotConnected` unless `Open`;
    /// nothing is queued.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        self.send_payload(Outbound::Text(text.into())).await
    }

    /// Send one binary message, under the same rules as `send`
    pub async fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send_payload(Outbound::Binary(bytes.into())).await
    }

    async fn send_payload(&self, payload: Outbound) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send { payload, reply })?;
        rx.await.map_err(|_| LinkError::Shutdown)?
    }

    /// Send `factory()` immediately, then every `interval`, while the link is open
    pub fn send_at<F>(&self, interval: Duration, factory: F) -> PeriodicSender
    where
        F: FnMut() -> String + Send + 'static,
    {
        PeriodicSender::spawn(self.clone(), interval, factory)
    }

    /// Stop the link: cancel timers and drop the connection without a close
    /// handshake. Later calls fail with `Shutdown`.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// True once the link has stopped for good
    pub fn is_shutdown(&self) -> bool {
        self.commands.is_closed()
    }

    fn request(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| LinkError::Shutdown)
    }
}

/// Forward events to the sink in order, off the actor's path
async fn dispatch_events(mut events: mpsc::UnboundedReceiver<LinkEvent>, sink: Arc<dyn LogSink>) {
    while let Some(event) = events.recv().await {
        sink.log(event.severity(), &event.to_string());
    }
}

struct LinkActor {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    commands: mpsc::WeakUnboundedSender<Command>,
    events: mpsc::UnboundedSender<LinkEvent>,
    status: watch::Sender<LinkStatus>,
    state: LinkState,
    attempts: u32,
    target: Option<Url>,
    generation: u64,
    connection: Option<Box<dyn Connection>>,
    keepalive: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    grace: Option<JoinHandle<()>>,
    handshake: Option<JoinHandle<()>>,
    pending_connect: Option<oneshot::Sender<Result<()>>>,
    pending_disconnect: Option<oneshot::Sender<()>>,
}

impl LinkActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Shutdown => break,
                Command::Connect { url, reply } => self.on_connect(url, reply),
                Command::Disconnect { reply } => self.on_disconnect(reply).await,
                Command::Send { payload, reply } => {
                    let result = self.on_send(payload).await;
                    let _ = reply.send(result);
                }
                Command::HandshakeDone { generation, result } => {
                    self.on_handshake(generation, result)
                }
                Command::Transport { generation, event } => self.on_transport(generation, event),
                Command::KeepaliveDue { generation } => self.on_keepalive(generation).await,
                Command::ReconnectDue { generation } => self.on_reconnect_due(generation),
                Command::CloseGraceElapsed { generation } => self.on_close_grace(generation),
            }
        }
        self.teardown();
    }

    fn on_connect(&mut self, url: Url, reply: oneshot::Sender<Result<()>>) {
        if !self.state.accepts_connect() {
            self.emit(LinkEvent::Ignored {
                operation: "connect",
                state: self.state,
            });
            let _ = reply.send(Ok(()));
            return;
        }

        self.attempts = 0;
        self.target = Some(url);
        self.pending_connect = Some(reply);
        self.set_state(LinkState::Connecting);
        self.start_handshake();
    }

    async fn on_disconnect(&mut self, reply: oneshot::Sender<()>) {
        if self.state != LinkState::Open {
            self.emit(LinkEvent::Ignored {
                operation: "disconnect",
                state: self.state,
            });
            let _ = reply.send(());
            return;
        }

        cancel(&mut self.keepalive);
        self.pending_disconnect = Some(reply);
        self.set_state(LinkState::Closing);

        let reason = self.config.close_reason.clone();
        self.emit(LinkEvent::Closing {
            code: NORMAL_CLOSURE,
            reason: reason.clone(),
        });
        self.grace = Some(self.schedule(
            self.config.disconnect_grace,
            Command::CloseGraceElapsed {
                generation: self.generation,
            },
        ));

        let grace = self.config.disconnect_grace;
        let outcome = match self.connection.as_mut() {
            Some(conn) => tokio::time::timeout(grace, conn.close(NORMAL_CLOSURE, &reason)).await,
            None => Ok(Ok(())),
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                // The close frame never left; nothing will confirm it
                self.emit(LinkEvent::Error(err));
                self.finish_close();
            }
            Err(_) => {
                self.emit(LinkEvent::Error(LinkError::TransportError(format!(
                    "close frame not written within {}ms",
                    grace.as_millis()
                ))));
                self.finish_close();
            }
        }
    }

    async fn on_send(&mut self, payload: Outbound) -> Result<()> {
        if self.state != LinkState::Open || self.connection.is_none() {
            let err = LinkError::NotConnected {
                state: self.state.to_string(),
            };
            self.emit(LinkEvent::Error(err.clone()));
            return Err(err);
        }
        let Some(conn) = self.connection.as_mut() else {
            return Err(LinkError::Shutdown);
        };

        // A write that never completes must not wedge the actor
        let limit = self.config.send_timeout;
        let written = match &payload {
            Outbound::Text(text) => tokio::time::timeout(limit, conn.send_text(text)).await,
            Outbound::Binary(bytes) => tokio::time::timeout(limit, conn.send_binary(bytes)).await,
        };
        let err = match written {
            Ok(Ok(())) => {
                self.emit(payload.sent_event());
                return Ok(());
            }
            Ok(Err(err)) => LinkError::TransportError(transport_reason(err)),
            Err(_) => LinkError::TransportError(format!(
                "send timed out after {}ms",
                limit.as_millis()
            )),
        };
        self.emit(LinkEvent::Error(err.clone()));
        Err(err)
    }

    fn on_handshake(&mut self, generation: u64, result: Result<Box<dyn Connection>>) {
        self.handshake = None;
        if generation != self.generation
            || !matches!(self.state, LinkState::Connecting | LinkState::Reconnecting)
        {
            // Superseded attempt; dropping the connection closes it
            return;
        }

        match result {
            Ok(mut conn) => {
                conn.start(InboundTx::new(generation, self.commands.clone()));
                self.connection = Some(conn);
                self.attempts = 0;
                self.set_state(LinkState::Open);
                self.emit(LinkEvent::Opened {
                    target: self.target_str(),
                });
                self.start_keepalive();
                if let Some(reply) = self.pending_connect.take() {
                    let _ = reply.send(Ok(()));
                }
            }
            Err(err) => {
                let reason = transport_reason(err);
                if self.state == LinkState::Connecting {
                    let err = LinkError::HandshakeFailure {
                        target: self.target_str(),
                        reason,
                    };
                    self.emit(LinkEvent::Error(err.clone()));
                    self.set_state(LinkState::Failed);
                    if let Some(reply) = self.pending_connect.take() {
                        let _ = reply.send(Err(err));
                    }
                } else {
                    self.emit(LinkEvent::Error(LinkError::HandshakeFailure {
                        target: self.target_str(),
                        reason: format!(
                            "{} (reconnect attempt {}/{})",
                            reason, self.attempts, self.config.max_reconnect_attempts
                        ),
                    }));
                    self.retry_or_fail();
                }
            }
        }
    }

    fn on_transport(&mut self, generation: u64, event: Inbound) {
        if generation != self.generation || self.connection.is_none() {
            return;
        }

        match event {
            Inbound::Text(text) => self.emit(LinkEvent::Message { text }),
            Inbound::Binary(bytes) => self.emit(LinkEvent::Message {
                text: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Inbound::Ping => self.emit(LinkEvent::PingReceived),
            Inbound::Pong => self.emit(LinkEvent::PongReceived),
            Inbound::Error(reason) => self.emit(LinkEvent::Error(LinkError::TransportError(reason))),
            Inbound::Closed {
                code,
                reason,
                remote,
            } => {
                self.emit(LinkEvent::Closed {
                    code,
                    reason: reason.clone(),
                    remote,
                });
                match self.state {
                    LinkState::Closing => self.finish_close(),
                    LinkState::Open => self.on_connection_lost(code, reason),
                    _ => {}
                }
            }
        }
    }

    fn on_connection_lost(&mut self, code: u16, reason: String) {
        cancel(&mut self.keepalive);
        self.connection = None;
        self.emit(LinkEvent::Error(LinkError::UnsolicitedClose { code, reason }));
        self.set_state(LinkState::Reconnecting);
        self.retry_or_fail();
    }

    async fn on_keepalive(&mut self, generation: u64) {
        if generation != self.generation || self.state != LinkState::Open {
            return;
        }
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        let limit = self.config.send_timeout;
        match tokio::time::timeout(limit, conn.send_ping()).await {
            Ok(Ok(())) => self.emit(LinkEvent::PingSent),
            Ok(Err(err)) => self.emit(LinkEvent::PingFailed {
                reason: transport_reason(err),
            }),
            Err(_) => self.emit(LinkEvent::PingFailed {
                reason: format!("ping timed out after {}ms", limit.as_millis()),
            }),
        }
    }

    fn on_reconnect_due(&mut self, generation: u64) {
        self.reconnect = None;
        if generation != self.generation || self.state != LinkState::Reconnecting {
            return;
        }
        self.attempts += 1;
        self.publish();
        self.start_handshake();
    }

    fn on_close_grace(&mut self, generation: u64) {
        self.grace = None;
        if generation != self.generation || self.state != LinkState::Closing {
            return;
        }
        self.emit(LinkEvent::Error(LinkError::TransportError(format!(
            "close not confirmed within {}ms, dropping connection",
            self.config.disconnect_grace.as_millis()
        ))));
        self.finish_close();
    }

    /// Schedule another reconnect, or give up once the ceiling is reached
    fn retry_or_fail(&mut self) {
        let ceiling = self.config.max_reconnect_attempts;
        if self.attempts < ceiling {
            let delay = self.config.reconnect_delay;
            self.emit(LinkEvent::ReconnectScheduled {
                attempt: self.attempts + 1,
                ceiling,
                delay,
            });
            cancel(&mut self.reconnect);
            self.reconnect = Some(self.schedule(
                delay,
                Command::ReconnectDue {
                    generation: self.generation,
                },
            ));
        } else {
            self.set_state(LinkState::Failed);
            self.emit(LinkEvent::Error(LinkError::MaxReconnectAttemptsExceeded {
                target: self.target_str(),
                attempts: self.attempts,
            }));
        }
    }

    fn finish_close(&mut self) {
        cancel(&mut self.grace);
        cancel(&mut self.keepalive);
        self.connection = None;
        self.set_state(LinkState::Idle);
        if let Some(reply) = self.pending_disconnect.take() {
            let _ = reply.send(());
        }
    }

    fn start_handshake(&mut self) {
        let Some(url) = self.target.clone() else {
            return;
        };
        self.generation += 1;
        self.emit(LinkEvent::Connecting {
            target: url.to_string(),
        });

        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let timeout = self.config.connect_timeout;
        let commands = self.commands.clone();
        cancel(&mut self.handshake);
        self.handshake = Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(LinkError::TransportError(format!(
                    "connect timed out after {}ms",
                    timeout.as_millis()
                ))),
            };
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::HandshakeDone { generation, result });
            }
        }));
    }

    fn start_keepalive(&mut self) {
        cancel(&mut self.keepalive);
        let period = self.config.keepalive_interval;
        if period.is_zero() {
            return;
        }
        let generation = self.generation;
        let commands = self.commands.clone();
        self.keepalive = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(tx) = commands.upgrade() else {
                    break;
                };
                if tx.send(Command::KeepaliveDue { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    /// Post `command` to ourselves after `delay`
    fn schedule(&self, delay: Duration, command: Command) -> JoinHandle<()> {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(command);
            }
        })
    }

    fn teardown(&mut self) {
        cancel(&mut self.keepalive);
        cancel(&mut self.reconnect);
        cancel(&mut self.grace);
        cancel(&mut self.handshake);
        self.connection = None;
        if let Some(reply) = self.pending_connect.take() {
            let _ = reply.send(Err(LinkError::Shutdown));
        }
        if let Some(reply) = self.pending_disconnect.take() {
            let _ = reply.send(());
        }
        self.set_state(LinkState::Idle);
        tracing::debug!(generation = self.generation, "link actor stopped");
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state != state {
            tracing::trace!(from = %self.state, to = %state, "link state change");
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(LinkStatus {
            state: self.state,
            reconnect_attempts: self.attempts,
        });
    }

    fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    fn target_str(&self) -> String {
        self.target
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_else(|| "<none>".to_string())
    }
}

fn cancel(task: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}

fn transport_reason(err: LinkError) -> String {
    match err {
        LinkError::TransportError(reason) => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::{ConnectOutcome, MockConnector};
    use crate::sink::MemorySink;

    const ROBOT: &str = "ws://192.168.3.2:2005";

    fn link(mock: &MockConnector) -> (LinkManager, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let link = LinkManager::new(LinkConfig::default(), Arc::new(mock.clone()), sink.clone());
        (link, sink)
    }

    #[test]
    fn test_parse_address_accepts_ws_and_wss() {
        assert_eq!(parse_address(ROBOT).unwrap().as_str(), "ws://192.168.3.2:2005/");
        assert!(parse_address("wss://robot.example/ctl").is_ok());
        assert!(parse_address("  ws://robot  ").is_ok());
    }

    #[test]
    fn test_parse_address_rejects() {
        for bad in ["", "   ", "http://robot", "robot:2005", "ws://", "tcp://1.2.3.4:5"] {
            match parse_address(bad) {
                Err(LinkError::InvalidAddress { address, .. }) => assert_eq!(address, bad),
                other => panic!("{:?} should be invalid, got {:?}", bad, other),
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_address_stays_idle() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        let err = link.connect("http://robot").await.unwrap_err();
        assert!(matches!(err, LinkError::InvalidAddress { .. }));
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(mock.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_connect_opens() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        let status = link.status();
        assert_eq!(status.state, LinkState::Open);
        assert_eq!(status.reconnect_attempts, 0);
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_when_open_is_noop() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        link.connect(ROBOT).await.unwrap();
        assert_eq!(mock.connect_calls(), 1);
        assert_eq!(link.state(), LinkState::Open);
    }

    #[tokio::test]
    async fn test_handshake_failure_goes_failed_without_retry() {
        let mock = MockConnector::new();
        mock.set_fallback(ConnectOutcome::Refuse("connection refused".into()));
        let (link, _sink) = link(&mock);

        let err = link.connect(ROBOT).await.unwrap_err();
        assert!(matches!(err, LinkError::HandshakeFailure { .. }));
        assert_eq!(link.state(), LinkState::Failed);
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_is_handshake_failure() {
        let mock = MockConnector::new();
        mock.push_outcome(ConnectOutcome::Hang);
        let (link, _sink) = link(&mock);

        match link.connect(ROBOT).await {
            Err(LinkError::HandshakeFailure { reason, .. }) => {
                assert!(reason.contains("timed out after 5000ms"))
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
        assert_eq!(link.state(), LinkState::Failed);
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        let err = link.send("001XA!AA[0:0:0:0:0:0]").await.unwrap_err();
        assert_eq!(
            err,
            LinkError::NotConnected {
                state: "idle".into()
            }
        );
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_delivers_when_open() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        link.send("001XA?CA[1]").await.unwrap();
        assert_eq!(mock.sent(), vec!["001XA?CA[1]".to_string()]);
    }

    #[tokio::test]
    async fn test_send_transport_error_keeps_state() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        mock.set_fail_sends(true);
        let err = link.send("lost").await.unwrap_err();
        assert!(matches!(err, LinkError::TransportError(_)));
        assert_eq!(link.state(), LinkState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_write_times_out_and_disconnect_still_works() {
        let mock = MockConnector::new();
        let (link, sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        mock.set_stall_writes(true);

        let first = {
            let link = link.clone();
            tokio::spawn(async move { link.send("first").await })
        };
        tokio::task::yield_now().await;

        let second = tokio::time::timeout(Duration::from_secs(60), link.send("second"))
            .await
            .expect("send must not block behind a stalled write");
        assert_eq!(
            second,
            Err(LinkError::TransportError("send timed out after 5000ms".into()))
        );
        assert!(matches!(first.await.unwrap(), Err(LinkError::TransportError(_))));
        assert_eq!(link.state(), LinkState::Open);

        link.disconnect().await.unwrap();
        assert_eq!(link.state(), LinkState::Idle);
        assert!(mock.sent().is_empty());
        tokio::task::yield_now().await;
        assert_eq!(sink.count_matching("send timed out after 5000ms"), 2);
    }

    #[tokio::test]
    async fn test_send_binary_delivers_when_open() {
        let mock = MockConnector::new();
        let (link, sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        link.send_binary(vec![0x00, 0x7f, 0xff]).await.unwrap();
        assert_eq!(mock.sent_binary(), vec![vec![0x00, 0x7f, 0xff]]);
        assert!(mock.sent().is_empty());
        tokio::task::yield_now().await;
        assert!(sink.contains("Sent binary message: 3 bytes"));
    }

    #[tokio::test]
    async fn test_send_binary_requires_open() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        let err = link.send_binary(b"raw".to_vec()).await.unwrap_err();
        assert_eq!(
            err,
            LinkError::NotConnected {
                state: "idle".into()
            }
        );
        assert!(mock.sent_binary().is_empty());
    }

    #[tokio::test]
    async fn test_send_binary_transport_error_keeps_state() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        mock.set_fail_sends(true);
        let err = link.send_binary(&b"lost"[..]).await.unwrap_err();
        assert_eq!(err, LinkError::TransportError("mock send failure".into()));
        assert_eq!(link.state(), LinkState::Open);
    }

    #[tokio::test]
    async fn test_disconnect_returns_idle() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        link.disconnect().await.unwrap();
        assert_eq!(link.state(), LinkState::Idle);
        assert_eq!(mock.closes(), vec![(1000, "User disconnected".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_grace_when_close_unconfirmed() {
        let mock = MockConnector::new();
        mock.set_echo_close(false);
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();

        let started = Instant::now();
        link.disconnect().await.unwrap();
        assert_eq!(link.state(), LinkState::Idle);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.disconnect().await.unwrap();
        assert_eq!(link.state(), LinkState::Idle);
        assert!(mock.closes().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_later_calls() {
        let mock = MockConnector::new();
        let (link, _sink) = link(&mock);
        link.connect(ROBOT).await.unwrap();
        link.shutdown();
        link.wait_for_state(LinkState::Idle).await.ok();
        tokio::task::yield_now().await;
        assert_eq!(link.send("x").await.unwrap_err(), LinkError::Shutdown);
    }
}
