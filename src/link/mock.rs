//! Scripted in-memory transport for tests and dry runs.
//!
//! Connect outcomes are taken from a script, falling back to a default once the
//! script is empty. Everything the link writes is recorded for inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use url::Url;

use crate::error::{LinkError, Result};
use crate::link::transport::{Connection, Connector, Inbound, InboundTx};

/// What the next connect attempt does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Handshake succeeds
    Accept,
    /// Handshake fails with this reason
    Refuse(String),
    /// Handshake never completes
    Hang,
}

#[derive(Debug)]
struct MockState {
    script: Mutex<VecDeque<ConnectOutcome>>,
    fallback: Mutex<ConnectOutcome>,
    connect_calls: AtomicUsize,
    targets: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    sent_binary: Mutex<Vec<Vec<u8>>>,
    pings: AtomicUsize,
    closes: Mutex<Vec<(u16, String)>>,
    inbound: Mutex<Option<InboundTx>>,
    echo_close: AtomicBool,
    fail_sends: AtomicBool,
    fail_pings: AtomicBool,
    stall_writes: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable handle; all clones share one script and one record
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Connector that accepts every handshake and echoes close frames
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                script: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(ConnectOutcome::Accept),
                connect_calls: AtomicUsize::new(0),
                targets: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                sent_binary: Mutex::new(Vec::new()),
                pings: AtomicUsize::new(0),
                closes: Mutex::new(Vec::new()),
                inbound: Mutex::new(None),
                echo_close: AtomicBool::new(true),
                fail_sends: AtomicBool::new(false),
                fail_pings: AtomicBool::new(false),
                stall_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Queue the outcome of a future connect attempt
    pub fn push_outcome(&self, outcome: ConnectOutcome) -> &Self {
        lock(&self.state.script).push_back(outcome);
        self
    }

    /// Outcome used once the script runs out
    pub fn set_fallback(&self, outcome: ConnectOutcome) -> &Self {
        *lock(&self.state.fallback) = outcome;
        self
    }

    /// When false, close frames are never confirmed
    pub fn set_echo_close(&self, echo: bool) -> &Self {
        self.state.echo_close.store(echo, Ordering::SeqCst);
        self
    }

    pub fn set_fail_sends(&self, fail: bool) -> &Self {
        self.state.fail_sends.store(fail, Ordering::SeqCst);
        self
    }

    pub fn set_fail_pings(&self, fail: bool) -> &Self {
        self.state.fail_pings.store(fail, Ordering::SeqCst);
        self
    }

    /// When true, message and ping writes never complete, like a socket
    /// whose send buffer stays full
    pub fn set_stall_writes(&self, stall: bool) -> &Self {
        self.state.stall_writes.store(stall, Ordering::SeqCst);
        self
    }

    /// Number of connect attempts, successful or not
    pub fn connect_calls(&self) -> usize {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    /// Targets passed to connect, in order
    pub fn targets(&self) -> Vec<String> {
        lock(&self.state.targets).clone()
    }

    /// Text payloads written to any connection
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state.sent).clone()
    }

    /// Binary payloads written to any connection
    pub fn sent_binary(&self) -> Vec<Vec<u8>> {
        lock(&self.state.sent_binary).clone()
    }

    pub fn pings(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Close frames written, as (code, reason)
    pub fn closes(&self) -> Vec<(u16, String)> {
        lock(&self.state.closes).clone()
    }

    /// Push inbound traffic on the most recently started connection
    pub fn push_inbound(&self, event: Inbound) -> bool {
        match lock(&self.state.inbound).as_ref() {
            Some(inbound) => inbound.emit(event),
            None => false,
        }
    }

    /// Simulate the robot dropping the current connection
    pub fn drop_connection(&self, code: u16, reason: &str) -> bool {
        self.push_inbound(Inbound::Closed {
            code,
            reason: reason.to_string(),
            remote: true,
        })
    }

    fn next_outcome(&self) -> ConnectOutcome {
        lock(&self.state.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.state.fallback).clone())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.targets).push(url.to_string());

        match self.next_outcome() {
            ConnectOutcome::Accept => Ok(Box::new(MockConnection {
                state: Arc::clone(&self.state),
                inbound: None,
            })),
            ConnectOutcome::Refuse(reason) => Err(LinkError::TransportError(reason)),
            ConnectOutcome::Hang => {
                std::future::pending::<()>().await;
                Err(LinkError::TransportError("unreachable".into()))
            }
        }
    }
}

struct MockConnection {
    state: Arc<MockState>,
    inbound: Option<InboundTx>,
}

impl MockConnection {
    async fn write_gate(&self, fail: &AtomicBool, what: &str) -> Result<()> {
        if self.state.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if fail.load(Ordering::SeqCst) {
            return Err(LinkError::TransportError(format!("mock {} failure", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn start(&mut self, inbound: InboundTx) {
        *lock(&self.state.inbound) = Some(inbound.clone());
        self.inbound = Some(inbound);
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.write_gate(&self.state.fail_sends, "send").await?;
        lock(&self.state.sent).push(text.to_string());
        Ok(())
    }

    async fn send_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_gate(&self.state.fail_sends, "send").await?;
        lock(&self.state.sent_binary).push(bytes.to_vec());
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<()> {
        self.write_gate(&self.state.fail_pings, "ping").await?;
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        lock(&self.state.closes).push((code, reason.to_string()));
        if self.state.echo_close.load(Ordering::SeqCst)
            && let Some(inbound) = &self.inbound
        {
            inbound.emit(Inbound::Closed {
                code,
                reason: reason.to_string(),
                remote: false,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::manager::Command;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn url() -> Url {
        Url::parse("ws://robot.local:2005").unwrap()
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockConnector::new();
        mock.push_outcome(ConnectOutcome::Refuse("refused".into()));
        mock.set_fallback(ConnectOutcome::Refuse("still down".into()));

        match mock.connect(&url()).await {
            Err(LinkError::TransportError(reason)) => assert_eq!(reason, "refused"),
            _ => panic!("expected scripted refusal"),
        }
        match mock.connect(&url()).await {
            Err(LinkError::TransportError(reason)) => assert_eq!(reason, "still down"),
            _ => panic!("expected fallback refusal"),
        }
        assert_eq!(mock.connect_calls(), 2);
        assert_eq!(mock.targets(), vec!["ws://robot.local:2005/"; 2]);
    }

    #[tokio::test]
    async fn test_records_traffic() {
        let mock = MockConnector::new();
        let mut conn = mock.connect(&url()).await.unwrap();
        conn.send_text("001XA?CA[1]").await.unwrap();
        conn.send_binary(&[1, 2, 3]).await.unwrap();
        conn.send_ping().await.unwrap();
        assert_eq!(mock.sent(), vec!["001XA?CA[1]".to_string()]);
        assert_eq!(mock.sent_binary(), vec![vec![1u8, 2, 3]]);
        assert_eq!(mock.pings(), 1);

        mock.set_fail_sends(true);
        assert!(conn.send_text("dropped").await.is_err());
        assert!(conn.send_binary(&[9]).await.is_err());
        assert_eq!(mock.sent().len(), 1);
        assert_eq!(mock.sent_binary().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_writes_never_complete() {
        let mock = MockConnector::new();
        let mut conn = mock.connect(&url()).await.unwrap();
        mock.set_stall_writes(true);

        let send = tokio::time::timeout(Duration::from_secs(60), conn.send_text("stuck")).await;
        assert!(send.is_err());
        let ping = tokio::time::timeout(Duration::from_secs(60), conn.send_ping()).await;
        assert!(ping.is_err());
        assert!(mock.sent().is_empty());
        assert_eq!(mock.pings(), 0);
    }

    #[tokio::test]
    async fn test_close_echo_and_drop() {
        let mock = MockConnector::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut conn = mock.connect(&url()).await.unwrap();
        conn.start(InboundTx::new(1, tx.downgrade()));

        conn.close(1000, "bye").await.unwrap();
        assert!(mock.drop_connection(1006, "cable"));

        let mut events = Vec::new();
        while let Ok(Command::Transport { event, .. }) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                Inbound::Closed {
                    code: 1000,
                    reason: "bye".into(),
                    remote: false
                },
                Inbound::Closed {
                    code: 1006,
                    reason: "cable".into(),
                    remote: true
                },
            ]
        );
        assert_eq!(mock.closes(), vec![(1000, "bye".to_string())]);
    }

    #[test]
    fn test_push_inbound_without_connection() {
        let mock = MockConnector::new();
        assert!(!mock.push_inbound(Inbound::Pong));
    }
}
