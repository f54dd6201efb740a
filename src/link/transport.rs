//! Transport seam between the link state machine and the socket.
//!
//! A `Connector` performs the handshake and hands back a `Connection`. The
//! connection pushes inbound traffic to the link through an `InboundTx`, which
//! tags everything with the generation of the connection that produced it.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;
use crate::link::manager::Command;

/// Inbound traffic and transport notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    /// Peer probed us; the transport has already answered it
    Ping,
    /// Answer to one of our probes
    Pong,
    /// Transport-level failure; a `Closed` follows if the connection is gone
    Error(String),
    /// Connection is finished. `remote` is false when we sent the close frame
    Closed {
        code: u16,
        reason: String,
        remote: bool,
    },
}

/// Sending half of the link's command queue, bound to one connection
#[derive(Debug, Clone)]
pub struct InboundTx {
    generation: u64,
    tx: mpsc::WeakUnboundedSender<Command>,
}

impl InboundTx {
    pub(crate) fn new(generation: u64, tx: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self { generation, tx }
    }

    /// Deliver an event; returns false once the link has gone away
    pub fn emit(&self, event: Inbound) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx
                .send(Command::Transport {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Opens connections to a target
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake. Failures are `LinkError::TransportError`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>>;
}

/// One established connection
#[async_trait]
pub trait Connection: Send {
    /// Begin delivering inbound traffic. Called once, when the link opens.
    fn start(&mut self, inbound: InboundTx);

    async fn send_text(&mut self, text: &str) -> Result<()>;

    async fn send_binary(&mut self, bytes: &[u8]) -> Result<()>;

    /// Send a keepalive probe
    async fn send_ping(&mut self) -> Result<()>;

    /// Send a close frame; completion is reported as `Inbound::Closed`
    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inbound = InboundTx::new(7, tx.downgrade());
        assert!(inbound.emit(Inbound::Pong));

        match rx.recv().await {
            Some(Command::Transport { generation, event }) => {
                assert_eq!(generation, 7);
                assert_eq!(event, Inbound::Pong);
            }
            other => panic!("unexpected command: {:?}", other.is_some()),
        }
    }

    #[tokio::test]
    async fn test_emit_after_link_gone() {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let inbound = InboundTx::new(1, tx.downgrade());
        drop(tx);
        drop(rx);
        assert!(!inbound.emit(Inbound::Text("late".into())));
        assert_eq!(inbound.generation(), 1);
    }
}
