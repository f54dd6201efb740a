//! Error types for robolink
//!
//! Centralized error handling using thiserror. Every public link operation
//! returns one of these instead of panicking.

use thiserror::Error;

/// All error types that can occur on the robot link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Target address is empty or not a ws:// / wss:// URL
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Initial connection attempt failed
    #[error("Handshake with {target} failed: {reason}")]
    HandshakeFailure { target: String, reason: String },

    /// Send attempted while the link is not open
    #[error("Not connected (link is {state}), message dropped")]
    NotConnected { state: String },

    /// Transport reported a failure while sending
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Peer or transport closed an open link without being asked to
    #[error("Connection lost: code={code}, reason={reason}")]
    UnsolicitedClose { code: u16, reason: String },

    /// Automatic recovery gave up
    #[error("Max reconnect attempts exceeded for {target} after {attempts} attempts")]
    MaxReconnectAttemptsExceeded { target: String, attempts: u32 },

    /// The manager's lifecycle task is no longer running
    #[error("Link manager has shut down")]
    Shutdown,
}

/// Result type alias for link operations
pub type Result<T> = std::result::Result<T, LinkError>;
