//! Link lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the link is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No connection and none wanted
    Idle,
    /// First handshake in flight
    Connecting,
    /// Connected; keepalive running
    Open,
    /// Operator-requested close in progress
    Closing,
    /// Lost an open connection; retrying on a timer
    Reconnecting,
    /// Gave up; needs an explicit connect
    Failed,
}

impl LinkState {
    /// States from which a fresh connect is accepted
    pub fn accepts_connect(&self) -> bool {
        matches!(self, LinkState::Idle | LinkState::Failed)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Idle => "idle",
            LinkState::Connecting => "connecting",
            LinkState::Open => "open",
            LinkState::Closing => "closing",
            LinkState::Reconnecting => "reconnecting",
            LinkState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Observable snapshot of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    /// Reconnect attempts since the link was last open
    pub reconnect_attempts: u32,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            reconnect_attempts: 0,
        }
    }
}
