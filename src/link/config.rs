//! Timing and retry configuration for the link

use std::time::Duration;

/// Close code sent on an operator-requested disconnect
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the transport vanished without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Configuration for a LinkManager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Interval between keepalive pings while open
    pub keepalive_interval: Duration,
    /// Delay before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Limit on a single connect attempt
    pub connect_timeout: Duration,
    /// How long disconnect waits for the close handshake
    pub disconnect_grace: Duration,
    /// Limit on writing one frame (message or ping) to the transport
    pub send_timeout: Duration,
    /// Reason text sent in the close frame
    pub close_reason: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(5),
            disconnect_grace: Duration::from_secs(2),
            send_timeout: Duration::from_secs(5),
            close_reason: "User disconnected".to_string(),
        }
    }
}

impl LinkConfig {
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
