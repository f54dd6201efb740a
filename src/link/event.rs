//! Link events delivered to the log sink.
//!
//! One closed enum instead of a callback per protocol event. Each variant has a
//! fixed severity and renders as one status line.

use std::fmt;
use std::time::Duration;

use crate::error::LinkError;
use crate::link::state::LinkState;
use crate::sink::Severity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Handshake started
    Connecting { target: String },
    /// Handshake completed
    Opened { target: String },
    /// Close frame sent by us
    Closing { code: u16, reason: String },
    /// Connection closed, by either side
    Closed { code: u16, reason: String, remote: bool },
    /// Any failure
    Error(LinkError),
    /// Inbound payload, passed through as opaque text
    Message { text: String },
    /// Outbound payload delivered to the transport
    Sent { text: String },
    /// Outbound binary payload delivered to the transport
    SentBinary { len: usize },
    PingSent,
    /// Keepalive probe could not be written
    PingFailed { reason: String },
    PingReceived,
    PongReceived,
    /// A reconnect attempt is queued
    ReconnectScheduled { attempt: u32, ceiling: u32, delay: Duration },
    /// Operation refused in the current state without side effects
    Ignored { operation: &'static str, state: LinkState },
}

impl LinkEvent {
    pub fn severity(&self) -> Severity {
        match self {
            LinkEvent::Error(_) => Severity::Error,
            LinkEvent::PingSent
            | LinkEvent::PingFailed { .. }
            | LinkEvent::PingReceived
            | LinkEvent::PongReceived => Severity::Debug,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Connecting { target } => write!(f, "Connecting to {}", target),
            LinkEvent::Opened { target } => write!(f, "Link opened: {}", target),
            LinkEvent::Closing { code, reason } => {
                write!(f, "Link closing: code={}, reason={}", code, reason)
            }
            LinkEvent::Closed {
                code,
                reason,
                remote,
            } => write!(
                f,
                "Link closed: code={}, reason={}, remote={}",
                code, reason, remote
            ),
            LinkEvent::Error(err) => write!(f, "Link error: {}", err),
            LinkEvent::Message { text } => write!(f, "Received message: {}", text),
            LinkEvent::Sent { text } => write!(f, "Sent message: {}", text),
            LinkEvent::SentBinary { len } => write!(f, "Sent binary message: {} bytes", len),
            LinkEvent::PingSent => f.write_str("Ping sent"),
            LinkEvent::PingFailed { reason } => write!(f, "Ping not sent: {}", reason),
            LinkEvent::PingReceived => f.write_str("Ping received"),
            LinkEvent::PongReceived => f.write_str("Pong received"),
            LinkEvent::ReconnectScheduled {
                attempt,
                ceiling,
                delay,
            } => write!(
                f,
                "Reconnect attempt {}/{} in {}ms",
                attempt,
                ceiling,
                delay.as_millis()
            ),
            LinkEvent::Ignored { operation, state } => {
                write!(f, "Ignoring {}: link is {}", operation, state)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(
            LinkEvent::Opened {
                target: "ws://robot/".into()
            }
            .severity(),
            Severity::Info
        );
        assert_eq!(LinkEvent::PingSent.severity(), Severity::Debug);
        assert_eq!(LinkEvent::PongReceived.severity(), Severity::Debug);
        assert_eq!(
            LinkEvent::PingFailed {
                reason: "closed".into()
            }
            .severity(),
            Severity::Debug
        );
        assert_eq!(
            LinkEvent::Error(LinkError::TransportError("x".into())).severity(),
            Severity::Error
        );
        assert_eq!(
            LinkEvent::Ignored {
                operation: "connect",
                state: LinkState::Open
            }
            .severity(),
            Severity::Info
        );
    }

    #[test]
    fn test_closed_rendering() {
        let event = LinkEvent::Closed {
            code: 1006,
            reason: "".into(),
            remote: true,
        };
        assert_eq!(event.to_string(), "Link closed: code=1006, reason=, remote=true");
    }

    #[test]
    fn test_reconnect_rendering() {
        let event = LinkEvent::ReconnectScheduled {
            attempt: 2,
            ceiling: 5,
            delay: Duration::from_secs(5),
        };
        assert_eq!(event.to_string(), "Reconnect attempt 2/5 in 5000ms");
    }

    #[test]
    fn test_error_rendering_keeps_context() {
        let event = LinkEvent::Error(LinkError::MaxReconnectAttemptsExceeded {
            target: "ws://robot:2005/".into(),
            attempts: 5,
        });
        let line = event.to_string();
        assert!(line.starts_with("Link error: "));
        assert!(line.contains("ws://robot:2005/"));
        assert!(line.contains("5 attempts"));
    }

    #[test]
    fn test_sent_rendering() {
        let event = LinkEvent::Sent {
            text: "001XA!AA[0:0:0:0:0:0]".into(),
        };
        assert_eq!(event.to_string(), "Sent message: 001XA!AA[0:0:0:0:0:0]");
        assert_eq!(LinkEvent::SentBinary { len: 3 }.to_string(), "Sent binary message: 3 bytes");
    }
}
