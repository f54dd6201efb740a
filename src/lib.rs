//! Robolink - remote-control client for a wheeled robot
//!
//! Builds the robot's text command packets and keeps a WebSocket link to it
//! alive: keepalive pings, bounded reconnects and a clean disconnect.

pub mod drive;
pub mod error;
pub mod link;
pub mod protocol;
pub mod sink;

pub use error::{LinkError, Result};
pub use link::{LinkConfig, LinkManager, LinkState, LinkStatus};
pub use protocol::PacketEncoder;
pub use sink::{LogSink, MemorySink, Severity, TracingSink};
