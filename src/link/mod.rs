//! Robot link: a supervised WebSocket connection.
//!
//! `LinkManager` is the entry point. The transport sits behind the
//! `Connector`/`Connection` traits so the state machine can be driven by the
//! real socket (`WsConnector`) or by a scripted one (`MockConnector`).

pub mod config;
pub mod event;
pub mod manager;
pub mod mock;
pub mod periodic;
pub mod state;
pub mod transport;
pub mod ws;

pub use config::{ABNORMAL_CLOSURE, LinkConfig, NORMAL_CLOSURE};
pub use event::LinkEvent;
pub use manager::{LinkManager, parse_address};
pub use mock::{ConnectOutcome, MockConnector};
pub use periodic::{PeriodicSender, numbered_messages};
pub use state::{LinkState, LinkStatus};
pub use transport::{Connection, Connector, Inbound, InboundTx};
pub use ws::{WsConnection, WsConnector};
