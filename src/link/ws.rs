//! WebSocket transport built on tokio-tungstenite.
//!
//! Incoming pings are answered by tungstenite itself; we only report them.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::{LinkError, Result};
use crate::link::config::ABNORMAL_CLOSURE;
use crate::link::transport::{Connection, Connector, Inbound, InboundTx};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects over ws:// (and wss:// with the `tls` feature)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Connection>> {
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))?;
        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (sink, source) = stream.split();
        Ok(Box::new(WsConnection {
            sink,
            source: Some(source),
            local_close: Arc::new(AtomicBool::new(false)),
            reader: None,
        }))
    }
}

/// An open WebSocket; the read half runs in its own task once started
pub struct WsConnection {
    sink: SplitSink<WsStream, Message>,
    source: Option<SplitStream<WsStream>>,
    local_close: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl Connection for WsConnection {
    fn start(&mut self, inbound: InboundTx) {
        if let Some(source) = self.source.take() {
            let local_close = Arc::clone(&self.local_close);
            self.reader = Some(tokio::spawn(read_loop(source, inbound, local_close)));
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))
    }

    async fn send_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink
            .send(Message::Binary(bytes.to_vec()))
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<()> {
        self.sink
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.local_close.store(true, Ordering::SeqCst);
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: Cow::Owned(reason.to_owned()),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| LinkError::TransportError(e.to_string()))
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Pump inbound frames until the stream ends, then report exactly one `Closed`
async fn read_loop(mut source: SplitStream<WsStream>, inbound: InboundTx, local_close: Arc<AtomicBool>) {
    let mut close_info: Option<(u16, String)> = None;

    while let Some(frame) = source.next().await {
        let event = match frame {
            Ok(Message::Text(text)) => Inbound::Text(text),
            Ok(Message::Binary(bytes)) => Inbound::Binary(bytes),
            Ok(Message::Ping(_)) => Inbound::Ping,
            Ok(Message::Pong(_)) => Inbound::Pong,
            Ok(Message::Close(frame)) => {
                // Keep reading so tungstenite can flush its close reply
                close_info = Some(match frame {
                    Some(f) => (u16::from(f.code), f.reason.into_owned()),
                    None => (u16::from(CloseCode::Status), String::new()),
                });
                continue;
            }
            Ok(Message::Frame(_)) => continue,
            Err(e) => {
                if close_info.is_none() {
                    let reason = e.to_string();
                    inbound.emit(Inbound::Error(reason.clone()));
                    close_info = Some((ABNORMAL_CLOSURE, reason));
                }
                break;
            }
        };
        if !inbound.emit(event) {
            return;
        }
    }

    let (code, reason) =
        close_info.unwrap_or_else(|| (ABNORMAL_CLOSURE, "connection dropped".to_string()));
    inbound.emit(Inbound::Closed {
        code,
        reason,
        remote: !local_close.load(Ordering::SeqCst),
    });
}
