//! Link over a real WebSocket against a local echo robot

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use robolink::link::{LinkConfig, LinkManager, LinkState};
use robolink::sink::MemorySink;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Accept one client and echo its text frames; close with 1001 when told to
async fn echo_robot(listener: TcpListener, close_after: Option<usize>) {
    let (tcp, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
    let mut echoed = 0;
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            ws.send(Message::Text(format!("ack {}", text))).await.unwrap();
            echoed += 1;
            if close_after == Some(echoed) {
                let _ = ws
                    .close(Some(CloseFrame {
                        code: CloseCode::Away,
                        reason: "robot powering down".into(),
                    }))
                    .await;
            }
        }
    }
}

async fn wait_for_log(sink: &MemorySink, needle: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !sink.contains(needle) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no log line containing {:?}: {:?}", needle, sink.entries()));
}

#[tokio::test]
async fn test_send_receive_and_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let robot = tokio::spawn(echo_robot(listener, None));

    let sink = Arc::new(MemorySink::new());
    let link = LinkManager::websocket(LinkConfig::default(), sink.clone());
    link.connect(&format!("ws://{}", addr)).await.unwrap();
    assert_eq!(link.state(), LinkState::Open);

    link.send("001XA!AA[20:20:20:20:20:20]").await.unwrap();
    wait_for_log(&sink, "Received message: ack 001XA!AA[20:20:20:20:20:20]").await;

    link.disconnect().await.unwrap();
    assert_eq!(link.state(), LinkState::Idle);
    wait_for_log(&sink, "Link closed: code=1000, reason=User disconnected, remote=false").await;

    tokio::time::timeout(Duration::from_secs(5), robot).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_robot_close_then_reconnect_gives_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Serves one session then stops listening, so reconnects are refused
    let robot = tokio::spawn(echo_robot(listener, Some(1)));

    let sink = Arc::new(MemorySink::new());
    let config = LinkConfig::default()
        .with_reconnect_delay(Duration::from_millis(50))
        .with_max_reconnect_attempts(2);
    let link = LinkManager::websocket(config, sink.clone());
    link.connect(&format!("ws://{}", addr)).await.unwrap();

    link.send("hello").await.unwrap();
    wait_for_log(&sink, "Link closed: code=1001, reason=robot powering down, remote=true").await;
    tokio::time::timeout(Duration::from_secs(5), robot).await.unwrap().unwrap();

    let status = tokio::time::timeout(Duration::from_secs(5), link.wait_for_state(LinkState::Failed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.reconnect_attempts, 2);
    assert!(sink.contains("after 2 attempts"));
}
