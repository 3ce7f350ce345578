#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A bound but not yet accepting WebSocket server.
pub struct MockPeerListener {
    listener: TcpListener,
}

impl MockPeerListener {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self { listener }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr(), path)
    }

    /// Completes the WebSocket handshake for the next client.
    pub async fn accept(self) -> MockPeer {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept())
            .await
            .expect("no client connected")
            .unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut sink, mut stream) = ws.split();

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            let mut outbound_open = true;
            loop {
                tokio::select! {
                    msg = outbound_rx.recv(), if outbound_open => match msg {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => outbound_open = false,
                    },
                    inbound = stream.next() => match inbound {
                        Some(Ok(msg)) => {
                            if frames_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        _ => break,
                    },
                }
            }
        });

        MockPeer {
            frames: frames_rx,
            outbound: outbound_tx,
        }
    }

    /// Asserts nobody opened a connection within the quiet period.
    pub async fn assert_no_connection(&self) {
        let accepted = timeout(QUIET_PERIOD, self.listener.accept()).await;
        assert!(accepted.is_err(), "unexpected transport connection");
    }
}

/// The server side of one accepted connection.
pub struct MockPeer {
    frames: mpsc::UnboundedReceiver<Message>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl MockPeer {
    pub fn send_text(&self, text: &str) {
        self.outbound.send(Message::Text(text.to_string())).unwrap();
    }

    pub fn send(&self, message: Message) {
        self.outbound.send(message).unwrap();
    }

    pub async fn next_frame(&mut self) -> Message {
        timeout(RECV_TIMEOUT, self.frames.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("peer connection ended")
    }

    /// Next text frame, skipping control frames.
    pub async fn next_text(&mut self) -> String {
        loop {
            match self.next_frame().await {
                Message::Text(text) => return text,
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("expected text frame, got {:?}", other),
            }
        }
    }

    pub async fn assert_no_frame(&mut self) {
        let frame = timeout(QUIET_PERIOD, self.frames.recv()).await;
        assert!(frame.is_err(), "unexpected frame: {:?}", frame);
    }
}
