use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::SessionError;
use crate::session::{SessionShared, SessionState};
use crate::websocket::{CloseEvent, InboundMessage};

/// Exclusive handle on one transport. Outbound frames go through an unbounded
/// channel to the driver task, which keeps them in send order.
pub(crate) struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Spawns the driver task. Must be called from within a Tokio runtime.
    pub(crate) fn open(url: Url, shared: Arc<SessionShared>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(url, shared, rx));
        Self { tx, task }
    }

    pub(crate) fn send_text(&self, text: String) -> Result<(), SessionError> {
        self.tx
            .send(Message::Text(text))
            .map_err(|_| SessionError::TransportClosed("transport task has stopped".to_string()))
    }

    /// Tears the transport down. An established socket gets a normal close
    /// frame after any frames already queued; a pending connect is abandoned.
    pub(crate) fn shutdown(self, established: bool) {
        if established {
            let frame = CloseEvent::normal().to_frame();
            if self.tx.send(Message::Close(Some(frame))).is_err() {
                debug!("Transport task already stopped before close");
            }
        } else {
            self.task.abort();
        }
    }
}

async fn drive(url: Url, shared: Arc<SessionShared>, mut rx: mpsc::UnboundedReceiver<Message>) {
    let session_id = shared.id();

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            error!("Session {} failed to connect to {}: {}", session_id, url, e);
            shared.finish(SessionState::Failed, CloseEvent::abnormal(e.to_string()));
            return;
        }
    };

    if !shared.transition(SessionState::Open) {
        debug!("Session {} no longer wants connection {}", session_id, url);
        return;
    }
    info!("Session {} connected to {}", session_id, url);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let event = loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = ws_sink.send(message).await {
                        error!("Session {} failed to send frame: {}", session_id, e);
                        break CloseEvent::abnormal(e.to_string());
                    }
                    if closing {
                        break CloseEvent::normal();
                    }
                }
                None => {
                    // Session dropped without an explicit close
                    if let Err(e) = ws_sink.close().await {
                        debug!("Session {} close on drop failed: {}", session_id, e);
                    }
                    break CloseEvent::normal();
                }
            },
            inbound = ws_stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    shared.dispatch(InboundMessage::new(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    break CloseEvent::from_frame(frame);
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(
                        "Session {} discarded unsupported binary frame ({} bytes)",
                        session_id,
                        data.len()
                    );
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Session {} transport error: {}", session_id, e);
                    break CloseEvent::abnormal(e.to_string());
                }
                None => {
                    break CloseEvent::abnormal("connection dropped without close frame");
                }
            },
        }
    };

    let discarded = discard_pending(&mut rx);
    if discarded > 0 {
        warn!(
            "Session {} transport closed with {} queued frame(s) unsent",
            session_id, discarded
        );
    }
    shared.finish(SessionState::Closed, event);
}

/// Stops accepting outbound frames and drops whatever is still queued.
/// Returns how many text frames were lost.
fn discard_pending(rx: &mut mpsc::UnboundedReceiver<Message>) -> usize {
    rx.close();

    let mut discarded = 0;
    while let Ok(message) = rx.try_recv() {
        if matches!(message, Message::Text(_)) {
            discarded += 1;
        }
    }
    discarded
}
