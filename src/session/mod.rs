//! Session handshake client
//!
//! A [`Session`] runs the join → connect → send/receive flow for exactly one
//! transport. It is owned by a single caller; notifications from the
//! transport (open, message, close) arrive on the Tokio runtime and are
//! published through the shared state below.

mod state;

pub use state::{ReadyState, SessionState};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::JoinConfig;
use crate::error::SessionError;
use crate::join::JoinClient;
use crate::websocket::{self, ClientMessage, CloseEvent, Connection, InboundMessage};
use crate::Result;

type MessageHandler = Box<dyn FnMut(InboundMessage) + Send + 'static>;
type CloseHandler = Box<dyn FnOnce(CloseEvent) + Send + 'static>;

#[derive(Default)]
struct Notify {
    on_message: Option<MessageHandler>,
    on_close: Option<CloseHandler>,
    close_event: Option<CloseEvent>,
    failure: Option<String>,
}

/// State visible to both the owning [`Session`] and its transport task.
pub(crate) struct SessionShared {
    id: Uuid,
    state: watch::Sender<SessionState>,
    notify: Mutex<Notify>,
}

impl SessionShared {
    fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            id: Uuid::new_v4(),
            state,
            notify: Mutex::new(Notify::default()),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Moves to `next` if the lifecycle allows it. Returns whether it did.
    pub(crate) fn transition(&self, next: SessionState) -> bool {
        let mut from = SessionState::Idle;
        let moved = self.state.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if moved {
            debug!("Session {} {} -> {}", self.id, from, next);
        } else {
            debug!("Session {} ignored transition {} -> {}", self.id, from, next);
        }
        moved
    }

    /// Moves to a terminal state and notifies the close handler, once.
    pub(crate) fn finish(&self, next: SessionState, event: CloseEvent) {
        if !self.transition(next) {
            return;
        }

        if next == SessionState::Failed {
            error!("Session {} failed: {}", self.id, event);
        } else {
            info!("Session {} closed with {}", self.id, event);
        }

        let handler = {
            let mut notify = self.notify();
            if next == SessionState::Failed {
                notify.failure = Some(event.to_string());
            }
            notify.close_event = Some(event.clone());
            notify.on_close.take()
        };

        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Fails a session that never got a transport. No close notification.
    fn fail(&self, err: &SessionError) {
        if self.transition(SessionState::Failed) {
            error!("Session {} failed: {}", self.id, err);
            self.notify().failure = Some(err.to_string());
        }
    }

    pub(crate) fn dispatch(&self, message: InboundMessage) {
        let handler = self.notify().on_message.take();

        match handler {
            Some(mut handler) => {
                handler(message);
                // Keep the handler unless it was replaced while running.
                let mut notify = self.notify();
                if notify.on_message.is_none() {
                    notify.on_message = Some(handler);
                }
            }
            None => {
                debug!(
                    "Session {} dropped inbound message, no handler registered: {}",
                    self.id,
                    message.text()
                );
            }
        }
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        self.notify().on_message = Some(handler);
    }

    fn set_close_handler(&self, handler: CloseHandler) {
        let closed = {
            let mut notify = self.notify();
            match notify.close_event.clone() {
                Some(event) => Some((event, handler)),
                None => {
                    notify.on_close = Some(handler);
                    None
                }
            }
        };

        if let Some((event, handler)) = closed {
            handler(event);
        }
    }

    fn notify(&self) -> MutexGuard<'_, Notify> {
        self.notify.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One logical client-to-server connection, from join request through close.
///
/// Sessions are single use: once `Closed` or `Failed`, build a new one to retry.
///
/// ```ignore
/// let mut session = Session::new(JoinConfig::new("http://localhost:9000/join"));
/// session.on_message(|msg| println!("{}", msg.text()));
/// session.request_join().await?;
/// session.wait_until_open().await?;
/// session.send_message(&ClientMessage::RequestJoinGame)?;
/// ```
pub struct Session {
    shared: Arc<SessionShared>,
    config: JoinConfig,
    join_client: JoinClient,
    socket_url: Option<Url>,
    connection: Option<Connection>,
}

impl Session {
    pub fn new(config: JoinConfig) -> Self {
        Self::with_join_client(config, JoinClient::new())
    }

    pub fn with_join_client(config: JoinConfig, join_client: JoinClient) -> Self {
        Self {
            shared: Arc::new(SessionShared::new()),
            config,
            join_client,
            socket_url: None,
            connection: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Readiness of the underlying transport, `None` before one exists.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.connection.as_ref()?;
        self.state().ready_state()
    }

    pub fn socket_url(&self) -> Option<&Url> {
        self.socket_url.as_ref()
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    /// Performs the HTTP join, then starts opening the transport it names.
    ///
    /// Resolves once the transport is `Connecting`; use
    /// [`wait_until_open`](Self::wait_until_open) to await the open signal.
    /// No retry is attempted on failure.
    pub async fn request_join(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.shared.transition(SessionState::Joining);
        info!("Session {} joining via {}", self.id(), self.config.endpoint);

        // Closes the session if this future is dropped before the join resolves.
        let _guard = JoinGuard {
            shared: Arc::clone(&self.shared),
        };

        match self.join_client.join(&self.config).await {
            Ok(url) => {
                self.connect(url);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(&e);
                Err(e)
            }
        }
    }

    /// Starts opening a transport to `url` directly, skipping the join.
    ///
    /// Returns as soon as the session is `Connecting`. A malformed URL fails
    /// here and leaves the session `Failed`.
    pub fn open_connection(&mut self, url: &str) -> Result<()> {
        self.ensure_idle()?;

        match websocket::validate_socket_url(url) {
            Ok(url) => {
                self.connect(url);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(&e);
                Err(e)
            }
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.state() {
            SessionState::Idle => Ok(()),
            state => {
                warn!("Session {} rejected join/open while {}", self.id(), state);
                Err(SessionError::InvalidState(state))
            }
        }
    }

    fn connect(&mut self, url: Url) {
        self.shared.transition(SessionState::Connecting);
        info!("Session {} opening websocket connection {}", self.id(), url);
        self.connection = Some(Connection::open(url.clone(), Arc::clone(&self.shared)));
        self.socket_url = Some(url);
    }

    /// Waits for the outcome of the pending connect.
    pub async fn wait_until_open(&self) -> Result<()> {
        let mut rx = self.shared.state.subscribe();
        let state = *rx
            .wait_for(|s| !matches!(s, SessionState::Joining | SessionState::Connecting))
            .await
            .map_err(|_| SessionError::NotConnected)?;

        match state {
            SessionState::Open => Ok(()),
            SessionState::Idle => Err(SessionError::NotConnected),
            SessionState::Closed => {
                let reason = self
                    .shared
                    .notify()
                    .close_event
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "closed before opening".to_string());
                Err(SessionError::TransportClosed(reason))
            }
            SessionState::Failed | SessionState::Joining | SessionState::Connecting => {
                let reason = self
                    .shared
                    .notify()
                    .failure
                    .clone()
                    .unwrap_or_else(|| "session failed".to_string());
                Err(SessionError::ConnectFailed(reason))
            }
        }
    }

    /// Transmits `payload` verbatim as one text frame.
    ///
    /// Nothing is queued: a send before the transport is open fails with
    /// `NotReady` and the payload is dropped.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        let connection = self.connection.as_ref().ok_or(SessionError::NotConnected)?;

        match self.state() {
            SessionState::Open => connection.send_text(payload.into()),
            SessionState::Closed | SessionState::Failed => Err(SessionError::NotConnected),
            state => {
                let ready = state.ready_state().unwrap_or(ReadyState::Connecting);
                warn!("Session {} send rejected, transport {}", self.id(), ready);
                Err(SessionError::NotReady(ready))
            }
        }
    }

    /// Serializes `message` as JSON and sends it.
    pub fn send_message(&self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.send(text)
    }

    /// Registers the callback for inbound text frames, replacing any previous
    /// one. Frames are delivered one at a time in arrival order. Register
    /// before joining to be sure no frame is missed.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(InboundMessage) + Send + 'static,
    {
        self.shared.set_message_handler(Box::new(handler));
    }

    /// Registers the callback run once when the transport closes. If the
    /// transport already closed it runs immediately.
    pub fn on_close<F>(&self, handler: F)
    where
        F: FnOnce(CloseEvent) + Send + 'static,
    {
        self.shared.set_close_handler(Box::new(handler));
    }

    /// Tears the session down. Does nothing on a `Closed` or `Failed` session.
    pub fn close(&mut self) {
        let state = self.state();
        if state.is_terminal() {
            debug!("Session {} already {}, close ignored", self.id(), state);
            return;
        }

        match self.connection.take() {
            Some(connection) => {
                connection.shutdown(state == SessionState::Open);
                self.shared.finish(SessionState::Closed, CloseEvent::normal());
            }
            None => {
                if self.shared.transition(SessionState::Closed) {
                    info!("Session {} closed before connecting", self.id());
                }
            }
        }
    }
}

/// Armed for the duration of a join request. A join future dropped while
/// still `Joining` (e.g. by a caller's timeout) leaves the session `Closed`.
struct JoinGuard {
    shared: Arc<SessionShared>,
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        if self.shared.state() == SessionState::Joining
            && self.shared.transition(SessionState::Closed)
        {
            warn!("Session {} join abandoned, closing", self.shared.id());
        }
    }
}
