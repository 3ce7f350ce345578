pub mod config;
pub mod error;
pub mod join;
pub mod session;
pub mod websocket;

pub use error::{JoinError, SessionError};
pub type Result<T> = std::result::Result<T, SessionError>;
pub use crate::config::{JoinConfig, Settings};

pub use join::{JoinClient, JoinResponse};
pub use session::{ReadyState, Session, SessionState};
pub use websocket::{ClientMessage, CloseEvent, InboundMessage};

/// Creates a session and runs its join handshake.
///
/// On success the session is `Connecting`; await
/// [`Session::wait_until_open`] before sending. Handlers registered on the
/// returned session may miss frames sent immediately after the socket opens;
/// use [`Session::new`] and [`Session::request_join`] to register them first.
pub async fn request_join(config: JoinConfig) -> Result<Session> {
    let mut session = Session::new(config);
    session.request_join().await?;
    Ok(session)
}
