//! WebSocket transport for a game session
//!
//! The [`Connection`] owns the socket through a background driver task;
//! callers only ever see it through [`crate::Session`].

mod connection;
mod message;

pub(crate) use connection::Connection;
pub use message::{
    ClientMessage, CloseEvent, InboundMessage, CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_NO_STATUS,
};

use url::Url;

use crate::error::SessionError;

/// Parses `raw` and checks it is usable as a transport address: a `ws` or
/// `wss` scheme and a non-empty host.
pub fn validate_socket_url(raw: &str) -> Result<Url, SessionError> {
    let url = Url::parse(raw).map_err(|e| SessionError::InvalidUrl(format!("{}: {}", raw, e)))?;
    check_socket_url(url)
}

pub(crate) fn check_socket_url(url: Url) -> Result<Url, SessionError> {
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(SessionError::InvalidUrl(format!(
            "{}: scheme must be ws or wss",
            url
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(SessionError::InvalidUrl(format!("{}: missing host", url))),
    }
}
