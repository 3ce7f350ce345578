use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Normal closure, sent when the client tears the session down.
pub const CLOSE_NORMAL: u16 = 1000;
/// The peer closed without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// The transport ended without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Messages the client sends, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    RequestJoinGame,
}

/// A text frame received from the server, passed through untouched.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    text: String,
    received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(text: String) -> Self {
        Self {
            text,
            received_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Deserializes the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text)
    }

    /// The `type` field of a JSON object payload, if there is one.
    pub fn message_type(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.text).ok()?;
        value.get("type")?.as_str().map(str::to_owned)
    }
}

/// Why and how the transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: Option<String>,
}

impl CloseEvent {
    pub fn new(code: u16, reason: Option<String>) -> Self {
        Self {
            code,
            reason: reason.filter(|r| !r.is_empty()),
        }
    }

    pub(crate) fn normal() -> Self {
        Self::new(CLOSE_NORMAL, None)
    }

    pub(crate) fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, Some(reason.into()))
    }

    pub(crate) fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self::new(u16::from(frame.code), Some(frame.reason.into_owned())),
            None => Self::new(CLOSE_NO_STATUS, None),
        }
    }

    pub(crate) fn to_frame(&self) -> CloseFrame<'static> {
        CloseFrame {
            code: CloseCode::from(self.code),
            reason: self.reason.clone().unwrap_or_default().into(),
        }
    }
}

impl fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "code {} ({})", self.code, reason),
            None => write!(f, "code {}", self.code),
        }
    }
}
