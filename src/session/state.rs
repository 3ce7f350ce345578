use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single session.
///
/// `Idle → Joining → Connecting → Open → Closed`, with `Failed` reachable
/// from `Joining` or `Connecting`. `Closed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Constructed, nothing started yet
    Idle,
    /// Join request in flight
    Joining,
    /// Transport opening, not yet usable
    Connecting,
    /// Transport reported connected
    Open,
    /// Transport closed, either by the peer or by `close()`
    Closed,
    /// Join or connect failed
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Idle, Joining)
                | (Idle, Connecting)
                | (Idle, Closed)
                | (Idle, Failed)
                | (Joining, Connecting)
                | (Joining, Closed)
                | (Joining, Failed)
                | (Connecting, Open)
                | (Connecting, Closed)
                | (Connecting, Failed)
                | (Open, Closed)
        )
    }

    /// Readiness of the transport as seen from this state. `None` while no
    /// transport exists yet.
    pub fn ready_state(self) -> Option<ReadyState> {
        match self {
            SessionState::Idle | SessionState::Joining => None,
            SessionState::Connecting => Some(ReadyState::Connecting),
            SessionState::Open => Some(ReadyState::Open),
            SessionState::Closed | SessionState::Failed => Some(ReadyState::Closed),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Joining => "joining",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transport-reported readiness gating `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyState::Connecting => "connecting",
            ReadyState::Open => "open",
            ReadyState::Closed => "closed",
        };
        f.write_str(name)
    }
}
