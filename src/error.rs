use thiserror::Error;

use crate::session::{ReadyState, SessionState};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Join failed: {0}")]
    JoinFailed(#[from] JoinError),

    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Transport not ready (ready state: {0})")]
    NotReady(ReadyState),

    #[error("Transport closed: {0}")]
    TransportClosed(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Session is {0}; a session cannot be joined or opened twice")]
    InvalidState(SessionState),

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for SessionError {
    fn from(err: config::ConfigError) -> Self {
        SessionError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::InvalidMessage(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Invalid join endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {endpoint}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
    },

    #[error("Invalid join response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_conversion() {
        let config_err = config::ConfigError::NotFound(String::from("join.endpoint"));
        let err: SessionError = config_err.into();
        assert!(matches!(err, SessionError::ConfigError(_)));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SessionError = json_err.into();
        assert!(matches!(err, SessionError::InvalidMessage(_)));

        let err: SessionError =
            JoinError::InvalidResponse("missing webSocketUrl".to_string()).into();
        assert!(matches!(err, SessionError::JoinFailed(JoinError::InvalidResponse(_))));
    }

    #[test]
    fn test_join_failure_keeps_cause() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err = SessionError::from(JoinError::InvalidEndpoint {
            endpoint: "not a url".to_string(),
            source: parse_err,
        });

        let cause = err.source().expect("join failure should carry its cause");
        assert!(cause.source().is_some());
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::NotReady(ReadyState::Connecting);
        assert_eq!(err.to_string(), "Transport not ready (ready state: connecting)");

        let err = SessionError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");

        let err = SessionError::InvalidState(SessionState::Open);
        assert_eq!(
            err.to_string(),
            "Session is open; a session cannot be joined or opened twice"
        );

        let err = SessionError::from(JoinError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            endpoint: "http://localhost:9000/join".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Join failed: Unexpected status 503 Service Unavailable from http://localhost:9000/join"
        );
    }
}
