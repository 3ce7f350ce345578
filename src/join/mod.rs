//! HTTP join handshake
//!
//! `POST {endpoint}` with no body; a 2xx response names the socket to open in
//! its `webSocketUrl` field, either as a full URL or as a path on the server.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::JoinConfig;
use crate::error::{JoinError, SessionError};
use crate::websocket::check_socket_url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    #[serde(rename = "webSocketUrl")]
    pub web_socket_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct JoinClient {
    http: reqwest::Client,
}

impl JoinClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Issues the join request and returns the socket URL to open.
    pub async fn join(&self, config: &JoinConfig) -> Result<Url, SessionError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|source| JoinError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            source,
        })?;

        let response = self
            .http
            .post(endpoint.clone())
            .send()
            .await
            .map_err(JoinError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(JoinError::Status {
                status,
                endpoint: endpoint.to_string(),
            }
            .into());
        }
        info!("Join accepted by {} ({})", endpoint, status);

        let advertised = match &config.socket_url_override {
            Some(url) => {
                debug!("Using configured socket URL {} instead of join response", url);
                url.clone()
            }
            None => {
                let body: JoinResponse = response
                    .json()
                    .await
                    .map_err(|e| JoinError::InvalidResponse(e.to_string()))?;
                body.web_socket_url
            }
        };

        if advertised.trim().is_empty() {
            return Err(JoinError::InvalidResponse("webSocketUrl is empty".to_string()).into());
        }

        resolve_socket_url(&endpoint, config.socket_base_url.as_deref(), &advertised)
    }
}

/// Turns an advertised socket location into a transport URL.
///
/// Absolute URLs are taken as-is (`http`/`https` mapped to `ws`/`wss`).
/// Paths resolve against `socket_base`, or against the join endpoint when no
/// base is configured.
pub fn resolve_socket_url(
    join_endpoint: &Url,
    socket_base: Option<&str>,
    advertised: &str,
) -> Result<Url, SessionError> {
    let advertised = advertised.trim();

    let url = match Url::parse(advertised) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = match socket_base {
                Some(base) => Url::parse(base)
                    .map_err(|e| SessionError::InvalidUrl(format!("{}: {}", base, e)))?,
                None => join_endpoint.clone(),
            };
            base.join(advertised)
                .map_err(|e| SessionError::InvalidUrl(format!("{}: {}", advertised, e)))?
        }
        Err(e) => return Err(SessionError::InvalidUrl(format!("{}: {}", advertised, e))),
    };

    check_socket_url(with_socket_scheme(url)?)
}

fn with_socket_scheme(mut url: Url) -> Result<Url, SessionError> {
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Ok(url),
    };

    url.set_scheme(scheme)
        .map_err(|_| SessionError::InvalidUrl(format!("{}: cannot use {} scheme", url, scheme)))?;
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_relative_path_uses_join_host() {
        let join = endpoint("http://127.0.0.1:9000/join");
        let url = resolve_socket_url(&join, None, "/ws").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/ws");

        let join = endpoint("https://games.example.com/api/join");
        let url = resolve_socket_url(&join, None, "/ws/7").unwrap();
        assert_eq!(url.as_str(), "wss://games.example.com/ws/7");
    }

    #[test]
    fn test_relative_path_uses_socket_base() {
        let url = resolve_socket_url(
            &endpoint("http://localhost:8080/join"),
            Some("ws://localhost:9000"),
            "/game/abc",
        )
        .unwrap();
        assert_eq!(url.as_str(), "ws://localhost:9000/game/abc");
    }

    #[test]
    fn test_absolute_urls() {
        let join = endpoint("http://localhost:8080/join");

        let url = resolve_socket_url(&join, None, "wss://play.example.com/socket").unwrap();
        assert_eq!(url.as_str(), "wss://play.example.com/socket");

        let url =
            resolve_socket_url(&join, Some("ws://ignored:1"), "http://other:9001/ws").unwrap();
        assert_eq!(url.as_str(), "ws://other:9001/ws");
    }

    #[test]
    fn test_unusable_locations_are_invalid_urls() {
        let join = endpoint("http://localhost:8080/join");

        for advertised in ["ftp://files.example.com/ws", "ws://", "mailto:someone@example.com"] {
            let err = resolve_socket_url(&join, None, advertised).unwrap_err();
            assert!(
                matches!(err, SessionError::InvalidUrl(_)),
                "{} should be rejected",
                advertised
            );
        }

        let err = resolve_socket_url(&join, Some("not a base"), "/ws").unwrap_err();
        assert!(matches!(err, SessionError::InvalidUrl(_)));
    }

    #[test]
    fn test_join_response_field_name() {
        let body: JoinResponse = serde_json::from_str(r#"{"webSocketUrl":"/ws"}"#).unwrap();
        assert_eq!(body.web_socket_url, "/ws");

        assert!(serde_json::from_str::<JoinResponse>(r#"{"url":"/ws"}"#).is_err());
    }
}
