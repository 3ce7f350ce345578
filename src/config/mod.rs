use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

const DEFAULT_JOIN_ENDPOINT: &str = "http://localhost:9000/join";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    /// Absolute URL the join request is POSTed to.
    pub endpoint: String,
    /// Socket URL to open instead of the one advertised by the join response.
    #[serde(default)]
    pub socket_url_override: Option<String>,
    /// Origin that relative socket paths are resolved against. Falls back to
    /// the join endpoint's host with a `ws`/`wss` scheme.
    #[serde(default)]
    pub socket_base_url: Option<String>,
}

impl JoinConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            socket_url_override: None,
            socket_base_url: None,
        }
    }

    pub fn with_socket_url_override(mut self, url: impl Into<String>) -> Self {
        self.socket_url_override = Some(url.into());
        self
    }

    pub fn with_socket_base_url(mut self, url: impl Into<String>) -> Self {
        self.socket_base_url = Some(url.into());
        self
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self::new(DEFAULT_JOIN_ENDPOINT)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub join: JoinConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder()?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Environment last, e.g. `APP_JOIN__ENDPOINT=http://host:9000/join`
            .add_source(env_source("app"))
            .build()?
            .try_deserialize()
    }

    /// Defaults plus environment variables under `prefix`, no config files.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(env_source(prefix))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder().set_default("join.endpoint", DEFAULT_JOIN_ENDPOINT)
    }
}

fn env_source(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
