//! Runtime configuration read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use autoreply_api::{ClientConfig, DEFAULT_BASE_URL};
use autoreply_core::FileStorage;
use url::Url;

/// Overrides the backend base URL.
pub const API_URL_VAR: &str = "AUTORESPONDER_API_URL";
/// Overrides the front-end location the provider redirects back to.
pub const APP_URL_VAR: &str = "AUTORESPONDER_APP_URL";
/// Overrides where the session record is kept.
pub const DATA_DIR_VAR: &str = "AUTORESPONDER_DATA_DIR";
/// Overrides the request timeout, in seconds.
pub const TIMEOUT_VAR: &str = "AUTORESPONDER_TIMEOUT_SECS";

const DEFAULT_APP_URL: &str = "http://localhost:3000/";

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend base URL, e.g. `http://localhost:5000/api`.
    pub api_url: String,
    /// Location of the front end; callback URLs are resolved against it.
    pub app_url: Url,
    /// Directory holding the persisted session.
    pub data_dir: PathBuf,
    /// Per-request timeout, when overridden.
    pub timeout: Option<Duration>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_url = var(API_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let raw_app_url = var(APP_URL_VAR).unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let app_url = Url::parse(&raw_app_url)
            .with_context(|| format!("{APP_URL_VAR} is not a valid URL: {raw_app_url}"))?;

        let data_dir = match var(DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => FileStorage::default_location()
                .context("No data directory available; set AUTORESPONDER_DATA_DIR")?
                .dir()
                .to_path_buf(),
        };

        let timeout = var(TIMEOUT_VAR)
            .map(|secs| {
                secs.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{TIMEOUT_VAR} must be a whole number of seconds"))
            })
            .transpose()?;

        Ok(Self {
            api_url,
            app_url,
            data_dir,
            timeout,
        })
    }

    /// Builds the API client configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut builder = ClientConfig::builder(self.api_url.as_str())
            .user_agent(concat!("autoreply/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .with_context(|| format!("Invalid backend URL: {}", self.api_url))
    }
}
