//! # autoreply-api
//!
//! HTTP client for the autoreply backend.
//!
//! ## Features
//!
//! - **Uniform results**: every call resolves to a decoded payload or an
//!   [`ApiError`] classified as `server`, `network` or `client`
//! - **Retry policy**: idempotent reads are retried on transient failures
//!   (3 attempts, fixed 1 second delay, never on 4xx)
//! - **Cookie session**: the default [`HttpTransport`] keeps a cookie store so
//!   the backend session cookie rides along on every request
//! - **Substitutable transport**: controllers receive an [`ApiClient`] value and
//!   tests swap the [`Transport`] underneath it
//!
//! ## Quick Start
//!
//! ```ignore
//! use autoreply_api::{ApiClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("http://localhost:5000/api").build()?;
//!     let api = ApiClient::new(&config)?;
//!
//!     // Retried up to 3 times on network failure
//!     let auth_url = api.google_auth_url().await?;
//!     println!("Visit: {auth_url}");
//!
//!     // Executed at most once
//!     api.send_response(&"e1".into(), "Thanks, see you Monday.").await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use error::{ApiError, ApiErrorKind, Result};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport, TransportError};
pub use types::{Email, EmailId, ResponseLength, ResponseTone, SettingsPolicy, User, UserId};
