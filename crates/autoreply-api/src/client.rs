//! The backend API client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::retry::RetryPolicy;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
use crate::types::{
    AuthUrlPayload, CallbackPayload, Email, EmailId, EmailsPayload, GeneratedPayload,
    SettingsPolicy, User,
};

/// Client for the autoreply backend.
///
/// Every call goes through the same steps: send via the [`Transport`],
/// normalize the response into a JSON payload or an [`ApiError`], and (for
/// idempotent reads only) retry according to the configured [`RetryPolicy`].
/// Failures are logged before being returned.
///
/// Cloning is cheap; clones share the transport and therefore its cookies.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("retry", &self.config.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client backed by [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns a client-kind error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(config.clone(), Arc::new(transport)))
    }

    /// Creates a client over an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    /// Returns the backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Returns the retry policy applied to idempotent reads.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    /// Performs a single request without retry.
    ///
    /// Returns the decoded JSON payload (`Value::Null` for an empty body).
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] for any failure.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let result = self.send_once(method, path, body).await;
        if let Err(err) = &result {
            error!("{method} {path} failed: {err}");
        }
        result
    }

    /// Performs an idempotent request, retrying transient failures.
    ///
    /// Must only be used for operations that are safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns the last observed [`ApiError`] once retries are exhausted or a
    /// permanent failure occurs.
    pub async fn request_idempotent(&self, method: Method, path: &str) -> Result<Value> {
        let label = format!("{method} {path}");
        let label_ref = label.as_str();
        let result = self
            .config
            .retry
            .run(label_ref, move |attempt| {
                debug!("{label_ref} attempt {attempt}");
                self.send_once(method, path, None)
            })
            .await;
        if let Err(err) = &result {
            error!("{label} failed: {err}");
        }
        result
    }

    async fn send_once(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.config.endpoint(path)?;
        let request = HttpRequest { method, url, body };
        let response = self.transport.send(request).await?;
        normalize(response)
    }

    /// Fetches the Google authorization URL. Retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the URL is malformed.
    pub async fn google_auth_url(&self) -> Result<Url> {
        let payload: AuthUrlPayload = decode(self.request_idempotent(Method::Get, "/auth/google").await?)?;
        Ok(Url::parse(&payload.auth_url)?)
    }

    /// Exchanges an authorization code for a session.
    ///
    /// Returns `None` when the backend accepted the call but sent no user.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails.
    pub async fn exchange_google_code(&self, code: &str) -> Result<Option<User>> {
        let body = json!({ "code": code });
        let payload: CallbackPayload =
            decode(self.request(Method::Post, "/auth/google/callback", Some(body)).await?)?;
        Ok(payload.user)
    }

    /// Invalidates the server-side session.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn logout(&self) -> Result<()> {
        self.request(Method::Post, "/logout", None).await?;
        Ok(())
    }

    /// Fetches unread emails in server order. Retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn unread_emails(&self) -> Result<Vec<Email>> {
        let payload: EmailsPayload = decode(self.request_idempotent(Method::Get, "/emails").await?)?;
        Ok(payload.emails)
    }

    /// Requests a generated reply for an email.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn generate_response(&self, email_id: &EmailId) -> Result<String> {
        let body = json!({ "email_id": email_id });
        let payload: GeneratedPayload =
            decode(self.request(Method::Post, "/generate-response", Some(body)).await?)?;
        Ok(payload.ai_response)
    }

    /// Sends a reply. Never retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn send_response(&self, email_id: &EmailId, response: &str) -> Result<()> {
        let body = json!({ "email_id": email_id, "response": response });
        self.request(Method::Post, "/send-response", Some(body)).await?;
        Ok(())
    }

    /// Fetches the response-generation policy. Retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn settings(&self) -> Result<SettingsPolicy> {
        decode(self.request_idempotent(Method::Get, "/settings").await?)
    }

    /// Persists the full response-generation policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn update_settings(&self, policy: &SettingsPolicy) -> Result<()> {
        let body = serde_json::to_value(policy)
            .map_err(|e| ApiError::client(format!("could not encode settings: {e}")))?;
        self.request(Method::Post, "/settings", Some(body)).await?;
        Ok(())
    }
}

/// Reduces a raw response to a payload or a classified error.
fn normalize(response: HttpResponse) -> Result<Value> {
    if response.is_success() {
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&response.body)
            .map_err(|e| ApiError::client(format!("malformed response body: {e}")));
    }

    if response.status >= 400 {
        return Err(ApiError::server(response.status, server_message(&response)));
    }

    Err(ApiError::client(format!(
        "unexpected response status {}",
        response.status
    )))
}

/// Picks the most useful message out of an error body.
fn server_message(response: &HttpResponse) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&response.body) {
        for key in ["error", "message", "detail"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }

    let body = response.body.trim();
    if body.is_empty() {
        format!("request failed with status {}", response.status)
    } else {
        body.chars().take(200).collect()
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::client(format!("unexpected response payload: {e}")))
}
