//! Shared fixtures: a scripted transport, a recording navigator and a
//! harness wiring them to the controllers.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use autoreply_api::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use autoreply_core::{
    ApiClient, AuthFlowController, ClientConfig, EmailWorklistController, MemoryStorage,
    Navigator, PageContext, SESSION_STORAGE_KEY, SessionStore, SettingsController,
};
use serde_json::{Value, json};
use url::Url;

pub const BASE_URL: &str = "http://backend.test/api";
pub const APP_URL: &str = "http://localhost:3000/";

struct Scripted {
    delay: Duration,
    outcome: Result<HttpResponse, TransportError>,
}

/// Answers each (method, path) from its own queue of scripted outcomes.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: Method, path: &str, delay: Duration, outcome: Result<HttpResponse, TransportError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(Scripted { delay, outcome });
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_after(method, path, Duration::ZERO, status, body);
    }

    pub fn respond_after(&self, method: Method, path: &str, delay: Duration, status: u16, body: Value) {
        self.push(method, path, delay, Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn unreachable(&self, method: Method, path: &str) {
        self.push(
            method,
            path,
            Duration::ZERO,
            Err(TransportError::NoResponse("connection refused".into())),
        );
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.method == method && api_path(&r.url) == path)
            .count()
    }
}

fn api_path(url: &Url) -> String {
    url.path().trim_start_matches("/api").to_string()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method, api_path(&request.url));
        self.calls.lock().unwrap().push(request);

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted { delay, outcome }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(TransportError::NoResponse(format!(
                "no scripted response for {} {}",
                key.0, key.1
            ))),
        }
    }
}

/// Records navigations instead of performing them.
#[derive(Default)]
pub struct RecordingNavigator {
    navigations: Mutex<Vec<Url>>,
    replacements: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn navigations(&self) -> Vec<Url> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn replacements(&self) -> Vec<Url> {
        self.replacements.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &Url) {
        self.navigations.lock().unwrap().push(url.clone());
    }

    fn replace(&self, url: &Url) {
        self.replacements.lock().unwrap().push(url.clone());
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub storage: MemoryStorage,
    pub session: Arc<SessionStore>,
    pub api: ApiClient,
}

impl Harness {
    /// Fresh client with nothing persisted.
    pub fn anonymous() -> Self {
        Self::with_storage(MemoryStorage::new())
    }

    /// Client whose storage holds a previously persisted user.
    pub fn signed_in() -> Self {
        let record = json!({
            "user": { "id": "1", "name": "A", "manual_review": true },
            "stored_at": "2026-01-01T00:00:00Z"
        });
        Self::with_storage(MemoryStorage::with_entry(
            SESSION_STORAGE_KEY,
            record.to_string(),
        ))
    }

    fn with_storage(storage: MemoryStorage) -> Self {
        let transport = ScriptedTransport::new();
        let config = ClientConfig::builder(BASE_URL).build().unwrap();
        let api = ApiClient::with_transport(config, transport.clone());
        let session = Arc::new(SessionStore::restore(storage.clone()));
        Self {
            transport,
            navigator: Arc::new(RecordingNavigator::default()),
            storage,
            session,
            api,
        }
    }

    pub fn auth(&self, context: &PageContext) -> AuthFlowController {
        AuthFlowController::new(
            self.api.clone(),
            self.session.clone(),
            self.navigator.clone(),
            context.clone(),
        )
    }

    pub fn worklist(&self, context: &PageContext) -> EmailWorklistController {
        EmailWorklistController::new(self.api.clone(), self.session.clone(), context.clone())
    }

    pub fn settings(&self, context: &PageContext) -> SettingsController {
        SettingsController::new(self.api.clone(), self.session.clone(), context.clone())
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn email_json(id: &str, subject: &str) -> Value {
    json!({
        "id": id,
        "from": format!("{id}@example.com"),
        "subject": subject,
        "body": format!("Body of {id}"),
        "ai_response": null
    })
}
