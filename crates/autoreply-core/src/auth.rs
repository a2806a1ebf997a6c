//! OAuth redirect/callback state machine.
//!
//! ```text
//! Anonymous ──sign_in──▶ Redirecting ──(full navigation away)
//!     ▲
//!     │ reset        mount(?code=…) ──▶ CallbackPending ──▶ Authenticated
//!     │                                        │
//! Failed ◀──────── mount(?error=…) ◀───────────┘ (exchange failed)
//! ```
//!
//! The controller never reads ambient browser state. Its inputs are the
//! [`SessionStore`] (restored once at startup) and the URL handed to
//! [`AuthFlowController::mount`]; its outputs go through a [`Navigator`].

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use autoreply_api::{ApiClient, User};

use crate::context::PageContext;
use crate::error::{Error, Result};
use crate::session::SessionStore;

/// Query parameters the provider redirect may append. All are stripped after
/// a callback is handled so a reload cannot replay a single-use code.
const CALLBACK_PARAMS: &[&str] = &[
    "code",
    "error",
    "error_description",
    "state",
    "scope",
    "authuser",
    "prompt",
    "hd",
];

/// Where the sign-in flow stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not signed in; the login affordance should be shown.
    #[default]
    Anonymous,
    /// Fetching the authorization URL before navigating to the provider.
    Redirecting,
    /// Exchanging an authorization code with the backend.
    CallbackPending,
    /// Signed in.
    Authenticated(User),
    /// Sign-in failed; holds the message to show next to the retry button.
    Failed(String),
}

/// Side effects on the visible location.
pub trait Navigator: Send + Sync {
    /// Full navigation to `url`. The current page state is discarded.
    fn navigate(&self, url: &Url);

    /// Replaces the visible URL without reloading the page.
    fn replace(&self, url: &Url);
}

/// Drives sign-in, callback handling and logout.
pub struct AuthFlowController {
    api: ApiClient,
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    context: PageContext,
    state: AuthState,
}

impl AuthFlowController {
    /// Creates a controller in the `Anonymous` state.
    #[must_use]
    pub fn new(
        api: ApiClient,
        session: Arc<SessionStore>,
        navigator: Arc<dyn Navigator>,
        context: PageContext,
    ) -> Self {
        Self {
            api,
            session,
            navigator,
            context,
            state: AuthState::Anonymous,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    /// Returns true once the flow reached `Authenticated`.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    /// Resolves the state for a freshly loaded page at `location`.
    ///
    /// - `error` in the query: `Failed`, backend not contacted.
    /// - `code` in the query: exchanged for a user; `Authenticated` on
    ///   success, `Failed` otherwise. The query is stripped either way.
    /// - a failure while a session is already active keeps that session and
    ///   leaves the controller `Authenticated`; the error is still returned.
    /// - neither, with a restored session: `Authenticated`.
    /// - otherwise `Anonymous`.
    ///
    /// # Errors
    ///
    /// Returns the provider, exchange or storage failure.
    pub async fn mount(&mut self, location: &Url) -> Result<()> {
        let callback = CallbackParams::parse(location);

        if let Some(error) = callback.error {
            let message = match callback.error_description {
                Some(description) => format!("{error} ({description})"),
                None => error,
            };
            warn!("Provider reported sign-in failure: {message}");
            let err = Error::ProviderAuthFailed(message);
            self.fail(&err);
            self.navigator.replace(&strip_callback_params(location));
            return Err(err);
        }

        if let Some(code) = callback.code {
            return self.complete_callback(location, &code).await;
        }

        self.state = self.resting_state();
        if let AuthState::Authenticated(user) = &self.state {
            debug!("Resuming restored session for user {}", user.id);
        }
        Ok(())
    }

    /// `Authenticated` if the session store holds a user, else `Anonymous`.
    fn resting_state(&self) -> AuthState {
        self.session
            .current_user()
            .map_or(AuthState::Anonymous, AuthState::Authenticated)
    }

    async fn complete_callback(&mut self, location: &Url, code: &str) -> Result<()> {
        self.state = AuthState::CallbackPending;
        self.session.begin();

        let outcome = self.api.exchange_google_code(code).await;
        if !self.context.is_active() {
            debug!("Login page left during code exchange; dropping result");
            self.session.abandon();
            self.state = self.resting_state();
            return Ok(());
        }

        let result = match outcome {
            Ok(Some(user)) => self.session.establish(user.clone()).map(|()| user),
            Ok(None) => Err(Error::ProviderAuthFailed(
                "the server did not return a user".to_string(),
            )),
            Err(e) => Err(e.into()),
        };

        let outcome = match result {
            Ok(user) => {
                info!("Signed in as {}", user.name);
                self.state = AuthState::Authenticated(user);
                Ok(())
            }
            Err(err) => {
                warn!("Code exchange failed: {err}");
                self.fail(&err);
                Err(err)
            }
        };

        // The code is single-use: strip it whether or not the exchange worked.
        self.navigator.replace(&strip_callback_params(location));
        outcome
    }

    /// Starts sign-in: fetches the authorization URL and navigates to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] if already signed in, or the
    /// failure to obtain the URL (the controller is then `Failed`).
    pub async fn sign_in(&mut self) -> Result<()> {
        if self.is_authenticated() {
            return Err(Error::InvalidLocalState("already signed in".to_string()));
        }

        self.state = AuthState::Redirecting;
        match self.api.google_auth_url().await {
            Ok(url) => {
                if !self.context.is_active() {
                    debug!("Login page left before redirect; not navigating");
                    return Ok(());
                }
                info!("Redirecting to {}", url.host_str().unwrap_or("provider"));
                self.navigator.navigate(&url);
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                if self.context.is_active() {
                    self.fail(&err);
                }
                Err(err)
            }
        }
    }

    /// Returns a `Failed` controller to `Anonymous` so sign-in can be retried.
    pub fn reset(&mut self) {
        if matches!(self.state, AuthState::Failed(_)) {
            self.state = AuthState::Anonymous;
        }
    }

    /// Signs out.
    ///
    /// The local session is cleared even if the server call fails, so stale
    /// credentials never outlive an explicit logout.
    ///
    /// # Errors
    ///
    /// Returns the server failure (or, failing that, the storage failure)
    /// after local state has been cleared.
    pub async fn logout(&mut self) -> Result<()> {
        let remote = self.api.logout().await;
        if let Err(e) = &remote {
            warn!("Server logout failed; clearing local session anyway: {e}");
        }

        let local = self.session.clear();
        self.state = AuthState::Anonymous;
        info!("Signed out");

        remote?;
        local
    }

    /// Records a sign-in failure. A session that was already active
    /// survives it; only a successful exchange replaces the identity.
    fn fail(&mut self, err: &Error) {
        if let Some(user) = self.session.current_user() {
            info!("Keeping existing session for user {}", user.id);
            self.state = AuthState::Authenticated(user);
            return;
        }
        let message = err.user_message();
        self.session.fail(message.clone());
        self.state = AuthState::Failed(message);
    }
}

/// Provider-issued parameters found on the redirect URL.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    fn parse(location: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in location.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Returns `location` without provider callback parameters. Unrelated query
/// parameters and the fragment are kept.
fn strip_callback_params(location: &Url) -> Url {
    let kept: Vec<(String, String)> = location
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut clean = location.clone();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
    clean
}
