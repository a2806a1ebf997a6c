//! Cached response-generation policy.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use autoreply_api::{ApiClient, SettingsPolicy};

use crate::context::PageContext;
use crate::error::{Error, Result};
use crate::session::SessionStore;

const LOAD_FAILED: &str = "Failed to load settings. Please try again.";
const SAVE_FAILED: &str = "Failed to save settings. Please try again.";

#[derive(Debug, Default)]
struct SettingsState {
    /// Last policy fetched from or confirmed by the server.
    policy: Option<SettingsPolicy>,
    error: Option<String>,
    /// Ticket of the most recently issued load or save.
    latest: u64,
}

impl SettingsState {
    fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }
}

/// Loads and saves the [`SettingsPolicy`].
///
/// The held policy only ever changes to a value the server returned or
/// acknowledged. Loads and saves share one ticket sequence: a result is
/// applied only if no later load or save was issued in the meantime.
pub struct SettingsController {
    api: ApiClient,
    session: Arc<SessionStore>,
    context: PageContext,
    state: Mutex<SettingsState>,
}

impl SettingsController {
    /// Creates a controller with no cached policy.
    #[must_use]
    pub fn new(api: ApiClient, session: Arc<SessionStore>, context: PageContext) -> Self {
        Self {
            api,
            session,
            context,
            state: Mutex::default(),
        }
    }

    /// Returns the server-confirmed policy, if one has been loaded.
    #[must_use]
    pub fn policy(&self) -> Option<SettingsPolicy> {
        self.lock().policy
    }

    /// Latest error message.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Fetches the policy from the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] without a session, or the fetch
    /// failure. A previously held policy is kept on failure.
    pub async fn load(&self) -> Result<SettingsPolicy> {
        self.ensure_authenticated()?;
        let ticket = self.lock().issue();

        let result = self.api.settings().await;
        if !self.context.is_active() {
            debug!("Settings page left; dropping load #{ticket}");
            return result.map_err(Into::into);
        }

        let mut state = self.lock();
        if ticket != state.latest {
            debug!("Load #{ticket} superseded by #{}; discarding", state.latest);
            return result.map_err(Into::into);
        }
        match result {
            Ok(policy) => {
                state.policy = Some(policy);
                state.error = None;
                Ok(policy)
            }
            Err(e) => {
                warn!("Loading settings failed: {e}");
                state.error = Some(LOAD_FAILED.to_string());
                Err(e.into())
            }
        }
    }

    /// Persists `policy`. The held copy changes only once the server
    /// confirms, and only if no later load or save was issued meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] without a session, or the save
    /// failure (the previous policy stays current).
    pub async fn save(&self, policy: SettingsPolicy) -> Result<SettingsPolicy> {
        self.ensure_authenticated()?;
        let ticket = self.lock().issue();

        let result = self.api.update_settings(&policy).await;
        if !self.context.is_active() {
            debug!("Settings page left; dropping save #{ticket}");
            return result.map(|()| policy).map_err(Into::into);
        }

        let mut state = self.lock();
        if ticket != state.latest {
            debug!("Save #{ticket} superseded by #{}; discarding", state.latest);
            return result.map(|()| policy).map_err(Into::into);
        }
        match result {
            Ok(()) => {
                state.policy = Some(policy);
                state.error = None;
                drop(state);
                self.session.set_manual_review(policy.manual_review);
                info!("Settings saved");
                Ok(policy)
            }
            Err(e) => {
                warn!("Saving settings failed: {e}");
                state.error = Some(SAVE_FAILED.to_string());
                Err(e.into())
            }
        }
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.session.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidLocalState(
                "settings require an active session".to_string(),
            ))
        }
    }

    fn lock(&self) -> MutexGuard<'_, SettingsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
