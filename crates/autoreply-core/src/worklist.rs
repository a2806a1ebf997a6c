//! The unread-email worklist.
//!
//! Every mutation is applied only after the backend confirms it, and only to
//! the entry whose id matches the call. Methods take `&self` so that several
//! operations (a refresh and a generate, or two refreshes) can be in flight
//! on the same controller at once.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use autoreply_api::{ApiClient, Email, EmailId};

use crate::context::PageContext;
use crate::error::{Error, Result};
use crate::session::SessionStore;

const FETCH_FAILED: &str = "Failed to fetch emails. Please try again.";
const GENERATE_FAILED: &str = "Failed to generate response. Please try again.";
const SEND_FAILED: &str = "Failed to send response. Please try again.";

#[derive(Debug, Default)]
struct WorklistState {
    emails: Vec<Email>,
    /// Ticket of the most recently issued refresh.
    latest_refresh: u64,
    refreshes_in_flight: usize,
    /// Banner error for the page.
    error: Option<String>,
    /// Inline errors keyed by email.
    entry_errors: HashMap<EmailId, String>,
}

impl WorklistState {
    fn find_mut(&mut self, id: &EmailId) -> Option<&mut Email> {
        self.emails.iter_mut().find(|email| &email.id == id)
    }
}

/// Fetches unread emails and applies generate/send outcomes.
pub struct EmailWorklistController {
    api: ApiClient,
    session: Arc<SessionStore>,
    context: PageContext,
    state: Mutex<WorklistState>,
}

impl EmailWorklistController {
    /// Creates an empty worklist bound to a page context.
    #[must_use]
    pub fn new(api: ApiClient, session: Arc<SessionStore>, context: PageContext) -> Self {
        Self {
            api,
            session,
            context,
            state: Mutex::default(),
        }
    }

    /// Returns the emails in server order.
    #[must_use]
    pub fn emails(&self) -> Vec<Email> {
        self.lock().emails.clone()
    }

    /// Returns one email by id.
    #[must_use]
    pub fn get(&self, id: &EmailId) -> Option<Email> {
        self.lock().emails.iter().find(|email| &email.id == id).cloned()
    }

    /// Number of emails in the worklist.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().emails.len()
    }

    /// Returns true if the worklist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().emails.is_empty()
    }

    /// Returns true while a refresh is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().refreshes_in_flight > 0
    }

    /// Latest page-level error message.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Inline error for one email, if its last operation failed.
    #[must_use]
    pub fn entry_error(&self, id: &EmailId) -> Option<String> {
        self.lock().entry_errors.get(id).cloned()
    }

    /// Replaces the worklist with the server's current unread set.
    ///
    /// Concurrent refreshes are not coalesced; only the most recently issued
    /// one may apply its result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] without a session, or the fetch
    /// failure. The worklist is unchanged on failure.
    pub async fn refresh(&self) -> Result<()> {
        self.ensure_authenticated()?;

        let ticket = {
            let mut state = self.lock();
            state.latest_refresh += 1;
            state.latest_refresh
        };
        let _busy = RefreshGuard::enter(&self.state);

        let result = self.api.unread_emails().await;
        if !self.context.is_active() {
            debug!("Worklist page left; dropping refresh #{ticket}");
            return result.map(drop).map_err(Into::into);
        }

        let mut state = self.lock();
        let superseded = ticket != state.latest_refresh;
        match result {
            Ok(_) if superseded => {
                debug!("Refresh #{ticket} superseded by #{}; discarding", state.latest_refresh);
                Ok(())
            }
            Ok(emails) => {
                let emails = dedupe_by_id(emails);
                info!("Worklist refreshed: {} unread", emails.len());
                state.emails = emails;
                state.error = None;
                state.entry_errors.clear();
                Ok(())
            }
            Err(e) => {
                if !superseded {
                    state.error = Some(FETCH_FAILED.to_string());
                }
                Err(e.into())
            }
        }
    }

    /// Requests a generated reply and attaches it to the email.
    ///
    /// Returns the generated text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] without a session or for an id
    /// that is not in the worklist, or the generation failure (the entry is
    /// left unchanged).
    pub async fn generate_response(&self, id: &EmailId) -> Result<String> {
        self.ensure_authenticated()?;
        if self.get(id).is_none() {
            return Err(Error::InvalidLocalState(format!(
                "email {id} is not in the worklist"
            )));
        }

        let result = self.api.generate_response(id).await;
        if !self.context.is_active() {
            return result.map_err(Into::into);
        }

        let mut state = self.lock();
        match result {
            Ok(text) => {
                match state.find_mut(id) {
                    Some(email) => email.ai_response = Some(text.clone()),
                    None => debug!("Email {id} left the worklist before its reply arrived"),
                }
                state.entry_errors.remove(id);
                Ok(text)
            }
            Err(e) => {
                warn!("Generating a reply for {id} failed: {e}");
                state.entry_errors.insert(id.clone(), GENERATE_FAILED.to_string());
                state.error = Some(GENERATE_FAILED.to_string());
                Err(e.into())
            }
        }
    }

    /// Sends `text` as the reply to an email and removes it on success.
    ///
    /// `text` may differ from the stored generated reply if the user edited
    /// it. Sending is attempted exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocalState`] without a session, for an unknown
    /// id, or when the email has no generated reply yet (the network is not
    /// touched). Otherwise returns the send failure; the entry stays.
    pub async fn send_response(&self, id: &EmailId, text: &str) -> Result<()> {
        self.ensure_authenticated()?;
        match self.get(id) {
            None => {
                return Err(Error::InvalidLocalState(format!(
                    "email {id} is not in the worklist"
                )));
            }
            Some(email) if !email.has_response() => {
                return Err(Error::InvalidLocalState(format!(
                    "email {id} has no generated response to send"
                )));
            }
            Some(_) => {}
        }

        let result = self.api.send_response(id, text).await;
        if !self.context.is_active() {
            return result.map_err(Into::into);
        }

        let mut state = self.lock();
        match result {
            Ok(()) => {
                state.emails.retain(|email| &email.id != id);
                state.entry_errors.remove(id);
                info!("Reply to {id} sent");
                Ok(())
            }
            Err(e) => {
                warn!("Sending the reply to {id} failed: {e}");
                state.entry_errors.insert(id.clone(), SEND_FAILED.to_string());
                state.error = Some(SEND_FAILED.to_string());
                Err(e.into())
            }
        }
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.session.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidLocalState(
                "worklist operations require an active session".to_string(),
            ))
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorklistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the busy count accurate even if the refresh future is dropped.
struct RefreshGuard<'a> {
    state: &'a Mutex<WorklistState>,
}

impl<'a> RefreshGuard<'a> {
    fn enter(state: &'a Mutex<WorklistState>) -> Self {
        state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshes_in_flight += 1;
        Self { state }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.refreshes_in_flight = state.refreshes_in_flight.saturating_sub(1);
    }
}

/// Drops repeated ids, keeping the first occurrence and server order.
fn dedupe_by_id(emails: Vec<Email>) -> Vec<Email> {
    let mut seen = HashSet::with_capacity(emails.len());
    let total = emails.len();
    let unique: Vec<Email> = emails
        .into_iter()
        .filter(|email| seen.insert(email.id.clone()))
        .collect();
    if unique.len() != total {
        warn!("Server returned {} duplicate email ids", total - unique.len());
    }
    unique
}
