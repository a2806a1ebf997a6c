//! The session store.
//!
//! [`SessionStore`] is the single source of truth for "is a session active".
//! It is shared (behind an `Arc`) between the auth flow and every other
//! controller, but only crate-internal code writes to it: the auth flow on a
//! successful callback or a failure, and logout.
//!
//! Persisted storage is read exactly once, in [`SessionStore::restore`], and
//! written only when a session is established or cleared.

pub mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use autoreply_api::User;

use crate::error::Result;
use storage::SessionStorage;

/// Storage key holding the serialized user identity.
pub const SESSION_STORAGE_KEY: &str = "user";

/// The client's belief about who is signed in.
///
/// `Active` is the only variant carrying a user, so "active iff a user is
/// held" holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    /// Nobody is signed in.
    #[default]
    Absent,
    /// A callback exchange is in flight.
    Pending,
    /// A user is signed in.
    Active(User),
    /// The last sign-in attempt failed.
    Error(String),
}

/// Coarse session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session.
    Absent,
    /// Sign-in in progress.
    Pending,
    /// Signed in.
    Active,
    /// Sign-in failed.
    Error,
}

impl Session {
    /// Returns the coarse status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match self {
            Self::Absent => SessionStatus::Absent,
            Self::Pending => SessionStatus::Pending,
            Self::Active(_) => SessionStatus::Active,
            Self::Error(_) => SessionStatus::Error,
        }
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Active(user) => Some(user),
            _ => None,
        }
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// The persisted record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user: User,
    stored_at: DateTime<Utc>,
}

/// Holder of the current [`Session`].
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    session: Mutex<Session>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates the store, restoring a previously persisted identity.
    ///
    /// This is the only read of persisted storage. A missing record means
    /// `Absent`; an unreadable or corrupt record is logged and also treated
    /// as `Absent`.
    pub fn restore(storage: impl SessionStorage + 'static) -> Self {
        let session = match storage.read(SESSION_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<StoredSession>(&raw) {
                Ok(stored) => {
                    info!(
                        "Restored session for user {} (stored {})",
                        stored.user.id, stored.stored_at
                    );
                    Session::Active(stored.user)
                }
                Err(e) => {
                    warn!("Ignoring unreadable session record: {e}");
                    Session::Absent
                }
            },
            Ok(None) => Session::Absent,
            Err(e) => {
                warn!("Could not read session storage: {e}");
                Session::Absent
            }
        };

        Self {
            storage: Box::new(storage),
            session: Mutex::new(session),
        }
    }

    /// Returns a copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.lock().user().cloned()
    }

    /// Returns true if a user is signed in.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    /// Returns the coarse status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock().status()
    }

    /// Marks a sign-in as in flight.
    pub(crate) fn begin(&self) {
        let mut session = self.lock();
        if !session.is_active() {
            *session = Session::Pending;
        }
    }

    /// Drops a sign-in that will never complete. Only `Pending` is reset;
    /// an active session or a recorded failure is kept.
    pub(crate) fn abandon(&self) {
        let mut session = self.lock();
        if matches!(*session, Session::Pending) {
            *session = Session::Absent;
        }
    }

    /// Records a failed sign-in. Never touches persisted storage.
    pub(crate) fn fail(&self, message: impl Into<String>) {
        let mut session = self.lock();
        if !session.is_active() {
            *session = Session::Error(message.into());
        }
    }

    /// Persists `user` and marks the session active.
    ///
    /// The in-memory state changes only after the record is written, so a
    /// storage failure leaves the session inactive.
    pub(crate) fn establish(&self, user: User) -> Result<()> {
        let record = StoredSession {
            user,
            stored_at: Utc::now(),
        };
        let raw = serde_json::to_string(&record).map_err(storage::StorageError::from)?;
        self.storage.write(SESSION_STORAGE_KEY, &raw)?;

        info!("Session established for user {}", record.user.id);
        *self.lock() = Session::Active(record.user);
        Ok(())
    }

    /// Clears the session in memory, then removes the persisted record.
    ///
    /// The in-memory session is cleared even if removal fails.
    pub(crate) fn clear(&self) -> Result<()> {
        *self.lock() = Session::Absent;
        self.storage.remove(SESSION_STORAGE_KEY)?;
        debug!("Session cleared");
        Ok(())
    }

    /// Mirrors a confirmed policy change into the held identity.
    pub(crate) fn set_manual_review(&self, manual_review: bool) {
        if let Session::Active(user) = &mut *self.lock() {
            user.manual_review = manual_review;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
