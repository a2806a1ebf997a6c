//! # autoreply-core
//!
//! Client-side state for the autoreply email auto-responder.
//!
//! This crate provides:
//! - **Session store** - the single cell holding the authenticated user,
//!   restored once from persisted storage at startup
//! - **Auth flow** - the OAuth redirect/callback state machine
//! - **Worklist** - unread emails with server-confirmed generate/send updates
//! - **Settings** - the cached response-generation policy
//! - **Page contexts** - guards that stop late async results from touching a
//!   page that has been left
//!
//! Controllers receive an [`ApiClient`] value and a shared
//! [`SessionStore`]; none of them reach for global state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
mod context;
mod error;
pub mod session;
pub mod settings;
pub mod worklist;

pub use autoreply_api::{
    ApiClient, ApiError, ApiErrorKind, ClientConfig, Email, EmailId, ResponseLength,
    ResponseTone, SettingsPolicy, User, UserId,
};
pub use auth::{AuthFlowController, AuthState, Navigator};
pub use context::PageContext;
pub use error::{Error, Result};
pub use session::storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
pub use session::{SESSION_STORAGE_KEY, Session, SessionStatus, SessionStore};
pub use settings::SettingsController;
pub use worklist::EmailWorklistController;
