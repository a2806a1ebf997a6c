//! Page-context liveness guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Liveness token for one page context (login, dashboard, settings).
///
/// Controllers check [`PageContext::is_active`] after every await before
/// writing state. Once the page is left via [`PageContext::leave`], results
/// that resolve afterwards are dropped instead of applied. Clones share the
/// same flag.
#[derive(Debug, Clone)]
pub struct PageContext {
    active: Arc<AtomicBool>,
}

impl PageContext {
    /// Creates an active context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns true until [`leave`](Self::leave) is called.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the context as left. Irreversible.
    pub fn leave(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for PageContext {
    fn default() -> Self {
        Self::new()
    }
}
