//! Navigation backed by the system browser.

use std::sync::{Mutex, PoisonError};

use autoreply_core::Navigator;
use tracing::{debug, info, warn};
use url::Url;

/// Opens full navigations in the default browser and tracks the console's
/// own location for in-place replacements.
#[derive(Debug)]
pub struct SystemNavigator {
    location: Mutex<Url>,
}

impl SystemNavigator {
    /// Starts at `location`.
    pub const fn new(location: Url) -> Self {
        Self {
            location: Mutex::new(location),
        }
    }

    /// The current location, after any replacements.
    pub fn location(&self) -> Url {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for SystemNavigator {
    fn navigate(&self, url: &Url) {
        info!("Opening {} in the browser", url.host_str().unwrap_or("provider"));
        if let Err(e) = opener::open(url.as_str()) {
            warn!("Could not open a browser: {e}");
        }
    }

    fn replace(&self, url: &Url) {
        debug!("Location replaced with {url}");
        *self
            .location
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = url.clone();
    }
}
