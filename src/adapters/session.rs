//! Atomic authenticated-session flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::SessionStore;

/// Shared flag the login flow flips; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SessionFlag {
    authenticated: Arc<AtomicBool>,
}

impl SessionFlag {
    pub fn new(authenticated: bool) -> Self {
        Self {
            authenticated: Arc::new(AtomicBool::new(authenticated)),
        }
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }
}

impl SessionStore for SessionFlag {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}
