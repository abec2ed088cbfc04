//! User notification seam.

use std::time::Duration;

/// Visual flavor of a snackbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnackbarKind {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient, auto-dismissing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snackbar {
    pub message: String,
    pub kind: SnackbarKind,
    pub duration: Duration,
}

impl Snackbar {
    pub fn new(message: impl Into<String>, kind: SnackbarKind, duration: Duration) -> Self {
        Self {
            message: message.into(),
            kind,
            duration,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn show_snackbar(&self, snackbar: Snackbar);

    /// Remove a snackbar before its duration ran out. Sinks that cannot
    /// retract a notification may ignore this.
    fn dismiss_snackbar(&self, _message: &str) {}
}
