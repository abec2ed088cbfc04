//! Notification sink that records what it was asked to show.

use std::sync::{Arc, Mutex};

use crate::traits::{NotificationSink, Snackbar};

#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    shown: Arc<Mutex<Vec<Snackbar>>>,
    dismissed: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snackbar shown, oldest first.
    pub fn shown(&self) -> Vec<Snackbar> {
        self.shown.lock().unwrap().clone()
    }

    /// Messages of every snackbar shown, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.message.clone())
            .collect()
    }

    /// Messages dismissed, oldest first.
    pub fn dismissed(&self) -> Vec<String> {
        self.dismissed.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.shown.lock().unwrap().clear();
        self.dismissed.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn show_snackbar(&self, snackbar: Snackbar) {
        self.shown.lock().unwrap().push(snackbar);
    }

    fn dismiss_snackbar(&self, message: &str) {
        self.dismissed.lock().unwrap().push(message.to_string());
    }
}
