//! Notification sinks for hosts without an in-app snackbar.
//!
//! [`DesktopNotificationSink`] raises a native banner on macOS through
//! `osascript` (no bundle identifier or permissions needed) and falls
//! back to tracing elsewhere. [`TracingNotificationSink`] only logs.

use crate::traits::{NotificationSink, Snackbar, SnackbarKind};

/// Logs every snackbar at a level matching its kind.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn show_snackbar(&self, snackbar: Snackbar) {
        log_snackbar(&snackbar);
    }
}

/// Native OS notifications.
#[derive(Debug, Clone)]
pub struct DesktopNotificationSink {
    title: String,
}

impl DesktopNotificationSink {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for DesktopNotificationSink {
    fn default() -> Self {
        Self::new("poslink")
    }
}

impl NotificationSink for DesktopNotificationSink {
    /// Dispatches on a blocking thread so the caller never waits on the
    /// OS. Errors are logged and discarded.
    fn show_snackbar(&self, snackbar: Snackbar) {
        log_snackbar(&snackbar);

        let title = self.title.clone();
        let body = snackbar.message;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || send_notification(&title, &body));
            }
            Err(_) => send_notification(&title, &body),
        }
    }
}

fn log_snackbar(snackbar: &Snackbar) {
    match snackbar.kind {
        SnackbarKind::Error => tracing::error!(duration = ?snackbar.duration, "{}", snackbar.message),
        SnackbarKind::Warning => tracing::warn!(duration = ?snackbar.duration, "{}", snackbar.message),
        SnackbarKind::Info | SnackbarKind::Success => {
            tracing::info!(duration = ?snackbar.duration, "{}", snackbar.message)
        }
    }
}

#[cfg(target_os = "macos")]
fn send_notification(title: &str, body: &str) {
    use std::process::Command;

    // Escape double quotes and backslashes for AppleScript string literals
    let escaped_title = title.replace('\\', "\\\\").replace('"', "\\\"");
    let escaped_body = body.replace('\\', "\\\\").replace('"', "\\\"");

    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escaped_body, escaped_title
    );

    match Command::new("osascript").arg("-e").arg(&script).output() {
        Ok(output) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("osascript notification failed: {}", stderr.trim());
        }
        Err(e) => {
            tracing::warn!("Failed to spawn osascript: {}", e);
        }
        _ => {}
    }
}

#[cfg(not(target_os = "macos"))]
fn send_notification(_title: &str, _body: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_tracing_sink_accepts_every_kind() {
        let sink = TracingNotificationSink;
        for kind in [
            SnackbarKind::Info,
            SnackbarKind::Success,
            SnackbarKind::Warning,
            SnackbarKind::Error,
        ] {
            sink.show_snackbar(Snackbar::new("Conexión restablecida", kind, Duration::from_secs(3)));
        }
    }
}
