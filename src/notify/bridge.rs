use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::reconnect::{ReconnectState, ReconnectStatus};
use crate::sync::lock;
use crate::traits::{NotificationSink, SessionStore, Snackbar, SnackbarKind};

/// Notifications of one category replace each other instead of stacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    Network,
    Health,
    Discovery,
    Reconnection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Notice {
    category: NotificationCategory,
    message: String,
    kind: SnackbarKind,
    duration: Duration,
}

impl Notice {
    fn new(
        category: NotificationCategory,
        message: impl Into<String>,
        kind: SnackbarKind,
        secs: u64,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            kind,
            duration: Duration::from_secs(secs),
        }
    }
}

fn status_notice(status: ReconnectStatus) -> Option<Notice> {
    use NotificationCategory as C;
    use SnackbarKind as K;

    let notice = match status {
        ReconnectStatus::NoWifi => Notice::new(C::Network, "Sin conexión WiFi", K::Warning, 5),
        ReconnectStatus::CheckingHealth => {
            Notice::new(C::Health, "Verificando servidor...", K::Info, 3)
        }
        ReconnectStatus::RunningDiscovery => {
            Notice::new(C::Discovery, "Buscando servidor en la red...", K::Info, 4)
        }
        ReconnectStatus::Connected => {
            Notice::new(C::Reconnection, "Conexión restablecida", K::Success, 3)
        }
        ReconnectStatus::Failed => {
            Notice::new(C::Reconnection, "No se pudo conectar al servidor", K::Error, 5)
        }
        ReconnectStatus::Idle | ReconnectStatus::CheckingNetwork => return None,
    };
    Some(notice)
}

/// Log lines worth a snackbar, by prefix. Only consulted for entries that
/// did not change the status; a status change already has its own notice.
const LOG_MILESTONES: &[(&str, NotificationCategory, SnackbarKind, u64)] = &[(
    "Servidor encontrado en",
    NotificationCategory::Discovery,
    SnackbarKind::Info,
    4,
)];

fn log_notice(message: &str) -> Option<Notice> {
    LOG_MILESTONES
        .iter()
        .find(|(prefix, ..)| message.starts_with(prefix))
        .map(|&(_, category, kind, secs)| Notice::new(category, message, kind, secs))
}

struct Active {
    message: String,
    timer: JoinHandle<()>,
}

struct Inner {
    sink: Arc<dyn NotificationSink>,
    session: Arc<dyn SessionStore>,
    active: Mutex<HashMap<NotificationCategory, Active>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in active.drain() {
            entry.timer.abort();
        }
    }
}

/// Turns reconnection progress into short-lived user notifications.
///
/// A read-only observer: it never touches reconnection state. Silent while
/// nobody is signed in.
pub struct NotificationBridge {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationBridge {
    /// Start observing `updates` (typically
    /// [`AutoReconnector::subscribe`](crate::reconnect::AutoReconnector::subscribe)).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        updates: watch::Receiver<ReconnectState>,
        sink: Arc<dyn NotificationSink>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let inner = Arc::new(Inner {
            sink,
            session,
            active: Mutex::new(HashMap::new()),
        });
        let listener = spawn_listener(Arc::downgrade(&inner), updates);

        Self {
            inner,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Unsubscribe and cancel pending expiry timers.
    pub fn destroy(&self) {
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
        for (_, entry) in lock(&self.inner.active).drain() {
            entry.timer.abort();
        }
    }

    /// Categories with a notification currently on screen.
    pub fn active_categories(&self) -> Vec<NotificationCategory> {
        lock(&self.inner.active).keys().copied().collect()
    }
}

impl Drop for NotificationBridge {
    fn drop(&mut self) {
        let listener = self.listener.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = listener.take() {
            handle.abort();
        }
    }
}

fn spawn_listener(
    weak: std::sync::Weak<Inner>,
    mut rx: watch::Receiver<ReconnectState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (mut last_status, mut last_seq) = {
            let state = rx.borrow_and_update();
            (state.status, state.latest_log().map_or(0, |entry| entry.seq))
        };

        while rx.changed().await.is_ok() {
            // Snapshots coalesce; the entries carry every status in order.
            let (fresh, current) = {
                let state = rx.borrow_and_update();
                let fresh: Vec<(ReconnectStatus, String)> = state
                    .logs_since(last_seq)
                    .map(|entry| (entry.status, entry.message.clone()))
                    .collect();
                last_seq = state.latest_log().map_or(last_seq, |entry| entry.seq);
                (fresh, state.status)
            };

            let mut notices = Vec::new();
            for (status, message) in fresh {
                if status != last_status {
                    last_status = status;
                    notices.extend(status_notice(status));
                } else {
                    notices.extend(log_notice(&message));
                }
            }
            last_status = current;

            let Some(inner) = weak.upgrade() else {
                break;
            };
            if !inner.session.is_authenticated() {
                continue;
            }
            for notice in notices {
                inner.show(notice);
            }
        }
    })
}

impl Inner {
    fn show(self: &Arc<Self>, notice: Notice) {
        let mut active = lock(&self.active);
        if active
            .get(&notice.category)
            .is_some_and(|current| current.message == notice.message)
        {
            return;
        }
        if let Some(previous) = active.remove(&notice.category) {
            previous.timer.abort();
            self.sink.dismiss_snackbar(&previous.message);
        }

        debug!(category = ?notice.category, message = %notice.message, "Showing notification");
        self.sink.show_snackbar(Snackbar::new(
            notice.message.clone(),
            notice.kind,
            notice.duration,
        ));

        let weak = Arc::downgrade(self);
        let Notice {
            category,
            message,
            duration,
            ..
        } = notice;
        let expiring = message.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(category, &expiring);
            }
        });
        active.insert(category, Active { message, timer });
    }

    fn expire(&self, category: NotificationCategory, message: &str) {
        let mut active = lock(&self.active);
        if active
            .get(&category)
            .is_some_and(|current| current.message == message)
        {
            active.remove(&category);
            self.sink.dismiss_snackbar(message);
        }
    }
}
