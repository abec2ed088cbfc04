//! Channel-backed network status provider.
//!
//! Platform glue (a connectivity callback, a netlink listener...) pushes
//! transitions in with [`WatchNetworkStatus::set`]; the resilience layer
//! subscribes through [`NetworkStatusProvider`]. Tests drive it directly.

use tokio::sync::watch;

use crate::traits::{NetworkStatus, NetworkStatusProvider};

#[derive(Debug, Clone)]
pub struct WatchNetworkStatus {
    tx: watch::Sender<NetworkStatus>,
}

impl WatchNetworkStatus {
    pub fn new(initial: NetworkStatus) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new status. Identical consecutive values are not
    /// re-announced.
    pub fn set(&self, status: NetworkStatus) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::debug!(?status, "Network status changed");
        }
    }

    /// Number of live subscribers; zero once every listener unregistered.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WatchNetworkStatus {
    fn default() -> Self {
        Self::new(NetworkStatus::wifi())
    }
}

impl NetworkStatusProvider for WatchNetworkStatus {
    fn current(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}
