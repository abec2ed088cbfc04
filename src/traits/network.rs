//! Device network status seam.

use tokio::sync::watch;

/// Link type the device is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Wifi,
    Ethernet,
    Cellular,
    Other,
    None,
}

/// Snapshot of the device's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    /// The OS reports some connectivity
    pub is_connected: bool,
    /// Which link carries it
    pub transport: Transport,
}

impl NetworkStatus {
    pub fn wifi() -> Self {
        Self {
            is_connected: true,
            transport: Transport::Wifi,
        }
    }

    pub fn ethernet() -> Self {
        Self {
            is_connected: true,
            transport: Transport::Ethernet,
        }
    }

    pub fn cellular() -> Self {
        Self {
            is_connected: true,
            transport: Transport::Cellular,
        }
    }

    pub fn offline() -> Self {
        Self {
            is_connected: false,
            transport: Transport::None,
        }
    }

    /// True only for an active Wi-Fi or wired link. The server is
    /// LAN-resident, so cellular connectivity does not count.
    pub fn has_lan_link(&self) -> bool {
        self.is_connected && matches!(self.transport, Transport::Wifi | Transport::Ethernet)
    }
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self::offline()
    }
}

/// Source of network status snapshots and transitions.
pub trait NetworkStatusProvider: Send + Sync {
    /// Current status.
    fn current(&self) -> NetworkStatus;

    /// Subscribe to transitions. The receiver starts at the current value;
    /// dropping it unregisters the listener.
    fn subscribe(&self) -> watch::Receiver<NetworkStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lan_link_requires_wifi_or_ethernet() {
        assert!(NetworkStatus::wifi().has_lan_link());
        assert!(NetworkStatus::ethernet().has_lan_link());
        assert!(!NetworkStatus::cellular().has_lan_link());
        assert!(!NetworkStatus::offline().has_lan_link());

        let stale_wifi = NetworkStatus {
            is_connected: false,
            transport: Transport::Wifi,
        };
        assert!(!stale_wifi.has_lan_link());
    }
}
