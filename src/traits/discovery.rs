//! Discovery collaborator seam.
//!
//! The transport that actually finds the server on the LAN (broadcast,
//! subnet sweep, mDNS...) lives behind this trait. The core only needs a
//! URL back and a place to remember it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DiscoveryError;

/// Receives human-readable progress lines from a running discovery.
pub type DiscoveryLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Locate a server, preferring cached knowledge when the implementation
    /// has any. `Ok(None)` means nothing answered. A found address becomes
    /// the one `api_url` reports but is not remembered until
    /// `set_server_url` confirms it.
    async fn discover_server(&self) -> Result<Option<String>, DiscoveryError>;

    /// The address API traffic should currently use.
    ///
    /// Fails with [`DiscoveryError::NotConfigured`] when no address has been
    /// discovered or pinned.
    fn api_url(&self) -> Result<String, DiscoveryError>;

    /// Last address that was verified in automatic mode, if any.
    fn last_known_url(&self) -> Option<String>;

    /// Address pinned by the user for manual mode, if any.
    fn manual_url(&self) -> Option<String>;

    /// Record `url` as the active server. `is_manual` stores it as the
    /// pinned address instead of the auto-discovered one.
    fn set_server_url(&self, url: &str, is_manual: bool);

    /// Ignore cached knowledge and search again. Same activation rule as
    /// `discover_server`.
    async fn force_rediscovery(&self) -> Result<Option<String>, DiscoveryError>;

    /// Install (or clear, with `None`) the progress callback.
    fn set_log_callback(&self, callback: Option<DiscoveryLogCallback>);
}
