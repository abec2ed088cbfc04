use thiserror::Error;

use super::DiscoveryError;

/// Why a `connect()` attempt did not produce a verified server address.
///
/// `Clone` because a single in-flight attempt is shared by every
/// concurrent caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Sin conexión WiFi")]
    NoWifi,

    #[error("no manual URL configured")]
    NoManualUrl,

    #[error("server not found on the local network")]
    ServerNotFound,

    #[error("health check failed for {url}")]
    HealthCheckFailed { url: String },

    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("could not point the API client at the server: {0}")]
    ApiClient(String),

    #[error("connection attempt was interrupted")]
    Interrupted,
}

impl From<DiscoveryError> for ConnectError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::NotConfigured => ConnectError::ServerNotFound,
            DiscoveryError::Failed(reason) => ConnectError::Discovery(reason),
        }
    }
}

impl ConnectError {
    /// Whether a later reconnection cycle could plausibly succeed.
    ///
    /// A missing manual URL needs user action, everything else may clear
    /// up on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConnectError::NoManualUrl)
    }
}
