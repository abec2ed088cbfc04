use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the server address is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Last known address, falling back to discovery
    #[default]
    Auto,
    /// The pinned address only; never discovers
    Manual,
}

impl ConnectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionMode::Auto => "auto",
            ConnectionMode::Manual => "manual",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ConnectionMode::Auto),
            "manual" => Ok(ConnectionMode::Manual),
            other => Err(format!("unknown connection mode: {}", other)),
        }
    }
}

/// The application's single view of connectivity.
///
/// Only [`ConnectionCoordinator`](super::ConnectionCoordinator) writes it.
/// `is_connected` implies `current_url` is set and answered a health check
/// at or after the moment it was set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_connected: bool,
    pub is_connecting: bool,
    /// Outcome of the last failed `connect()`
    pub last_error: Option<String>,
    pub mode: ConnectionMode,
    pub current_url: Option<String>,
    pub has_wifi: bool,
    pub is_healthy: bool,
    /// Mirrors the reconnector running
    pub is_searching: bool,
    /// Latest user-facing problem, cleared on recovery
    pub error: Option<String>,
}
