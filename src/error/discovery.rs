use thiserror::Error;

/// Errors raised by a discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// No server address is known yet, neither discovered nor pinned.
    #[error("server not configured")]
    NotConfigured,

    /// The discovery routine itself failed (socket error, scan aborted...).
    #[error("discovery failed: {0}")]
    Failed(String),
}
