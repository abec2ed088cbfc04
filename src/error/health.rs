use thiserror::Error;

use crate::traits::HttpError;

/// Why a single health probe did not confirm a healthy server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthProbeError {
    #[error("{0}")]
    Transport(#[from] HttpError),

    #[error("health endpoint returned HTTP {0}")]
    Status(u16),

    #[error("health endpoint reported status \"{0}\"")]
    NotOk(String),

    #[error("invalid health response: {0}")]
    InvalidBody(String),
}

impl HealthProbeError {
    /// Timeout-class failures qualify for the fast-retry ladder.
    pub fn is_temporary(&self) -> bool {
        match self {
            HealthProbeError::Transport(e) => e.is_temporary(),
            _ => false,
        }
    }
}
