//! Seam for re-pointing the process-wide API client.

use async_trait::async_trait;

use super::http::HttpError;

/// Swaps the base URL every API request is routed to.
///
/// Only the connection coordinator holds one of these; the rest of the
/// application reads the current address through a read-only handle.
#[async_trait]
pub trait ApiClientReinitializer: Send + Sync {
    async fn reinitialize_api_client(&self, url: &str) -> Result<(), HttpError>;
}
