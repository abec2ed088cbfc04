//! The process-wide API client and its base URL.
//!
//! [`SharedApiClient`] is the single writer of the base URL. It is handed
//! to the connection coordinator as its [`ApiClientReinitializer`]; every
//! other part of the application gets a read-only [`ApiClientHandle`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::join_path;
use crate::traits::{ApiClientReinitializer, Headers, HttpClient, HttpError, Response};

/// Owner of the shared base URL.
///
/// Not `Clone`: whoever holds this value is the only component able to
/// re-point the API client.
pub struct SharedApiClient {
    http: Arc<dyn HttpClient>,
    base_url: watch::Sender<Option<String>>,
}

impl SharedApiClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        let (base_url, _) = watch::channel(None);
        Self { http, base_url }
    }

    /// Read-only handle for request routing.
    pub fn handle(&self) -> ApiClientHandle {
        ApiClientHandle {
            http: Arc::clone(&self.http),
            base_url: self.base_url.subscribe(),
        }
    }
}

#[async_trait]
impl ApiClientReinitializer for SharedApiClient {
    async fn reinitialize_api_client(&self, url: &str) -> Result<(), HttpError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HttpError::InvalidUrl(url.to_string()));
        }

        let url = url.trim_end_matches('/').to_string();
        let changed = self.base_url.send_if_modified(|current| {
            if current.as_deref() == Some(url.as_str()) {
                false
            } else {
                *current = Some(url.clone());
                true
            }
        });
        if changed {
            tracing::info!(url = %url, "API client re-pointed");
        }
        Ok(())
    }
}

/// Cloneable reader side of the shared API client.
#[derive(Clone)]
pub struct ApiClientHandle {
    http: Arc<dyn HttpClient>,
    base_url: watch::Receiver<Option<String>>,
}

impl ApiClientHandle {
    /// Current base URL, if the client was initialized.
    pub fn base_url(&self) -> Option<String> {
        self.base_url.borrow().clone()
    }

    /// Absolute URL for an API path.
    pub fn url_for(&self, path: &str) -> Option<String> {
        self.base_url
            .borrow()
            .as_deref()
            .map(|base| join_path(base, path))
    }

    /// GET an API path against the current base URL.
    pub async fn get(&self, path: &str) -> Result<Response, HttpError> {
        let url = self
            .url_for(path)
            .ok_or_else(|| HttpError::InvalidUrl("API client not initialized".to_string()))?;
        self.http.get(&url, &Headers::new()).await
    }

    /// Subscribe to base URL changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.base_url.clone()
    }
}
