//! Discovery over a fixed list of candidate addresses.
//!
//! Stands in for a LAN scanner: every candidate's health endpoint is
//! probed in order and the first healthy one wins. The last verified and
//! the manually pinned addresses are remembered in the key-value store.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::error::DiscoveryError;
use crate::health::is_healthy_response;
use crate::sync::lock;
use crate::traits::{Discovery, DiscoveryLogCallback, Headers, HttpClient, KeyValueStore};

const LAST_KNOWN_KEY: &str = "last_known_url";
const MANUAL_KEY: &str = "manual_url";

#[derive(Default)]
struct DiscoveryState {
    active: Option<String>,
    last_known: Option<String>,
    manual: Option<String>,
    log_callback: Option<DiscoveryLogCallback>,
}

pub struct CandidateDiscovery {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn KeyValueStore>,
    candidates: Vec<String>,
    health_path: String,
    timeout: Duration,
    state: Mutex<DiscoveryState>,
}

impl CandidateDiscovery {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn KeyValueStore>,
        candidates: Vec<String>,
        config: &ResilienceConfig,
    ) -> Self {
        let last_known = read_key(store.as_ref(), LAST_KNOWN_KEY);
        let manual = read_key(store.as_ref(), MANUAL_KEY);

        Self {
            http,
            store,
            candidates,
            health_path: config.health_path.clone(),
            timeout: config.request_timeout,
            state: Mutex::new(DiscoveryState {
                active: last_known.clone(),
                last_known,
                manual,
                log_callback: None,
            }),
        }
    }

    fn log(&self, message: &str) {
        tracing::debug!("{}", message);
        let callback = lock(&self.state).log_callback.clone();
        if let Some(callback) = callback {
            callback(message);
        }
    }

    async fn probe(&self, base: &str) -> bool {
        let url = crate::config::join_path(base, &self.health_path);
        match self
            .http
            .get_with_timeout(&url, &Headers::new(), self.timeout)
            .await
        {
            Ok(response) => is_healthy_response(&response),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Candidate probe failed");
                false
            }
        }
    }

    async fn probe_in_order(&self, order: Vec<String>) -> Option<String> {
        for candidate in order {
            self.log(&format!("Probing {}", candidate));
            if self.probe(&candidate).await {
                self.log(&format!("Server found at {}", candidate));
                lock(&self.state).active = Some(candidate.clone());
                return Some(candidate);
            }
        }
        self.log("No candidate answered");
        None
    }
}

fn read_key(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get_item(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Could not read stored server address");
            None
        }
    }
}

#[async_trait]
impl Discovery for CandidateDiscovery {
    async fn discover_server(&self) -> Result<Option<String>, DiscoveryError> {
        let mut order = Vec::with_capacity(self.candidates.len() + 1);
        if let Some(last) = self.last_known_url() {
            order.push(last);
        }
        for candidate in &self.candidates {
            if !order.contains(candidate) {
                order.push(candidate.clone());
            }
        }
        if order.is_empty() {
            return Err(DiscoveryError::Failed("no candidate addresses configured".to_string()));
        }
        Ok(self.probe_in_order(order).await)
    }

    fn api_url(&self) -> Result<String, DiscoveryError> {
        lock(&self.state)
            .active
            .clone()
            .ok_or(DiscoveryError::NotConfigured)
    }

    fn last_known_url(&self) -> Option<String> {
        lock(&self.state).last_known.clone()
    }

    fn manual_url(&self) -> Option<String> {
        lock(&self.state).manual.clone()
    }

    fn set_server_url(&self, url: &str, is_manual: bool) {
        {
            let mut state = lock(&self.state);
            if is_manual {
                state.manual = Some(url.to_string());
            } else {
                state.last_known = Some(url.to_string());
            }
            state.active = Some(url.to_string());
        }

        let key = if is_manual { MANUAL_KEY } else { LAST_KNOWN_KEY };
        if let Err(e) = self.store.set_item(key, url) {
            tracing::warn!(key, error = %e, "Could not persist server address");
        }
    }

    async fn force_rediscovery(&self) -> Result<Option<String>, DiscoveryError> {
        let mut order = self.candidates.clone();
        if let Some(last) = self.last_known_url() {
            if !order.contains(&last) {
                order.push(last);
            }
        }
        if order.is_empty() {
            return Err(DiscoveryError::Failed("no candidate addresses configured".to_string()));
        }
        Ok(self.probe_in_order(order).await)
    }

    fn set_log_callback(&self, callback: Option<DiscoveryLogCallback>) {
        lock(&self.state).log_callback = callback;
    }
}
