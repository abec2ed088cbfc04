//! Scripted discovery collaborator for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::DiscoveryError;
use crate::traits::{Discovery, DiscoveryLogCallback};

struct MockDiscoveryState {
    discover_result: Result<Option<String>, DiscoveryError>,
    rediscovery_result: Result<Option<String>, DiscoveryError>,
    rediscovery_log: Vec<String>,
    delay: Option<Duration>,
    active: Option<String>,
    last_known: Option<String>,
    manual: Option<String>,
    log_callback: Option<DiscoveryLogCallback>,
    discover_calls: usize,
    rediscovery_calls: usize,
    set_calls: Vec<(String, bool)>,
}

impl Default for MockDiscoveryState {
    fn default() -> Self {
        Self {
            discover_result: Ok(None),
            rediscovery_result: Ok(None),
            rediscovery_log: Vec::new(),
            delay: None,
            active: None,
            last_known: None,
            manual: None,
            log_callback: None,
            discover_calls: 0,
            rediscovery_calls: 0,
            set_calls: Vec::new(),
        }
    }
}

impl MockDiscoveryState {
    /// A found address becomes the active one, like a real scan.
    fn finish(
        &mut self,
        pick: impl FnOnce(&Self) -> Result<Option<String>, DiscoveryError>,
    ) -> Result<Option<String>, DiscoveryError> {
        let result = pick(self);
        if let Ok(Some(url)) = &result {
            self.active = Some(url.clone());
        }
        result
    }
}

/// Discovery double. `set_server_url` behaves like a real collaborator
/// (updates the active, last-known or manual address) so components can
/// observe their own writes.
#[derive(Clone, Default)]
pub struct MockDiscovery {
    state: Arc<Mutex<MockDiscoveryState>>,
}

impl MockDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result of `discover_server`.
    pub fn set_discover_result(&self, result: Result<Option<String>, DiscoveryError>) {
        self.state.lock().unwrap().discover_result = result;
    }

    /// Result of `force_rediscovery`.
    pub fn set_rediscovery_result(&self, result: Result<Option<String>, DiscoveryError>) {
        self.state.lock().unwrap().rediscovery_result = result;
    }

    /// Lines fed to the log callback during `force_rediscovery`.
    pub fn set_rediscovery_log(&self, lines: &[&str]) {
        self.state.lock().unwrap().rediscovery_log = lines.iter().map(|l| l.to_string()).collect();
    }

    /// Latency of both discovery operations.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    /// Seed a last-known URL; it also becomes the active one.
    pub fn set_last_known(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.last_known = Some(url.to_string());
        state.active = Some(url.to_string());
    }

    /// Seed a pinned manual URL without making it active.
    pub fn set_manual(&self, url: Option<&str>) {
        self.state.lock().unwrap().manual = url.map(str::to_string);
    }

    /// Override the address `api_url` reports.
    pub fn set_active(&self, url: Option<&str>) {
        self.state.lock().unwrap().active = url.map(str::to_string);
    }

    pub fn discover_calls(&self) -> usize {
        self.state.lock().unwrap().discover_calls
    }

    pub fn rediscovery_calls(&self) -> usize {
        self.state.lock().unwrap().rediscovery_calls
    }

    /// Every `(url, is_manual)` passed to `set_server_url`.
    pub fn set_server_url_calls(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().set_calls.clone()
    }

    pub fn has_log_callback(&self) -> bool {
        self.state.lock().unwrap().log_callback.is_some()
    }

    async fn wait(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn discover_server(&self) -> Result<Option<String>, DiscoveryError> {
        self.state.lock().unwrap().discover_calls += 1;
        self.wait().await;
        self.state.lock().unwrap().finish(|s| s.discover_result.clone())
    }

    fn api_url(&self) -> Result<String, DiscoveryError> {
        self.state
            .lock()
            .unwrap()
            .active
            .clone()
            .ok_or(DiscoveryError::NotConfigured)
    }

    fn last_known_url(&self) -> Option<String> {
        self.state.lock().unwrap().last_known.clone()
    }

    fn manual_url(&self) -> Option<String> {
        self.state.lock().unwrap().manual.clone()
    }

    fn set_server_url(&self, url: &str, is_manual: bool) {
        let mut state = self.state.lock().unwrap();
        state.set_calls.push((url.to_string(), is_manual));
        if is_manual {
            state.manual = Some(url.to_string());
        } else {
            state.last_known = Some(url.to_string());
        }
        state.active = Some(url.to_string());
    }

    async fn force_rediscovery(&self) -> Result<Option<String>, DiscoveryError> {
        let (lines, callback) = {
            let mut state = self.state.lock().unwrap();
            state.rediscovery_calls += 1;
            (state.rediscovery_log.clone(), state.log_callback.clone())
        };
        if let Some(callback) = callback {
            for line in &lines {
                callback(line);
            }
        }
        self.wait().await;
        self.state.lock().unwrap().finish(|s| s.rediscovery_result.clone())
    }

    fn set_log_callback(&self, callback: Option<DiscoveryLogCallback>) {
        self.state.lock().unwrap().log_callback = callback;
    }
}
