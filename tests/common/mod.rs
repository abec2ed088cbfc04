//! Common test utilities for integration tests.
//!
//! Builds a full [`ResilienceLayer`] over the mock collaborators so tests
//! can script the network, the server and discovery, and observe every
//! component.
//!
//! # Example
//!
//! ```ignore
//! let t = TestLayerBuilder::new().with_last_known(SERVER).build();
//! t.http.set_response(&health_url(SERVER), MockResponse::healthy());
//! t.layer.coordinator().connect().await?;
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use poslink::adapters::mock::{InMemoryStore, MockDiscovery, MockHttpClient, RecordingNotificationSink};
use poslink::adapters::{ApiClientHandle, SessionFlag, SharedApiClient, WatchNetworkStatus};
use poslink::config::ResilienceConfig;
use poslink::traits::NetworkStatus;
use poslink::{ResilienceDeps, ResilienceLayer};

pub const SERVER: &str = "http://192.168.1.50:3737";
pub const STALE_SERVER: &str = "http://192.168.1.20:3737";

pub fn health_url(base: &str) -> String {
    format!("{}/health", base)
}

/// Let spawned listeners catch up. Under paused time this also advances
/// the clock by a negligible amount.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub struct TestLayer {
    pub layer: ResilienceLayer,
    pub http: MockHttpClient,
    pub discovery: MockDiscovery,
    pub network: WatchNetworkStatus,
    pub store: InMemoryStore,
    pub sink: RecordingNotificationSink,
    pub session: SessionFlag,
    pub api: ApiClientHandle,
}

/// Builder for [`TestLayer`].
pub struct TestLayerBuilder {
    config: ResilienceConfig,
    network: NetworkStatus,
    store: InMemoryStore,
    last_known: Option<String>,
    authenticated: bool,
}

impl TestLayerBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
            network: NetworkStatus::wifi(),
            store: InMemoryStore::new(),
            last_known: None,
            authenticated: true,
        }
    }

    pub fn with_config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_network(mut self, network: NetworkStatus) -> Self {
        self.network = network;
        self
    }

    pub fn with_store(mut self, store: InMemoryStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_last_known(mut self, url: &str) -> Self {
        self.last_known = Some(url.to_string());
        self
    }

    pub fn signed_out(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// Must be called from within a tokio runtime.
    pub fn build(self) -> TestLayer {
        let http = MockHttpClient::new();
        let discovery = MockDiscovery::new();
        if let Some(url) = &self.last_known {
            discovery.set_last_known(url);
        }
        let network = WatchNetworkStatus::new(self.network);
        let sink = RecordingNotificationSink::new();
        let session = SessionFlag::new(self.authenticated);
        let shared_api = SharedApiClient::new(Arc::new(http.clone()));
        let api = shared_api.handle();

        let layer = ResilienceLayer::new(
            ResilienceDeps {
                discovery: Arc::new(discovery.clone()),
                http: Arc::new(http.clone()),
                api: Arc::new(shared_api),
                network: Arc::new(network.clone()),
                store: Arc::new(self.store.clone()),
                notifications: Arc::new(sink.clone()),
                session: Arc::new(session.clone()),
            },
            self.config,
        );

        TestLayer {
            layer,
            http,
            discovery,
            network,
            store: self.store,
            sink,
            session,
            api,
        }
    }
}

impl Default for TestLayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
