//! poslink - network resilience for a LAN-hosted point-of-sale backend.
//!
//! Locates the local server, keeps checking that it is alive and recovers
//! connectivity after Wi-Fi drops, server restarts or address changes, so
//! the rest of the application never has to handle a disconnection itself.
//!
//! The four components are built once, bottom-up, by [`ResilienceLayer`]:
//!
//! - [`health::HealthMonitor`] - periodic health checks with a fast-retry ladder
//! - [`reconnect::AutoReconnector`] - the recovery loop and its log feed
//! - [`coordinator::ConnectionCoordinator`] - the single "are we connected" view
//! - [`notify::NotificationBridge`] - snackbars derived from recovery progress
//!
//! Everything outside the core (HTTP, discovery, storage, notifications,
//! session) is reached through the traits in [`traits`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod notify;
pub mod reconnect;
pub mod traits;

mod sync;

use std::sync::Arc;

use config::ResilienceConfig;
use coordinator::ConnectionCoordinator;
use health::HealthMonitor;
use notify::NotificationBridge;
use reconnect::AutoReconnector;
use traits::{
    ApiClientReinitializer, Discovery, HttpClient, KeyValueStore, NetworkStatusProvider,
    NotificationSink, SessionStore,
};

/// Collaborators the resilience layer consumes.
pub struct ResilienceDeps {
    pub discovery: Arc<dyn Discovery>,
    pub http: Arc<dyn HttpClient>,
    /// Writer side of the shared API client; only the coordinator gets it
    pub api: Arc<dyn ApiClientReinitializer>,
    pub network: Arc<dyn NetworkStatusProvider>,
    pub store: Arc<dyn KeyValueStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub session: Arc<dyn SessionStore>,
}

/// Composition root: one instance of each component per process.
pub struct ResilienceLayer {
    health: HealthMonitor,
    reconnector: AutoReconnector,
    coordinator: ConnectionCoordinator,
    notifications: NotificationBridge,
}

impl ResilienceLayer {
    /// Build the components in dependency order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(deps: ResilienceDeps, config: ResilienceConfig) -> Self {
        let health = HealthMonitor::new(
            Arc::clone(&deps.discovery),
            deps.http,
            config.clone(),
        );
        let reconnector = AutoReconnector::new(
            health.clone(),
            Arc::clone(&deps.discovery),
            Arc::clone(&deps.network),
            config.clone(),
        );
        let coordinator = ConnectionCoordinator::new(
            deps.discovery,
            health.clone(),
            reconnector.clone(),
            deps.api,
            deps.network,
            deps.store,
            config,
        );
        let notifications =
            NotificationBridge::new(reconnector.subscribe(), deps.notifications, deps.session);

        Self {
            health,
            reconnector,
            coordinator,
            notifications,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn reconnector(&self) -> &AutoReconnector {
        &self.reconnector
    }

    pub fn coordinator(&self) -> &ConnectionCoordinator {
        &self.coordinator
    }

    pub fn notifications(&self) -> &NotificationBridge {
        &self.notifications
    }

    /// Tear down in reverse construction order, leaving no timers behind.
    pub fn shutdown(&self) {
        self.notifications.destroy();
        self.coordinator.destroy();
        self.reconnector.stop_auto_reconnect();
        self.health.stop_monitoring();
        tracing::info!("Resilience layer shut down");
    }
}
