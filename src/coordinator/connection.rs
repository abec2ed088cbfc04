use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::state::{ConnectionMode, ConnectionState};
use crate::config::ResilienceConfig;
use crate::error::ConnectError;
use crate::health::{HealthMonitor, HealthState, HealthStatus};
use crate::reconnect::{AutoReconnector, ReconnectState};
use crate::sync::lock;
use crate::traits::{
    ApiClientReinitializer, Discovery, KeyValueStore, NetworkStatus, NetworkStatusProvider,
};

type ConnectFuture = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

struct InFlight {
    id: u64,
    future: ConnectFuture,
    abort: AbortHandle,
}

struct Inner {
    discovery: Arc<dyn Discovery>,
    health: HealthMonitor,
    reconnector: AutoReconnector,
    api: Arc<dyn ApiClientReinitializer>,
    network: Arc<dyn NetworkStatusProvider>,
    store: Arc<dyn KeyValueStore>,
    config: ResilienceConfig,
    state_tx: watch::Sender<ConnectionState>,
    /// The one shared `connect()` attempt, cleared when it completes
    in_flight: Mutex<Option<InFlight>>,
    connect_seq: AtomicU64,
    /// Pending post-Wi-Fi-regain connect
    settle: Mutex<Option<JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let listeners = self.listeners.get_mut().unwrap_or_else(PoisonError::into_inner);
        for handle in listeners.drain(..) {
            handle.abort();
        }
        let settle = self.settle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = settle.take() {
            handle.abort();
        }
    }
}

/// Single source of truth for "are we connected".
///
/// Aggregates the device network status, the health monitor and the
/// reconnector, owns the connection mode, and is the only component that
/// re-points the shared API client. The client is always re-pointed before
/// `is_connected` turns true.
#[derive(Clone)]
pub struct ConnectionCoordinator {
    inner: Arc<Inner>,
}

impl ConnectionCoordinator {
    /// Build the coordinator, load the persisted mode and subscribe to the
    /// network status, the health monitor and the reconnector.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        discovery: Arc<dyn Discovery>,
        health: HealthMonitor,
        reconnector: AutoReconnector,
        api: Arc<dyn ApiClientReinitializer>,
        network: Arc<dyn NetworkStatusProvider>,
        store: Arc<dyn KeyValueStore>,
        config: ResilienceConfig,
    ) -> Self {
        let mode = load_mode(store.as_ref(), &config.mode_storage_key);
        let initial = ConnectionState {
            mode,
            has_wifi: network.current().has_lan_link(),
            current_url: match mode {
                ConnectionMode::Manual => discovery.manual_url(),
                ConnectionMode::Auto => None,
            },
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(initial);

        let inner = Arc::new(Inner {
            discovery,
            health,
            reconnector,
            api,
            network,
            store,
            config,
            state_tx,
            in_flight: Mutex::new(None),
            connect_seq: AtomicU64::new(0),
            settle: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&inner);
        let listeners = vec![
            spawn_network_listener(weak.clone(), inner.network.subscribe()),
            spawn_health_listener(weak.clone(), inner.health.subscribe()),
            spawn_recovered_listener(weak.clone(), inner.health.subscribe_recovered()),
            spawn_reconnector_listener(weak.clone(), inner.reconnector.subscribe()),
            spawn_reconnected_listener(weak, inner.reconnector.subscribe_reconnected()),
        ];
        *lock(&inner.listeners) = listeners;

        info!(mode = %mode, "Connection coordinator ready");
        Self { inner }
    }

    /// Resolve, verify and activate a server address.
    ///
    /// Concurrent callers share one attempt and all receive its result.
    /// Failures are recorded on the state and returned; nothing retries
    /// internally.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let future = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!("Joining in-flight connection attempt");
                    in_flight.future.clone()
                }
                None => {
                    let id = self.inner.connect_seq.fetch_add(1, Ordering::SeqCst) + 1;
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let result = inner.run_connect().await;
                        let mut slot = lock(&inner.in_flight);
                        if slot.as_ref().is_some_and(|f| f.id == id) {
                            *slot = None;
                        }
                        result
                    });
                    let abort = task.abort_handle();
                    let weak = Arc::downgrade(&self.inner);
                    let future = async move {
                        task.await.unwrap_or_else(|_| {
                            // Aborted by a Wi-Fi loss or by destroy().
                            let offline = weak
                                .upgrade()
                                .is_some_and(|inner| !inner.state_tx.borrow().has_wifi);
                            Err(if offline {
                                ConnectError::NoWifi
                            } else {
                                ConnectError::Interrupted
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        id,
                        future: future.clone(),
                        abort,
                    });
                    future
                }
            }
        };
        future.await
    }

    /// Hand recovery to the reconnector.
    ///
    /// Without Wi-Fi nothing is started and the error reads
    /// "Sin conexión WiFi". Returns whether a reconnection loop was started.
    pub fn retry(&self) -> bool {
        if !self.inner.network.current().has_lan_link() {
            self.inner.update(|state| {
                state.has_wifi = false;
                state.error = Some(ConnectError::NoWifi.to_string());
            });
            info!("Retry skipped, no Wi-Fi");
            return false;
        }
        if self.inner.state_tx.borrow().is_connected {
            debug!("Retry skipped, already connected");
            return false;
        }
        self.inner.reconnector.start_auto_reconnect()
    }

    /// Persist and apply a new connection mode. Switching to manual shows
    /// the pinned address right away.
    pub fn set_connection_mode(&self, mode: ConnectionMode) {
        let store_error = self
            .inner
            .store
            .set_item(&self.inner.config.mode_storage_key, mode.as_str())
            .err();
        if let Some(e) = &store_error {
            warn!(mode = %mode, error = %e, "Could not persist connection mode");
        }

        let manual_url = match mode {
            ConnectionMode::Manual => self.inner.discovery.manual_url(),
            ConnectionMode::Auto => None,
        };
        self.inner.update(|state| {
            state.mode = mode;
            if mode == ConnectionMode::Manual {
                state.current_url = manual_url;
            }
            if let Some(e) = store_error {
                state.error = Some(format!("could not save connection mode: {}", e));
            }
        });
        info!(mode = %mode, "Connection mode changed");
    }

    /// Pin `url` as the manual server address.
    pub fn set_manual_url(&self, url: &str) {
        let (mode, current) = {
            let state = self.inner.state_tx.borrow();
            (state.mode, state.current_url.clone())
        };
        self.inner.discovery.set_server_url(url, true);

        match mode {
            ConnectionMode::Manual => {
                let url = url.to_string();
                self.inner.update(|state| state.current_url = Some(url));
            }
            ConnectionMode::Auto => {
                // Pinning must not move the active auto address.
                if let Some(current) = current {
                    self.inner.discovery.set_server_url(&current, false);
                }
            }
        }
    }

    /// Tear down every subscription and pending timer. The coordinator is
    /// inert afterwards; its last state stays readable.
    pub fn destroy(&self) {
        for handle in lock(&self.inner.listeners).drain(..) {
            handle.abort();
        }
        if let Some(handle) = lock(&self.inner.settle).take() {
            handle.abort();
        }
        if let Some(in_flight) = lock(&self.inner.in_flight).take() {
            in_flight.abort.abort();
        }
        info!("Connection coordinator destroyed");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to state; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn mode(&self) -> ConnectionMode {
        self.inner.state_tx.borrow().mode
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state_tx.borrow().is_connected
    }
}

impl Inner {
    /// Publish only when something actually changed.
    fn update(&self, apply: impl FnOnce(&mut ConnectionState)) {
        self.state_tx.send_if_modified(|state| {
            let before = state.clone();
            apply(state);
            *state != before
        });
    }

    async fn run_connect(&self) -> Result<(), ConnectError> {
        self.update(|state| state.is_connecting = true);

        let result = match self.resolve_verified_url().await {
            Ok(url) => self.activate(url).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(error = %e, "Connection attempt failed");
            let message = e.to_string();
            self.update(|state| {
                state.is_connected = false;
                state.is_connecting = false;
                state.is_healthy = false;
                state.last_error = Some(message.clone());
                state.error = Some(message);
            });
        }
        result
    }

    async fn resolve_verified_url(&self) -> Result<String, ConnectError> {
        if !self.network.current().has_lan_link() {
            return Err(ConnectError::NoWifi);
        }

        let mode = self.state_tx.borrow().mode;
        match mode {
            ConnectionMode::Manual => {
                let url = self
                    .discovery
                    .manual_url()
                    .ok_or(ConnectError::NoManualUrl)?;
                self.verify(&url).await?;
                self.discovery.set_server_url(&url, true);
                Ok(url)
            }
            ConnectionMode::Auto => {
                if let Some(url) = self.discovery.last_known_url() {
                    if self.health.check_health_with_url(&url).await {
                        self.discovery.set_server_url(&url, false);
                        return Ok(url);
                    }
                    debug!(url = %url, "Last known server did not answer, discovering");
                }

                let url = self
                    .discovery
                    .discover_server()
                    .await?
                    .ok_or(ConnectError::ServerNotFound)?;
                self.verify(&url).await?;
                self.discovery.set_server_url(&url, false);
                Ok(url)
            }
        }
    }

    async fn verify(&self, url: &str) -> Result<(), ConnectError> {
        if self.health.check_health_with_url(url).await {
            Ok(())
        } else {
            Err(ConnectError::HealthCheckFailed {
                url: url.to_string(),
            })
        }
    }

    async fn activate(&self, url: String) -> Result<(), ConnectError> {
        if !self.state_tx.borrow().has_wifi {
            return Err(ConnectError::NoWifi);
        }
        self.health.start_monitoring();
        if let Err(e) = self.api.reinitialize_api_client(&url).await {
            self.health.stop_monitoring();
            return Err(ConnectError::ApiClient(e.to_string()));
        }

        if !self.mark_connected(&url) {
            self.health.stop_monitoring();
            return Err(ConnectError::NoWifi);
        }
        info!(url = %url, "Connected");
        Ok(())
    }

    /// Flip to connected in the same publication that checks `has_wifi`,
    /// so a concurrent Wi-Fi loss either lands first and wins or lands
    /// after and clears the flag again.
    fn mark_connected(&self, url: &str) -> bool {
        let mut connected = false;
        self.state_tx.send_if_modified(|state| {
            if !state.has_wifi {
                return false;
            }
            connected = true;
            let before = state.clone();
            state.is_connected = true;
            state.is_connecting = false;
            state.is_healthy = true;
            state.current_url = Some(url.to_string());
            state.last_error = None;
            state.error = None;
            *state != before
        });
        connected
    }

    fn on_network(self: &Arc<Self>, status: NetworkStatus) {
        let has_wifi = status.has_lan_link();
        if has_wifi == self.state_tx.borrow().has_wifi {
            return;
        }

        if has_wifi {
            info!(transport = ?status.transport, "Wi-Fi regained");
            let no_wifi = ConnectError::NoWifi.to_string();
            self.update(|state| {
                state.has_wifi = true;
                if state.error.as_deref() == Some(no_wifi.as_str()) {
                    state.error = None;
                }
            });
            self.schedule_settled_connect();
        } else {
            warn!("Wi-Fi lost");
            if let Some(handle) = lock(&self.settle).take() {
                handle.abort();
            }
            self.update(|state| {
                state.has_wifi = false;
                state.is_connected = false;
                state.is_connecting = false;
                state.is_healthy = false;
                state.error = Some(ConnectError::NoWifi.to_string());
            });
            if let Some(in_flight) = lock(&self.in_flight).take() {
                debug!("Abandoning in-flight connection attempt");
                in_flight.abort.abort();
            }
            self.health.stop_monitoring();
        }
    }

    /// One `connect()` after the settle delay; a newer regain replaces it.
    fn schedule_settled_connect(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay = self.config.wifi_settle_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = (ConnectionCoordinator { inner }).connect().await {
                debug!(error = %e, "Connect after Wi-Fi regain failed");
            }
        });
        if let Some(previous) = lock(&self.settle).replace(handle) {
            previous.abort();
        }
    }

    /// Merge a health snapshot; an unavailable to available edge while on
    /// Wi-Fi counts as a reconnection.
    async fn on_health(self: &Arc<Self>, health: HealthState, was_available: bool) {
        if !self.state_tx.borrow().has_wifi {
            return;
        }

        self.update(|state| {
            state.is_healthy = health.is_available;
            match health.status {
                HealthStatus::Ok => state.error = None,
                HealthStatus::Error => state.error = health.message.clone(),
                HealthStatus::Checking => {}
            }
        });

        if health.is_available && !was_available {
            self.repair("health").await;
        }
    }

    fn on_reconnector(&self, reconnect: &ReconnectState) {
        let searching = reconnect.is_reconnecting;
        self.update(|state| state.is_searching = searching);
    }

    /// Shared by every recovery signal: re-resolve the active address,
    /// re-point the API client, then mark connected.
    async fn repair(self: &Arc<Self>, source: &'static str) {
        if !self.state_tx.borrow().has_wifi {
            debug!(source, "Ignoring recovery signal without Wi-Fi");
            return;
        }
        let url = match self.discovery.api_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(source, error = %e, "Recovered but no server address is active");
                return;
            }
        };

        if let Err(e) = self.api.reinitialize_api_client(&url).await {
            warn!(source, url = %url, error = %e, "Could not re-point API client");
            let message = ConnectError::ApiClient(e.to_string()).to_string();
            self.update(|state| state.error = Some(message));
            return;
        }

        let mode = self.state_tx.borrow().mode;
        if mode == ConnectionMode::Auto
            && self.discovery.last_known_url().as_deref() != Some(url.as_str())
        {
            self.discovery.set_server_url(&url, false);
        }

        self.health.ensure_monitoring();
        if !self.mark_connected(&url) {
            debug!(source, "Wi-Fi lost during recovery, staying disconnected");
            self.health.stop_monitoring();
            return;
        }
        info!(source, url = %url, "Connection restored");
    }
}

fn load_mode(store: &dyn KeyValueStore, key: &str) -> ConnectionMode {
    match store.get_item(key) {
        Ok(Some(value)) => value.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "Ignoring stored connection mode");
            ConnectionMode::default()
        }),
        Ok(None) => ConnectionMode::default(),
        Err(e) => {
            warn!(error = %e, "Could not read connection mode");
            ConnectionMode::default()
        }
    }
}

fn spawn_network_listener(
    weak: Weak<Inner>,
    mut rx: watch::Receiver<NetworkStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.on_network(status);
        }
    })
}

fn spawn_health_listener(weak: Weak<Inner>, mut rx: watch::Receiver<HealthState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_available = rx.borrow_and_update().is_available;
        while rx.changed().await.is_ok() {
            let health = rx.borrow_and_update().clone();
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let available = health.is_available;
            inner.on_health(health, was_available).await;
            was_available = available;
        }
    })
}

fn spawn_recovered_listener(weak: Weak<Inner>, mut rx: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.repair("recovered").await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_reconnector_listener(
    weak: Weak<Inner>,
    mut rx: watch::Receiver<ReconnectState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.on_reconnector(&rx.borrow_and_update());
        }
    })
}

fn spawn_reconnected_listener(
    weak: Weak<Inner>,
    mut rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    inner.repair("reconnected").await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
