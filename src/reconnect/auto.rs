use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chrono::Local;

use super::state::{transition, LogEntry, LogLevel, ReconnectEvent, ReconnectState};
use crate::config::ResilienceConfig;
use crate::health::HealthMonitor;
use crate::sync::lock;
use crate::traits::{Discovery, NetworkStatusProvider};

struct Inner {
    health: HealthMonitor,
    discovery: Arc<dyn Discovery>,
    network: Arc<dyn NetworkStatusProvider>,
    config: ResilienceConfig,
    state_tx: watch::Sender<ReconnectState>,
    reconnected_tx: broadcast::Sender<()>,
    is_running: AtomicBool,
    /// Bumped by every stop; publications from an older run are dropped
    generation: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

/// Drives the recovery loop while the application is disconnected.
///
/// Each cycle checks the LAN link, bursts health checks against the
/// current server, falls back to rediscovery and verifies what discovery
/// found. The loop ends on success or on [`stop_auto_reconnect`].
///
/// [`stop_auto_reconnect`]: AutoReconnector::stop_auto_reconnect
#[derive(Clone)]
pub struct AutoReconnector {
    inner: Arc<Inner>,
}

impl AutoReconnector {
    pub fn new(
        health: HealthMonitor,
        discovery: Arc<dyn Discovery>,
        network: Arc<dyn NetworkStatusProvider>,
        config: ResilienceConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ReconnectState::new(config.log_capacity));
        let (reconnected_tx, _) = broadcast::channel(8);

        Self {
            inner: Arc::new(Inner {
                health,
                discovery,
                network,
                config,
                state_tx,
                reconnected_tx,
                is_running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                task: Mutex::new(None),
            }),
        }
    }

    /// Launch the loop. Returns `false` without side effects when a loop is
    /// already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_auto_reconnect(&self) -> bool {
        // Start and stop serialize on the task slot so a stop can never
        // abort a run it did not observe.
        let mut task = lock(&self.inner.task);
        if self
            .inner
            .is_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Auto-reconnect already running");
            return false;
        }

        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.apply(generation, ReconnectEvent::Started);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(generation).await });
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        true
    }

    /// Stop the loop and cancel whatever it is waiting on. Nothing is
    /// appended to the log feed after the stop entry. Safe to call at any
    /// time.
    pub fn stop_auto_reconnect(&self) {
        let was_running = {
            let mut task = lock(&self.inner.task);
            let was_running = self.inner.is_running.swap(false, Ordering::AcqRel);
            if let Some(handle) = task.take() {
                handle.abort();
            }
            self.inner.state_tx.send_modify(|state| {
                self.inner.generation.fetch_add(1, Ordering::SeqCst);
                if was_running {
                    advance(state, &ReconnectEvent::Stopped);
                }
            });
            self.inner.discovery.set_log_callback(None);
            was_running
        };

        if was_running {
            info!("Auto-reconnect stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ReconnectState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to full state snapshots; starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<ReconnectState> {
        self.inner.state_tx.subscribe()
    }

    /// Fires each time a loop ends connected.
    pub fn subscribe_reconnected(&self) -> broadcast::Receiver<()> {
        self.inner.reconnected_tx.subscribe()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publish the result of `event` unless the run was stopped.
    fn apply(&self, generation: u64, event: ReconnectEvent) -> bool {
        self.state_tx.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            advance(state, &event);
            true
        })
    }

    async fn run(self: Arc<Self>, generation: u64) {
        loop {
            if !self.apply(generation, ReconnectEvent::CycleBegan) {
                return;
            }

            let network = self.network.current();
            if !network.has_lan_link() {
                debug!(transport = ?network.transport, "No LAN link");
                self.apply(generation, ReconnectEvent::NetworkUnavailable);
                self.wait_for_next_cycle(generation).await;
                continue;
            }
            self.apply(generation, ReconnectEvent::NetworkAvailable);

            if self.health_burst(generation, self.config.initial_burst).await {
                self.finish(generation);
                return;
            }
            self.apply(generation, ReconnectEvent::HealthExhausted);

            if let Some(url) = self.rediscover(generation).await {
                self.apply(generation, ReconnectEvent::DiscoveryFound { url });
                if self.health_burst(generation, self.config.verify_burst).await {
                    self.finish(generation);
                    return;
                }
                self.apply(generation, ReconnectEvent::VerificationFailed);
            }

            self.wait_for_next_cycle(generation).await;
        }
    }

    async fn health_burst(&self, generation: u64, attempts: u32) -> bool {
        let total = attempts.max(1);
        for attempt in 1..=total {
            if !self.apply(generation, ReconnectEvent::HealthProbe { attempt, total }) {
                return false;
            }
            if self.health.force_check().await {
                return true;
            }
            if attempt < total {
                tokio::time::sleep(self.config.burst_gap).await;
            }
        }
        false
    }

    /// Discovery errors are logged and treated as "not found".
    async fn rediscover(self: &Arc<Self>, generation: u64) -> Option<String> {
        let weak = Arc::downgrade(self);
        self.discovery.set_log_callback(Some(Arc::new(move |line: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.apply(
                    generation,
                    ReconnectEvent::DiscoveryLog {
                        line: line.to_string(),
                    },
                );
            }
        })));

        let result = self.discovery.force_rediscovery().await;
        self.discovery.set_log_callback(None);

        match result {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                self.apply(
                    generation,
                    ReconnectEvent::DiscoveryFailed {
                        reason: "servidor no encontrado".to_string(),
                    },
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Rediscovery failed");
                self.apply(
                    generation,
                    ReconnectEvent::DiscoveryFailed {
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }

    fn finish(&self, generation: u64) {
        let finished = self.state_tx.send_if_modified(|state| {
            if !self.is_current(generation) {
                return false;
            }
            advance(state, &ReconnectEvent::HealthConfirmed);
            self.is_running.store(false, Ordering::Release);
            true
        });

        if finished {
            info!(attempts = self.state_tx.borrow().attempts, "Reconnected");
            let _ = self.reconnected_tx.send(());
        }
    }

    async fn wait_for_next_cycle(&self, generation: u64) {
        let delay = self.config.cycle_delay;
        self.apply(
            generation,
            ReconnectEvent::Waiting {
                delay_secs: delay.as_secs(),
            },
        );
        sleep_at_least(delay).await;
    }
}

/// Step the machine and mirror the entries it wrote to `tracing`.
fn advance(state: &mut ReconnectState, event: &ReconnectEvent) {
    let seen = state.latest_log().map_or(0, |entry| entry.seq);
    *state = transition(state, event, Local::now());
    for entry in state.logs_since(seen) {
        trace_entry(entry, state.attempts);
    }
}

fn trace_entry(entry: &LogEntry, attempt: u32) {
    match entry.level {
        LogLevel::Error => warn!(attempt, status = %entry.status, "{}", entry.message),
        LogLevel::Info | LogLevel::Success => {
            info!(attempt, status = %entry.status, "{}", entry.message)
        }
    }
}

/// A zero cycle delay would spin the loop without yielding.
async fn sleep_at_least(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockDiscovery, MockHttpClient, MockResponse};
    use crate::adapters::WatchNetworkStatus;
    use crate::error::DiscoveryError;
    use crate::reconnect::ReconnectStatus;
    use crate::traits::NetworkStatus;
    use tokio::time::sleep;

    const OLD: &str = "http://192.168.1.20:3737";
    const NEW: &str = "http://192.168.1.50:3737";

    struct Fixture {
        reconnector: AutoReconnector,
        http: MockHttpClient,
        discovery: MockDiscovery,
        network: WatchNetworkStatus,
    }

    fn fixture() -> Fixture {
        let config = ResilienceConfig::default();
        let http = MockHttpClient::new();
        let discovery = MockDiscovery::new();
        discovery.set_last_known(OLD);
        let network = WatchNetworkStatus::new(NetworkStatus::wifi());
        let health = HealthMonitor::new(
            Arc::new(discovery.clone()),
            Arc::new(http.clone()),
            config.clone(),
        );
        let reconnector = AutoReconnector::new(
            health,
            Arc::new(discovery.clone()),
            Arc::new(network.clone()),
            config,
        );
        Fixture {
            reconnector,
            http,
            discovery,
            network,
        }
    }

    fn messages(state: &ReconnectState) -> Vec<String> {
        state.logs.iter().map(|l| l.message.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_server_connects_in_first_burst() {
        let f = fixture();
        f.http.set_response(&format!("{OLD}/health"), MockResponse::healthy());
        let mut reconnected = f.reconnector.subscribe_reconnected();

        assert!(f.reconnector.start_auto_reconnect());
        sleep(Duration::from_millis(100)).await;

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Connected);
        assert_eq!(state.attempts, 1);
        assert!(!state.is_reconnecting);
        assert!(!f.reconnector.is_running());
        assert!(reconnected.try_recv().is_ok());
        assert_eq!(f.discovery.rediscovery_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_then_verification() {
        let f = fixture();
        f.http.set_response(&format!("{OLD}/health"), MockResponse::refused());
        f.http.set_response(&format!("{NEW}/health"), MockResponse::healthy());
        f.discovery.set_rediscovery_result(Ok(Some(NEW.to_string())));
        f.discovery
            .set_rediscovery_log(&["Probing http://192.168.1.50:3737"]);

        f.reconnector.start_auto_reconnect();

        // Three probes two seconds apart, then discovery.
        sleep(Duration::from_millis(4_100)).await;

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Connected);
        assert_eq!(f.http.request_count(&format!("{OLD}/health")), 3);
        assert_eq!(f.http.request_count(&format!("{NEW}/health")), 1);
        assert_eq!(f.discovery.rediscovery_calls(), 1);
        assert!(!f.discovery.has_log_callback());

        let logs = messages(&state);
        assert!(logs.contains(&"[Discovery] Probing http://192.168.1.50:3737".to_string()));
        assert!(logs.contains(&format!("Servidor encontrado en {NEW}")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_waits_then_retries() {
        let f = fixture();
        f.http.set_response(&format!("{OLD}/health"), MockResponse::refused());
        f.discovery.set_rediscovery_result(Ok(None));

        f.reconnector.start_auto_reconnect();
        sleep(Duration::from_secs(5)).await;

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Failed);
        assert_eq!(state.attempts, 1);
        assert!(state.is_reconnecting);

        // 4s of bursts + 15s cycle delay.
        sleep(Duration::from_secs(15)).await;
        assert_eq!(f.reconnector.state().attempts, 2);
        assert_eq!(f.discovery.rediscovery_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_error_is_not_fatal() {
        let f = fixture();
        f.http.set_response(&format!("{OLD}/health"), MockResponse::refused());
        f.discovery
            .set_rediscovery_result(Err(DiscoveryError::Failed("scan aborted".to_string())));

        f.reconnector.start_auto_reconnect();
        sleep(Duration::from_secs(5)).await;

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Failed);
        assert_eq!(state.last_error.as_deref(), Some("discovery failed: scan aborted"));
        assert!(f.reconnector.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_lan_link_skips_probes() {
        let f = fixture();
        f.network.set(NetworkStatus::cellular());

        f.reconnector.start_auto_reconnect();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(f.reconnector.state().status, ReconnectStatus::NoWifi);
        assert_eq!(f.http.total_requests(), 0);

        f.http.set_response(&format!("{OLD}/health"), MockResponse::healthy());
        f.network.set(NetworkStatus::wifi());
        sleep(Duration::from_secs(15)).await;

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Connected);
        assert_eq!(state.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_noop() {
        let f = fixture();
        f.network.set(NetworkStatus::offline());

        assert!(f.reconnector.start_auto_reconnect());
        assert!(!f.reconnector.start_auto_reconnect());
        sleep(Duration::from_secs(1)).await;

        assert_eq!(f.reconnector.state().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_discovery_freezes_the_feed() {
        let f = fixture();
        f.http.set_response(&format!("{OLD}/health"), MockResponse::refused());
        f.discovery.set_delay(Some(Duration::from_secs(10)));
        f.discovery.set_rediscovery_result(Ok(Some(NEW.to_string())));

        f.reconnector.start_auto_reconnect();
        sleep(Duration::from_secs(6)).await;
        assert_eq!(f.reconnector.state().status, ReconnectStatus::RunningDiscovery);

        f.reconnector.stop_auto_reconnect();
        let stopped = f.reconnector.state();
        assert!(!stopped.is_reconnecting);
        assert_eq!(stopped.status, ReconnectStatus::Idle);
        assert!(!f.discovery.has_log_callback());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(f.reconnector.state(), stopped);
        assert_eq!(f.http.request_count(&format!("{NEW}/health")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_resets_attempts() {
        let f = fixture();
        f.network.set(NetworkStatus::offline());

        f.reconnector.start_auto_reconnect();
        sleep(Duration::from_secs(31)).await;
        assert_eq!(f.reconnector.state().attempts, 3);

        f.reconnector.stop_auto_reconnect();
        assert!(f.reconnector.start_auto_reconnect());
        sleep(Duration::from_millis(100)).await;
        assert_eq!(f.reconnector.state().attempts, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_start_and_stop_never_orphan_the_flag() {
        let f = fixture();
        f.network.set(NetworkStatus::offline());

        for _ in 0..200 {
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let starter = tokio::task::spawn_blocking({
                let reconnector = f.reconnector.clone();
                let barrier = barrier.clone();
                move || {
                    barrier.wait();
                    reconnector.start_auto_reconnect();
                }
            });
            let stopper = tokio::task::spawn_blocking({
                let reconnector = f.reconnector.clone();
                move || {
                    barrier.wait();
                    reconnector.stop_auto_reconnect();
                }
            });
            starter.await.unwrap();
            stopper.await.unwrap();

            // Either the stop won, or a live run owns the flag.
            if f.reconnector.is_running() {
                assert!(f.reconnector.state().is_reconnecting);
            } else {
                assert!(!f.reconnector.state().is_reconnecting);
            }
            f.reconnector.stop_auto_reconnect();
            assert!(!f.reconnector.is_running());
        }

        assert!(f.reconnector.start_auto_reconnect());
        f.reconnector.stop_auto_reconnect();
    }

    #[tokio::test]
    async fn test_stop_before_start_is_harmless() {
        let f = fixture();
        f.reconnector.stop_auto_reconnect();

        let state = f.reconnector.state();
        assert_eq!(state.status, ReconnectStatus::Idle);
        assert!(state.logs.is_empty());
    }
}
