use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::state::{probe_response, HealthState, HealthStatus};
use crate::config::{join_path, ResilienceConfig};
use crate::error::HealthProbeError;
use crate::sync::lock;
use crate::traits::{Discovery, Headers, HttpClient};

struct Inner {
    discovery: Arc<dyn Discovery>,
    http: Arc<dyn HttpClient>,
    config: ResilienceConfig,
    state_tx: watch::Sender<HealthState>,
    recovered_tx: broadcast::Sender<()>,
    /// Held while a probe is outstanding; released even when the probe
    /// future is dropped mid-flight
    is_checking: AsyncMutex<()>,
    /// Fast retries scheduled since the last success
    retry_count: AtomicU32,
    /// Fixed-interval schedule
    schedule: Mutex<Option<JoinHandle<()>>>,
    /// Pending fast retry, tagged so the retry task can clear only itself
    fast_retry: Mutex<Option<(u64, JoinHandle<()>)>>,
    fast_retry_seq: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let schedule = self.schedule.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = schedule.take() {
            handle.abort();
        }
        let fast_retry = self.fast_retry.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, handle)) = fast_retry.take() {
            handle.abort();
        }
    }
}

/// Periodic health checker for the active server.
///
/// Cheap to clone; all clones share one schedule and one published state.
/// Timer tasks only hold weak references, so dropping the last clone
/// tears everything down.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

impl HealthMonitor {
    pub fn new(
        discovery: Arc<dyn Discovery>,
        http: Arc<dyn HttpClient>,
        config: ResilienceConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(HealthState::checking());
        let (recovered_tx, _) = broadcast::channel(8);

        Self {
            inner: Arc::new(Inner {
                discovery,
                http,
                config,
                state_tx,
                recovered_tx,
                is_checking: AsyncMutex::new(()),
                retry_count: AtomicU32::new(0),
                schedule: Mutex::new(None),
                fast_retry: Mutex::new(None),
                fast_retry_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Start (or restart) the schedule: an immediate check, then one per
    /// `health_interval`. Any previous schedule and pending fast retry are
    /// cancelled first, so repeated calls never stack timers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_monitoring(&self) {
        let mut schedule = lock(&self.inner.schedule);
        if let Some(previous) = schedule.take() {
            previous.abort();
        }
        self.cancel_fast_retry();
        self.inner.retry_count.store(0, Ordering::SeqCst);

        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.health_interval;
        *schedule = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                HealthMonitor { inner }.check_health().await;
            }
        }));

        info!(interval = ?period, "Health monitoring started");
    }

    /// Cancel the schedule and any pending fast retry. Safe to call at any
    /// time, including before the first `start_monitoring`.
    pub fn stop_monitoring(&self) {
        let was_running = match lock(&self.inner.schedule).take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };
        self.cancel_fast_retry();
        if was_running {
            info!("Health monitoring stopped");
        }
    }

    /// Whether the fixed-interval schedule is active.
    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.schedule)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start monitoring unless it is already running.
    pub fn ensure_monitoring(&self) {
        if !self.is_monitoring() {
            self.start_monitoring();
        }
    }

    /// Probe the active server and publish the outcome.
    ///
    /// Overlapping calls do not issue a second request; they return the
    /// last known availability instead.
    pub async fn check_health(&self) -> bool {
        let Ok(_guard) = self.inner.is_checking.try_lock() else {
            debug!("Health check already in flight, returning last known availability");
            return self.inner.state_tx.borrow().is_available;
        };
        self.run_check().await
    }

    /// Caller must hold `is_checking`.
    async fn run_check(&self) -> bool {
        let url = match self.inner.discovery.api_url() {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "No server address to check");
                self.publish(HealthState::not_configured());
                return false;
            }
        };

        match self.probe(&url, &self.inner.config.health_path).await {
            Ok(()) => {
                self.inner.retry_count.store(0, Ordering::SeqCst);
                self.publish(HealthState::ok());
                true
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                self.publish(HealthState::error(e.to_string()));
                if e.is_temporary() {
                    self.schedule_fast_retry();
                }
                false
            }
        }
    }

    /// Reset the retry ladder and check now. The resulting state is
    /// re-announced to subscribers even when it did not change.
    ///
    /// Unlike [`check_health`](Self::check_health) this never answers from
    /// the last known state: if a check is already running it waits for it
    /// to finish and then issues its own.
    pub async fn force_check(&self) -> bool {
        let _guard = self.inner.is_checking.lock().await;
        self.inner.retry_count.store(0, Ordering::SeqCst);
        let available = self.run_check().await;
        self.inner.state_tx.send_modify(|_| {});
        available
    }

    /// Probe a candidate address without touching this monitor's state.
    pub async fn check_health_with_url(&self, url: &str) -> bool {
        self.check_health_with_url_at(url, &self.inner.config.health_path)
            .await
    }

    /// Like [`check_health_with_url`](Self::check_health_with_url) against
    /// a module-specific endpoint such as `/audio-orders/health`.
    pub async fn check_health_with_url_at(&self, url: &str, path: &str) -> bool {
        match self.probe(url, path).await {
            Ok(()) => true,
            Err(e) => {
                debug!(url = %url, path, error = %e, "Candidate health check failed");
                false
            }
        }
    }

    /// Current health snapshot.
    pub fn state(&self) -> HealthState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to health state; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.inner.state_tx.subscribe()
    }

    /// Fires once per transition from unavailable to available.
    pub fn subscribe_recovered(&self) -> broadcast::Receiver<()> {
        self.inner.recovered_tx.subscribe()
    }

    /// Fast retries scheduled since the last success.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    async fn probe(&self, base: &str, path: &str) -> Result<(), HealthProbeError> {
        let url = join_path(base, path);
        let response = self
            .inner
            .http
            .get_with_timeout(&url, &Headers::new(), self.inner.config.request_timeout)
            .await?;
        probe_response(&response)
    }

    fn publish(&self, next: HealthState) {
        let mut recovered = false;
        self.inner.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            recovered = current.status == HealthStatus::Error && next.is_available;
            *current = next;
            true
        });

        if recovered {
            info!("Server recovered");
            let _ = self.inner.recovered_tx.send(());
        }
    }

    /// Fast retries only run alongside the schedule; a stopped monitor
    /// leaves no timers behind.
    fn schedule_fast_retry(&self) {
        if !self.is_monitoring() {
            return;
        }

        let retry = self.inner.retry_count.load(Ordering::SeqCst);
        if retry >= self.inner.config.max_fast_retries {
            debug!("Fast retries exhausted, waiting for the next interval");
            return;
        }
        self.inner.retry_count.store(retry + 1, Ordering::SeqCst);

        let delay = self.inner.config.fast_retry_delay(retry);
        let id = self.inner.fast_retry_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut slot = lock(&inner.fast_retry);
                if slot.as_ref().is_some_and(|(slot_id, _)| *slot_id == id) {
                    slot.take();
                }
            }
            HealthMonitor { inner }.check_health().await;
        });

        if let Some((_, previous)) = lock(&self.inner.fast_retry).replace((id, handle)) {
            previous.abort();
        }
        info!(retry = retry + 1, delay = ?delay, "Scheduled fast health retry");
    }

    fn cancel_fast_retry(&self) {
        if let Some((_, handle)) = lock(&self.inner.fast_retry).take() {
            handle.abort();
        }
    }
}
