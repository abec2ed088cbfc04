//! Resilience layer configuration.
//!
//! All timing knobs for the health monitor, reconnector and coordinator
//! live here so tests can shrink them and deployments can tune them.

use std::time::Duration;

/// Configuration shared by the four resilience components.
///
/// Use the builder methods to customize individual values.
///
/// # Example
///
/// ```
/// use poslink::config::ResilienceConfig;
/// use std::time::Duration;
///
/// let config = ResilienceConfig::default()
///     .with_health_interval(Duration::from_secs(10))
///     .with_cycle_delay(Duration::from_secs(5));
/// assert_eq!(config.health_interval, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceConfig {
    /// Interval between scheduled health checks (default: 30s)
    pub health_interval: Duration,
    /// Per-request timeout for a health probe (default: 5s)
    pub request_timeout: Duration,
    /// Delays for the fast-retry ladder; the index is capped at the last entry
    pub fast_retry_delays: Vec<Duration>,
    /// How many fast retries may be scheduled before falling back to the interval
    pub max_fast_retries: u32,
    /// Health checks in the first burst of a reconnection cycle
    pub initial_burst: u32,
    /// Health checks in the post-discovery verification burst
    pub verify_burst: u32,
    /// Pause between health checks inside a burst
    pub burst_gap: Duration,
    /// Pause between failed reconnection cycles
    pub cycle_delay: Duration,
    /// Settle delay after Wi-Fi comes back before connecting
    pub wifi_settle_delay: Duration,
    /// Maximum number of entries kept in the reconnection log feed
    pub log_capacity: usize,
    /// Path of the health endpoint, relative to the server base URL
    pub health_path: String,
    /// Key under which the connection mode is persisted
    pub mode_storage_key: String,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5),
            fast_retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ],
            max_fast_retries: 3,
            initial_burst: 3,
            verify_burst: 1,
            burst_gap: Duration::from_secs(2),
            cycle_delay: Duration::from_secs(15),
            wifi_settle_delay: Duration::from_secs(1),
            log_capacity: 50,
            health_path: "/health".to_string(),
            mode_storage_key: "connection_mode".to_string(),
        }
    }
}

impl ResilienceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_fast_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.fast_retry_delays = delays;
        self
    }

    pub fn with_max_fast_retries(mut self, max: u32) -> Self {
        self.max_fast_retries = max;
        self
    }

    pub fn with_bursts(mut self, initial: u32, verify: u32) -> Self {
        self.initial_burst = initial;
        self.verify_burst = verify;
        self
    }

    pub fn with_burst_gap(mut self, gap: Duration) -> Self {
        self.burst_gap = gap;
        self
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    pub fn with_wifi_settle_delay(mut self, delay: Duration) -> Self {
        self.wifi_settle_delay = delay;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Delay before fast retry number `retry` (zero based).
    pub fn fast_retry_delay(&self, retry: u32) -> Duration {
        let last = self.fast_retry_delays.len().saturating_sub(1);
        let index = (retry as usize).min(last);
        self.fast_retry_delays
            .get(index)
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }

    /// Build the health URL for `base`, tolerating a trailing slash.
    pub fn health_url(&self, base: &str) -> String {
        join_path(base, &self.health_path)
    }

    /// Defaults with overrides from `POSLINK_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_secs("POSLINK_HEALTH_INTERVAL_SECS") {
            config.health_interval = secs;
        }
        if let Some(secs) = env_secs("POSLINK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = secs;
        }
        if let Some(secs) = env_secs("POSLINK_CYCLE_DELAY_SECS") {
            config.cycle_delay = secs;
        }
        if let Ok(path) = std::env::var("POSLINK_HEALTH_PATH") {
            if path.starts_with('/') {
                config.health_path = path;
            } else {
                tracing::warn!(path = %path, "Ignoring POSLINK_HEALTH_PATH without leading slash");
            }
        }

        config
    }
}

/// Join a base URL and an absolute path without doubling the slash.
pub fn join_path(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn env_secs(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid duration override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = ResilienceConfig::default();
        assert_eq!(config.health_interval, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_fast_retries, 3);
        assert_eq!(config.initial_burst, 3);
        assert_eq!(config.verify_burst, 1);
        assert_eq!(config.burst_gap, Duration::from_secs(2));
        assert_eq!(config.wifi_settle_delay, Duration::from_secs(1));
        assert_eq!(config.log_capacity, 50);
        assert_eq!(config.health_path, "/health");
    }

    #[test]
    fn test_fast_retry_delay_caps_at_table_end() {
        let config = ResilienceConfig::default();
        assert_eq!(config.fast_retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.fast_retry_delay(1), Duration::from_secs(2));
        assert_eq!(config.fast_retry_delay(3), Duration::from_secs(8));
        assert_eq!(config.fast_retry_delay(10), Duration::from_secs(8));

        let empty = config.with_fast_retry_delays(Vec::new());
        assert_eq!(empty.fast_retry_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_health_url_joins_cleanly() {
        let config = ResilienceConfig::default();
        assert_eq!(
            config.health_url("http://192.168.1.50:3737"),
            "http://192.168.1.50:3737/health"
        );
        assert_eq!(
            config.health_url("http://192.168.1.50:3737/"),
            "http://192.168.1.50:3737/health"
        );
        let audio = ResilienceConfig::default().with_health_path("/audio-orders/health");
        assert_eq!(
            audio.health_url("http://10.0.0.2:3737"),
            "http://10.0.0.2:3737/audio-orders/health"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("POSLINK_HEALTH_INTERVAL_SECS", "12");
        std::env::set_var("POSLINK_CYCLE_DELAY_SECS", "not-a-number");
        std::env::set_var("POSLINK_HEALTH_PATH", "/status/health");

        let config = ResilienceConfig::from_env();
        assert_eq!(config.health_interval, Duration::from_secs(12));
        assert_eq!(config.cycle_delay, Duration::from_secs(15));
        assert_eq!(config.health_path, "/status/health");

        std::env::remove_var("POSLINK_HEALTH_INTERVAL_SECS");
        std::env::remove_var("POSLINK_CYCLE_DELAY_SECS");
        std::env::remove_var("POSLINK_HEALTH_PATH");
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_relative_path() {
        std::env::set_var("POSLINK_HEALTH_PATH", "health");
        let config = ResilienceConfig::from_env();
        assert_eq!(config.health_path, "/health");
        std::env::remove_var("POSLINK_HEALTH_PATH");
    }
}
