//! Server health monitoring.
//!
//! [`HealthMonitor`] answers "is the server at the current address
//! responding correctly?" on a fixed schedule, with a short fast-retry
//! ladder for timeout-class failures, and publishes a tri-state
//! [`HealthState`].

mod monitor;
mod state;

pub use monitor::HealthMonitor;
pub use state::{is_healthy_response, probe_response, HealthState, HealthStatus};
