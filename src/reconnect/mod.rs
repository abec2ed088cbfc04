//! Automatic reconnection.
//!
//! [`AutoReconnector`] runs the recovery cycle (network check, health
//! burst, rediscovery, verification) and publishes every step as a full
//! [`ReconnectState`] snapshot with a bounded, timestamped log feed.

mod auto;
mod state;

pub use auto::AutoReconnector;
pub use state::{
    transition, LogEntry, LogLevel, ReconnectEvent, ReconnectState, ReconnectStatus,
    DEFAULT_LOG_CAPACITY,
};
