//! User notifications derived from reconnection progress.

mod bridge;

pub use bridge::{NotificationBridge, NotificationCategory};
