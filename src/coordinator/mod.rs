//! Connection coordination.
//!
//! [`ConnectionCoordinator`] owns the application's view of connectivity
//! ([`ConnectionState`]) and the persisted [`ConnectionMode`].

mod connection;
mod state;

pub use connection::ConnectionCoordinator;
pub use state::{ConnectionMode, ConnectionState};
