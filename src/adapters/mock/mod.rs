//! Mock implementations for testing.
//!
//! Test doubles for every collaborator seam, so the resilience components
//! can be exercised without a network, a LAN server or a file system.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable, sequenced responses
//! - [`MockDiscovery`] - discovery with scripted results and log lines
//! - [`InMemoryStore`] - in-memory key-value store
//! - [`RecordingNotificationSink`] - captures snackbars for assertions
//!
//! Network status and session state use the real
//! [`WatchNetworkStatus`](crate::adapters::WatchNetworkStatus) and
//! [`SessionFlag`](crate::adapters::SessionFlag), which are already
//! fully controllable.

pub mod discovery;
pub mod http;
pub mod notifications;
pub mod store;

pub use discovery::MockDiscovery;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use notifications::RecordingNotificationSink;
pub use store::InMemoryStore;
