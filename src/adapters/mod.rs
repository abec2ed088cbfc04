//! Concrete implementations of the collaborator traits.
//!
//! Production adapters live at this level; test doubles live in [`mock`].
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`SharedApiClient`] / [`ApiClientHandle`] - the process-wide API base URL
//! - [`FileKeyValueStore`] - JSON file settings store
//! - [`CandidateDiscovery`] - discovery over a configured address list
//! - [`WatchNetworkStatus`] - channel-backed network status provider
//! - [`DesktopNotificationSink`] / [`TracingNotificationSink`] - notification sinks
//! - [`SessionFlag`] - authenticated-session flag
//!
//! # Mock Implementations
//!
//! - [`mock::MockHttpClient`] - configurable, sequenced HTTP responses
//! - [`mock::MockDiscovery`] - scripted discovery results
//! - [`mock::InMemoryStore`] - in-memory key-value store
//! - [`mock::RecordingNotificationSink`] - captured snackbars

pub mod candidate_discovery;
pub mod desktop_notify;
pub mod file_store;
pub mod mock;
pub mod network_watch;
pub mod reqwest_http;
pub mod session;
pub mod shared_api;

pub use candidate_discovery::CandidateDiscovery;
pub use desktop_notify::{DesktopNotificationSink, TracingNotificationSink};
pub use file_store::FileKeyValueStore;
pub use network_watch::WatchNetworkStatus;
pub use reqwest_http::ReqwestHttpClient;
pub use session::SessionFlag;
pub use shared_api::{ApiClientHandle, SharedApiClient};
