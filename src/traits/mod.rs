//! Trait abstractions for the collaborators the resilience layer consumes.
//!
//! Every external concern is reached through one of these narrow seams so
//! the core components can be constructed in isolation and driven by the
//! mocks in [`crate::adapters::mock`].
//!
//! # Traits
//!
//! - [`HttpClient`] - outbound HTTP (health probes)
//! - [`Discovery`] - locating the LAN server and remembering its address
//! - [`NetworkStatusProvider`] - device link state (Wi-Fi / wired / cellular)
//! - [`ApiClientReinitializer`] - re-points the shared API client
//! - [`KeyValueStore`] - durable storage for the connection mode
//! - [`NotificationSink`] - transient user notifications
//! - [`SessionStore`] - whether a user is signed in

pub mod api_client;
pub mod discovery;
pub mod http;
pub mod network;
pub mod notification;
pub mod session;
pub mod store;

pub use api_client::ApiClientReinitializer;
pub use discovery::{Discovery, DiscoveryLogCallback};
pub use http::{Headers, HttpClient, HttpError, Response};
pub use network::{NetworkStatus, NetworkStatusProvider, Transport};
pub use notification::{NotificationSink, Snackbar, SnackbarKind};
pub use session::SessionStore;
pub use store::KeyValueStore;
