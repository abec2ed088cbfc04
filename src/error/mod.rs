//! Error types for the resilience layer.
//!
//! Failures inside the health monitor and reconnector never escape their
//! public scheduling methods; they become state. The typed errors here are
//! what crosses collaborator seams and what [`ConnectError`] reports to the
//! one caller that needs a synchronous answer.
//!
//! | Error | Produced by | Surfaced as |
//! |-------|-------------|-------------|
//! | [`DiscoveryError`] | discovery collaborator | "not found" / "server not configured" |
//! | [`HealthProbeError`] | one health probe | `HealthState.message`, fast retry if temporary |
//! | [`StoreError`] | key-value store | logged, recorded on `error` |
//! | [`ConnectError`] | `ConnectionCoordinator::connect` | returned to the caller |

mod connect;
mod discovery;
mod health;
mod store;

pub use connect::ConnectError;
pub use discovery::DiscoveryError;
pub use health::HealthProbeError;
pub use store::StoreError;
