//! Durable key-value storage seam.

use crate::error::StoreError;

/// Minimal string store. The resilience layer only persists the
/// connection mode through it.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
