//! Storage backend trait

use crate::error::StoreError;

/// String key/value persistence behind the identity store
///
/// Backends are shared process-wide and may be observed by several
/// activations at once; each call must go to the backing storage rather
/// than a cache so writes from elsewhere are seen.
pub trait KeyValueBackend: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any existing one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
