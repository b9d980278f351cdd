//! # Storage Traits
//!
//! The device key-value store the Mirror collections live in. Each collection
//! is written and read as one whole blob under a fixed key, so the only
//! operations the domain needs are get and put of a string value, plus
//! listing what is stored.

use anyhow::Result;
use async_trait::async_trait;

/// Keys of the four persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Bills,
    Payments,
    Profile,
    Savings,
}

impl StorageKey {
    pub const ALL: [StorageKey; 4] = [
        StorageKey::Bills,
        StorageKey::Payments,
        StorageKey::Profile,
        StorageKey::Savings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::Bills => "mirror_bills",
            StorageKey::Payments => "mirror_payments",
            StorageKey::Profile => "mirror_profile",
            StorageKey::Savings => "mirror_savings",
        }
    }
}

/// Trait defining the interface for key-value storage operations
///
/// Implementations must make `put_value` replace the whole value for a key;
/// there are no partial or range writes.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Retrieve a value by its key, `None` when the key was never written
    async fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, overwriting any existing value for the same key
    async fn put_value(&self, key: &str, value: &str) -> Result<()>;

    /// List all keys currently stored
    async fn list_keys(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: KeyValueStorage + ?Sized> KeyValueStorage for std::sync::Arc<T> {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        (**self).get_value(key).await
    }

    async fn put_value(&self, key: &str, value: &str) -> Result<()> {
        (**self).put_value(key, value).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        (**self).list_keys().await
    }
}
