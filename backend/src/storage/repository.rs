//! # Mirror Repository
//!
//! Serializes the four Mirror collections to JSON blobs in a key-value store.
//!
//! ## Blob Format
//!
//! ```json
//! {"schemaVersion": 1, "data": [ { "id": "...", "name": "Rent", ... } ]}
//! ```
//!
//! Blobs written before versioning was introduced are the bare `data` value
//! (an array, or the profile object). Both shapes load; saves always write
//! the versioned envelope.

use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::traits::{KeyValueStorage, StorageKey};
use shared::{Bill, BillPayment, SavingsGoal, UserProfile};

pub const SCHEMA_VERSION: u64 = 1;
const SCHEMA_VERSION_FIELD: &str = "schemaVersion";
const DATA_FIELD: &str = "data";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T> {
    schema_version: u64,
    data: &'a T,
}

#[derive(Clone)]
pub struct MirrorRepository<S: KeyValueStorage> {
    storage: S,
}

impl<S: KeyValueStorage> MirrorRepository<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Load and decode a collection, `None` when it was never written
    pub async fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        let raw = match self.storage.get_value(key.as_str()).await? {
            Some(raw) => raw,
            None => {
                debug!("No stored value for {}", key.as_str());
                return Ok(None);
            }
        };
        decode(key, &raw).map(Some)
    }

    /// Encode and persist a whole collection
    pub async fn save<T: Serialize>(&self, key: StorageKey, data: &T) -> Result<()> {
        let json = serde_json::to_string(&Envelope {
            schema_version: SCHEMA_VERSION,
            data,
        })
        .with_context(|| format!("serializing {}", key.as_str()))?;
        self.storage
            .put_value(key.as_str(), &json)
            .await
            .with_context(|| format!("persisting {}", key.as_str()))
    }

    /// Collections that currently have a stored blob
    pub async fn stored_collections(&self) -> Result<Vec<StorageKey>> {
        let keys = self.storage.list_keys().await?;
        Ok(StorageKey::ALL
            .into_iter()
            .filter(|key| keys.iter().any(|stored| stored == key.as_str()))
            .collect())
    }

    pub async fn load_bills(&self) -> Result<Option<Vec<Bill>>> {
        self.load(StorageKey::Bills).await
    }

    pub async fn save_bills(&self, bills: &[Bill]) -> Result<()> {
        self.save(StorageKey::Bills, &bills).await
    }

    pub async fn load_payments(&self) -> Result<Option<Vec<BillPayment>>> {
        self.load(StorageKey::Payments).await
    }

    pub async fn save_payments(&self, payments: &[BillPayment]) -> Result<()> {
        self.save(StorageKey::Payments, &payments).await
    }

    pub async fn load_profile(&self) -> Result<Option<UserProfile>> {
        self.load(StorageKey::Profile).await
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.save(StorageKey::Profile, profile).await
    }

    pub async fn load_savings(&self) -> Result<Option<Vec<SavingsGoal>>> {
        self.load(StorageKey::Savings).await
    }

    pub async fn save_savings(&self, goals: &[SavingsGoal]) -> Result<()> {
        self.save(StorageKey::Savings, &goals).await
    }
}

fn decode<T: DeserializeOwned>(key: StorageKey, raw: &str) -> Result<T> {
    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("parsing {} as JSON", key.as_str()))?;

    let data = match value {
        Value::Object(mut map) if map.contains_key(SCHEMA_VERSION_FIELD) => {
            let version = map
                .get(SCHEMA_VERSION_FIELD)
                .and_then(Value::as_u64)
                .with_context(|| format!("{} has a non-integer schema version", key.as_str()))?;
            if version > SCHEMA_VERSION {
                anyhow::bail!(
                    "{} was written with schema version {}, newest supported is {}",
                    key.as_str(),
                    version,
                    SCHEMA_VERSION
                );
            }
            map.remove(DATA_FIELD)
                .with_context(|| format!("{} envelope has no data", key.as_str()))?
        }
        legacy => legacy,
    };

    serde_json::from_value(data).with_context(|| format!("decoding {}", key.as_str()))
}
