//! Persisted key/value store seam shared by every extension context.
//!
//! The backing capability has no transactional guarantees: writes are
//! last-write-wins and readers may observe stale values until their own next
//! read. Nothing here papers over that.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const KEY_POPUP_STATE: &str = "popupState";
pub const KEY_CLIENT_STATE: &str = "clientState";
pub const KEY_SESSION: &str = "session";
pub const KEY_OPTIONS: &str = "options";

/// Cache key for a field's positional locator, keyed by its generated
/// correlation id.
#[must_use]
pub fn field_path_key(element_id: &str) -> String {
    format!("fieldPath:{element_id}")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store_backend_failed:{message}")]
    Backend { message: String },
    #[error("store_decode_failed:{key}:{message}")]
    Decode { key: String, message: String },
    #[error("store_encode_failed:{key}:{message}")]
    Encode { key: String, message: String },
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub async fn load_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
{
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| StoreError::Decode {
            key: key.to_string(),
            message: error.to_string(),
        })
}

pub async fn save_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|error| StoreError::Encode {
        key: key.to_string(),
        message: error.to_string(),
    })?;
    store.set(key, raw).await
}

/// Operator-facing toggles persisted under [`KEY_OPTIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtensionOptions {
    pub autofill: AutofillOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofillOptions {
    pub button: bool,
    pub context_menu: bool,
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self {
            autofill: AutofillOptions {
                button: true,
                context_menu: true,
            },
        }
    }
}

impl ExtensionOptions {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        Ok(load_json(store, KEY_OPTIONS).await?.unwrap_or_default())
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        save_json(store, KEY_OPTIONS, self).await
    }
}

/// In-memory store with the same guarantees as the real capability:
/// last-write-wins, no locking across readers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }
}
