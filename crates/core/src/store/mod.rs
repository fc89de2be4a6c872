pub mod memory;

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::notification::NotificationEntry;
use crate::domain::order::LinkedOrder;
use crate::domain::request::GuestRequest;

pub use memory::InMemoryCollectionStore;

pub const DEFAULT_RETRY_LIMIT: u32 = 8;

/// Fixed keys of the shared persistence area. Other subsystems integrate through these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionKey {
    #[serde(rename = "guest-requests")]
    GuestRequests,
    #[serde(rename = "notifications")]
    Notifications,
    #[serde(rename = "coffee_orders")]
    CoffeeOrders,
    #[serde(rename = "laundry_requests")]
    LaundryRequests,
    #[serde(rename = "restaurant_orders")]
    RestaurantOrders,
}

impl CollectionKey {
    pub const ALL: [CollectionKey; 5] = [
        Self::GuestRequests,
        Self::Notifications,
        Self::CoffeeOrders,
        Self::LaundryRequests,
        Self::RestaurantOrders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GuestRequests => "guest-requests",
            Self::Notifications => "notifications",
            Self::CoffeeOrders => "coffee_orders",
            Self::LaundryRequests => "laundry_requests",
            Self::RestaurantOrders => "restaurant_orders",
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
            .ok_or_else(|| format!("unknown collection key `{value}`"))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    #[error("collection `{key}` holds undecodable data: {message}")]
    Decode { key: CollectionKey, message: String },
    #[error("collection `{key}` could not be encoded: {message}")]
    Encode { key: CollectionKey, message: String },
    #[error("collection `{key}` kept changing underneath after {attempts} attempts")]
    Contention { key: CollectionKey, attempts: u32 },
}

/// Raw value stored under a key. `version` is 0 while the key has never been written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionedPayload {
    pub version: u64,
    pub payload: Option<String>,
}

/// Whole-collection key-value backend. Values are JSON arrays; writers either overwrite
/// unconditionally or swap against the version they read.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn load(&self, key: CollectionKey) -> Result<VersionedPayload, StoreError>;

    /// Unconditional overwrite. Returns the new version.
    async fn save(&self, key: CollectionKey, payload: String) -> Result<u64, StoreError>;

    /// Writes only if the stored version still equals `expected_version`.
    async fn compare_and_swap(
        &self,
        key: CollectionKey,
        expected_version: u64,
        payload: String,
    ) -> Result<bool, StoreError>;
}

pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_id(&self) -> &str;
}

impl Record for GuestRequest {
    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Record for LinkedOrder {
    fn record_id(&self) -> &str {
        &self.id.0
    }
}

impl Record for NotificationEntry {
    fn record_id(&self) -> &str {
        self.id()
    }
}

/// Result of a `Collection::modify` transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change<R> {
    Commit(R),
    Discard(R),
}

/// Typed view over one key of a `CollectionStore`.
pub struct Collection<T> {
    store: Arc<dyn CollectionStore>,
    key: CollectionKey,
    retry_limit: u32,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key,
            retry_limit: self.retry_limit,
            _records: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Record,
{
    pub fn new(store: Arc<dyn CollectionStore>, key: CollectionKey) -> Self {
        Self { store, key, retry_limit: DEFAULT_RETRY_LIMIT, _records: PhantomData }
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn key(&self) -> CollectionKey {
        self.key
    }

    /// Current records, or an empty list when the key is missing, unreadable or corrupt.
    pub async fn load(&self) -> Vec<T> {
        let stored = match self.store.load(self.key).await {
            Ok(stored) => stored,
            Err(error) => {
                warn!(
                    event_name = "store.collection.load_failed",
                    collection = self.key.as_str(),
                    error = %error,
                    "collection load failed; treating as empty"
                );
                return Vec::new();
            }
        };

        match decode::<T>(self.key, stored.payload.as_deref()) {
            Ok(records) => records,
            Err(error) => {
                warn!(
                    event_name = "store.collection.decode_failed",
                    collection = self.key.as_str(),
                    error = %error,
                    "stored collection is corrupt; treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub async fn find(&self, id: &str) -> Option<T> {
        self.load().await.into_iter().find(|record| record.record_id() == id)
    }

    /// Overwrites the whole collection. Concurrent callers race; the later write wins.
    pub async fn save_all(&self, records: &[T]) -> Result<(), StoreError> {
        let payload = encode(self.key, records)?;
        self.store.save(self.key, payload).await?;
        Ok(())
    }

    /// Atomic read-modify-write. `transform` may run several times, each time on fresh data,
    /// until its write lands without interference or the retry limit is hit.
    ///
    /// Records the transform leaves unchanged are written back exactly as they were read.
    pub async fn modify<R, F>(&self, mut transform: F) -> Result<R, StoreError>
    where
        F: FnMut(&mut Vec<T>) -> Change<R> + Send,
        R: Send,
    {
        for attempt in 1..=self.retry_limit {
            let stored = self.store.load(self.key).await?;
            let raw = decode::<Value>(self.key, stored.payload.as_deref())?;
            let (mut records, mut originals) = decode_records::<T>(self.key, raw)?;

            let result = match transform(&mut records) {
                Change::Discard(result) => return Ok(result),
                Change::Commit(result) => result,
            };

            let payload = encode_preserving(self.key, &records, &mut originals)?;
            if self.store.compare_and_swap(self.key, stored.version, payload).await? {
                return Ok(result);
            }

            debug!(
                event_name = "store.collection.write_conflict",
                collection = self.key.as_str(),
                attempt,
                "collection changed during modify; retrying on fresh data"
            );
        }

        Err(StoreError::Contention { key: self.key, attempts: self.retry_limit })
    }

    pub async fn append(&self, record: T) -> Result<(), StoreError>
    where
        T: Clone,
    {
        self.modify(move |records| {
            records.push(record.clone());
            Change::Commit(())
        })
        .await
    }
}

fn decode<T: DeserializeOwned>(
    key: CollectionKey,
    payload: Option<&str>,
) -> Result<Vec<T>, StoreError> {
    match payload {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|error| StoreError::Decode { key, message: error.to_string() }),
    }
}

/// Stored JSON of each decoded record, paired with its re-encoded form, grouped by id.
type Originals = HashMap<String, Vec<(Value, Value)>>;

fn decode_records<T: Record>(
    key: CollectionKey,
    raw: Vec<Value>,
) -> Result<(Vec<T>, Originals), StoreError> {
    let mut records = Vec::with_capacity(raw.len());
    let mut originals = Originals::new();
    for stored in raw {
        let record: T = serde_json::from_value(stored.clone())
            .map_err(|error| StoreError::Decode { key, message: error.to_string() })?;
        let canonical = serde_json::to_value(&record)
            .map_err(|error| StoreError::Encode { key, message: error.to_string() })?;
        originals.entry(record.record_id().to_string()).or_default().push((canonical, stored));
        records.push(record);
    }
    Ok((records, originals))
}

fn encode_preserving<T: Record>(
    key: CollectionKey,
    records: &[T],
    originals: &mut Originals,
) -> Result<String, StoreError> {
    let mut values = Vec::with_capacity(records.len());
    for record in records {
        let encoded = serde_json::to_value(record)
            .map_err(|error| StoreError::Encode { key, message: error.to_string() })?;
        let original = originals.get_mut(record.record_id()).and_then(|candidates| {
            let position = candidates.iter().position(|(canonical, _)| *canonical == encoded)?;
            Some(candidates.swap_remove(position).1)
        });
        values.push(original.unwrap_or(encoded));
    }
    encode(key, &values)
}

fn encode<T: Serialize>(key: CollectionKey, records: &[T]) -> Result<String, StoreError> {
    serde_json::to_string(records)
        .map_err(|error| StoreError::Encode { key, message: error.to_string() })
}
