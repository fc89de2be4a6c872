use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CollectionKey, CollectionStore, StoreError, VersionedPayload};

#[derive(Default)]
pub struct InMemoryCollectionStore {
    entries: RwLock<HashMap<CollectionKey, (u64, String)>>,
    #[cfg(test)]
    forced_conflicts: RwLock<u32>,
}

impl InMemoryCollectionStore {
    /// Makes the next `count` compare-and-swap calls report a conflict.
    #[cfg(test)]
    pub(crate) async fn fail_next_swaps(&self, count: u32) {
        *self.forced_conflicts.write().await = count;
    }

    #[cfg(test)]
    async fn take_forced_conflict(&self) -> bool {
        let mut remaining = self.forced_conflicts.write().await;
        if *remaining == 0 {
            return false;
        }
        *remaining -= 1;
        true
    }
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn load(&self, key: CollectionKey) -> Result<VersionedPayload, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&key)
            .map(|(version, payload)| VersionedPayload {
                version: *version,
                payload: Some(payload.clone()),
            })
            .unwrap_or_default())
    }

    async fn save(&self, key: CollectionKey, payload: String) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_insert((0, String::new()));
        entry.0 += 1;
        entry.1 = payload;
        Ok(entry.0)
    }

    async fn compare_and_swap(
        &self,
        key: CollectionKey,
        expected_version: u64,
        payload: String,
    ) -> Result<bool, StoreError> {
        #[cfg(test)]
        let forced_conflict = self.take_forced_conflict().await;
        #[cfg(not(test))]
        let forced_conflict = false;
        if forced_conflict {
            return Ok(false);
        }

        let mut entries = self.entries.write().await;
        let current = entries.get(&key).map(|(version, _)| *version).unwrap_or(0);
        if current != expected_version {
            return Ok(false);
        }

        entries.insert(key, (current + 1, payload));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryCollectionStore;
    use crate::store::{CollectionKey, CollectionStore};

    #[tokio::test]
    async fn swap_against_stale_version_is_refused() {
        let store = InMemoryCollectionStore::default();
        assert!(store
            .compare_and_swap(CollectionKey::Notifications, 0, "[]".to_string())
            .await
            .expect("first swap"));

        let stale = store
            .compare_and_swap(CollectionKey::Notifications, 0, "[1]".to_string())
            .await
            .expect("stale swap");
        assert!(!stale);

        let stored = store.load(CollectionKey::Notifications).await.expect("load");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.payload.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn save_bumps_version_every_time() {
        let store = InMemoryCollectionStore::default();
        assert_eq!(store.save(CollectionKey::GuestRequests, "[]".into()).await, Ok(1));
        assert_eq!(store.save(CollectionKey::GuestRequests, "[]".into()).await, Ok(2));
    }
}
