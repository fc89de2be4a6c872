use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::warn;

use hostdesk_core::store::{CollectionKey, CollectionStore, StoreError, VersionedPayload};

use crate::DbPool;

/// `CollectionStore` over the `collection_entry` table: one row per key, versioned.
#[derive(Clone)]
pub struct SqlCollectionStore {
    pool: DbPool,
}

impl SqlCollectionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn backend(key: CollectionKey, error: sqlx::Error) -> StoreError {
    warn!(
        event_name = "store.sqlite.query_failed",
        collection = key.as_str(),
        error = %error,
        "sqlite collection query failed"
    );
    StoreError::Backend(error.to_string())
}

fn stored_version(key: CollectionKey, version: i64) -> Result<u64, StoreError> {
    u64::try_from(version).map_err(|_| StoreError::Decode {
        key,
        message: format!("negative version {version}"),
    })
}

#[async_trait]
impl CollectionStore for SqlCollectionStore {
    async fn load(&self, key: CollectionKey) -> Result<VersionedPayload, StoreError> {
        let row = sqlx::query("SELECT payload, version FROM collection_entry WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| backend(key, error))?;

        let Some(row) = row else {
            return Ok(VersionedPayload::default());
        };
        let payload: String = row.try_get("payload").map_err(|error| backend(key, error))?;
        let version: i64 = row.try_get("version").map_err(|error| backend(key, error))?;

        Ok(VersionedPayload { version: stored_version(key, version)?, payload: Some(payload) })
    }

    async fn save(&self, key: CollectionKey, payload: String) -> Result<u64, StoreError> {
        let version: i64 = sqlx::query_scalar(
            "INSERT INTO collection_entry (key, payload, version, updated_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 version = collection_entry.version + 1,
                 updated_at = excluded.updated_at
             RETURNING version",
        )
        .bind(key.as_str())
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| backend(key, error))?;

        stored_version(key, version)
    }

    async fn compare_and_swap(
        &self,
        key: CollectionKey,
        expected_version: u64,
        payload: String,
    ) -> Result<bool, StoreError> {
        let updated_at = Utc::now().to_rfc3339();

        let result = if expected_version == 0 {
            sqlx::query(
                "INSERT INTO collection_entry (key, payload, version, updated_at)
                 VALUES (?, ?, 1, ?)
                 ON CONFLICT(key) DO NOTHING",
            )
            .bind(key.as_str())
            .bind(&payload)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
        } else {
            let expected = i64::try_from(expected_version).map_err(|_| {
                StoreError::Backend(format!(
                    "version {expected_version} exceeds the sqlite integer range"
                ))
            })?;
            sqlx::query(
                "UPDATE collection_entry
                 SET payload = ?, version = version + 1, updated_at = ?
                 WHERE key = ? AND version = ?",
            )
            .bind(&payload)
            .bind(&updated_at)
            .bind(key.as_str())
            .bind(expected)
            .execute(&self.pool)
            .await
        };

        let rows_affected = result.map_err(|error| backend(key, error))?.rows_affected();
        Ok(rows_affected == 1)
    }
}
