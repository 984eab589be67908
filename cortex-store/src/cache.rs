//! Cache table — opaque hashed-key blob cache with optional expiry
//! (spec §6).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::connection::Store;

/// An opaque cached value, keyed by a hashed string key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Hash of the logical key (see [`hash_key`]).
    pub cache_key: String,
    /// Grouping label for cache invalidation by category.
    pub category: String,
    /// Opaque payload.
    pub value: Vec<u8>,
    /// Optional expiry; `None` means the entry never expires on its own.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Hash an arbitrary logical key into the `cache_key` primary key.
pub fn hash_key(logical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(logical_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Store {
    /// Insert or replace a cache entry.
    pub fn put_cache(&self, entry: &CacheEntry) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cache (cache_key, category, value, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cache_key) DO UPDATE SET
                category = excluded.category,
                value = excluded.value,
                expires_at = excluded.expires_at;",
            params![
                entry.cache_key,
                entry.category,
                entry.value,
                entry.expires_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("put cache: {e}")))?;
        Ok(())
    }

    /// Fetch a cache entry by its hashed key. Returns `None` for a
    /// missing key or one whose `expires_at` has passed (an expired row
    /// is not implicitly deleted here; call [`Self::evict_expired`]
    /// periodically).
    pub fn get_cache(&self, cache_key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let conn = self.lock()?;
        let entry: Option<CacheEntry> = conn
            .query_row(
                "SELECT cache_key, category, value, expires_at FROM cache WHERE cache_key = ?1;",
                params![cache_key],
                row_to_cache,
            )
            .optional()
            .map_err(|e| StorageError::Other(Box::new(e)))?;

        Ok(entry.filter(|e| match e.expires_at {
            Some(exp) => exp > Utc::now(),
            None => true,
        }))
    }

    /// Delete all expired rows. Returns the number removed.
    pub fn evict_expired(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at <= ?1;",
                params![Utc::now().to_rfc3339()],
            )
            .map_err(|e| StorageError::WriteFailed(format!("evict expired cache: {e}")))?;
        Ok(deleted)
    }
}

fn row_to_cache(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let expires_at: Option<String> = row.get(3)?;
    Ok(CacheEntry {
        cache_key: row.get(0)?,
        category: row.get(1)?,
        value: row.get(2)?,
        expires_at: expires_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn hash_key_is_deterministic() {
        assert_eq!(hash_key("abc"), hash_key("abc"));
        assert_ne!(hash_key("abc"), hash_key("abd"));
    }

    #[test]
    fn put_and_get_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let entry = CacheEntry {
            cache_key: hash_key("plan:turn-1"),
            category: "plan".into(),
            value: b"cached plan".to_vec(),
            expires_at: None,
        };
        store.put_cache(&entry).unwrap();
        let fetched = store.get_cache(&entry.cache_key).unwrap().unwrap();
        assert_eq!(fetched.value, entry.value);
    }

    #[test]
    fn expired_entry_is_hidden() {
        let store = Store::open_in_memory().unwrap();
        let key = hash_key("stale");
        store
            .put_cache(&CacheEntry {
                cache_key: key.clone(),
                category: "misc".into(),
                value: vec![1, 2, 3],
                expires_at: Some(Utc::now() - Duration::seconds(10)),
            })
            .unwrap();
        assert!(store.get_cache(&key).unwrap().is_none());
    }

    #[test]
    fn evict_expired_removes_only_expired() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_cache(&CacheEntry {
                cache_key: hash_key("stale"),
                category: "misc".into(),
                value: vec![],
                expires_at: Some(Utc::now() - Duration::seconds(10)),
            })
            .unwrap();
        store
            .put_cache(&CacheEntry {
                cache_key: hash_key("fresh"),
                category: "misc".into(),
                value: vec![],
                expires_at: Some(Utc::now() + Duration::seconds(3600)),
            })
            .unwrap();

        let evicted = store.evict_expired().unwrap();
        assert_eq!(evicted, 1);
        assert!(store.get_cache(&hash_key("fresh")).unwrap().is_some());
    }
}
