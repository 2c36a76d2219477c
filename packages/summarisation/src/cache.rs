//! SQLite-backed summary cache.
//!
//! Caches serialized summary results keyed by a SHA-256 over the request
//! identity (approach, target, model, data fingerprint), so repeated runs
//! skip the model calls until the source data or model changes.

use std::path::Path;

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

use crate::error::CacheResult;

/// File-based cache of summary payloads.
pub struct SummaryCache {
    pool: SqlitePool,
}

impl SummaryCache {
    /// Open (or create) the cache at the given file path.
    pub async fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    /// Create an in-memory cache (for testing).
    pub async fn in_memory() -> CacheResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    async fn ensure_schema(&self) -> CacheResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summary_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Build a deterministic cache key from request identity fields.
    pub fn make_key(approach: &str, target_id: &str, model: &str, data_fingerprint: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{approach}|{target_id}|{model}|{data_fingerprint}").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Fetch a cached payload by key.
    ///
    /// Returns `None` on a miss or when the stored payload is not a JSON
    /// object (stale or corrupt rows are treated as misses).
    pub async fn get(&self, cache_key: &str) -> CacheResult<Option<Value>> {
        let row = sqlx::query("SELECT payload FROM summary_cache WHERE cache_key = ?")
            .bind(cache_key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.get(0);
        match serde_json::from_str::<Value>(&payload) {
            Ok(value @ Value::Object(_)) => Ok(Some(value)),
            _ => {
                debug!(cache_key, "discarding unreadable cache payload");
                Ok(None)
            }
        }
    }

    /// Insert or update a payload under a cache key.
    pub async fn set(&self, cache_key: &str, payload: &Value) -> CacheResult<()> {
        let encoded = serde_json::to_string(payload)?;
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO summary_cache (cache_key, payload, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                created_at = excluded.created_at
            "#,
        )
        .bind(cache_key)
        .bind(encoded)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Short fingerprint tied to the source file state, for cache invalidation.
///
/// Hashes the path plus file size and mtime; an unreadable file hashes the
/// path alone so the fingerprint stays stable instead of failing.
pub fn data_fingerprint(path: &Path) -> String {
    let (size, mtime) = std::fs::metadata(path)
        .map(|meta| {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            (meta.len(), mtime)
        })
        .unwrap_or((0, 0));

    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", path.display(), size, mtime).as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_roundtrip() {
        let cache = SummaryCache::in_memory().await.unwrap();
        let key = SummaryCache::make_key("approach_1", "R1", "model", "fp");

        assert!(cache.get(&key).await.unwrap().is_none());

        let payload = json!({"approach": "approach_1", "response_id": "R1"});
        cache.set(&key, &payload).await.unwrap();

        let fetched = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched, payload);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = SummaryCache::in_memory().await.unwrap();
        let key = SummaryCache::make_key("approach_2", "Q01", "model", "fp");

        cache.set(&key, &json!({"v": 1})).await.unwrap();
        cache.set(&key, &json!({"v": 2})).await.unwrap();

        let fetched = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched, json!({"v": 2}));
    }

    #[test]
    fn test_make_key_is_deterministic() {
        let a = SummaryCache::make_key("approach_1", "R1", "m", "fp");
        let b = SummaryCache::make_key("approach_1", "R1", "m", "fp");
        let c = SummaryCache::make_key("approach_1", "R2", "m", "fp");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_is_stable_for_missing_file() {
        let path = Path::new("/nonexistent/data.csv");
        assert_eq!(data_fingerprint(path), data_fingerprint(path));
        assert_eq!(data_fingerprint(path).len(), 16);
    }
}
