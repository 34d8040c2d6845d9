use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::models::cache::CacheKey;
use crate::models::session::SubjectKey;
use crate::repositories::store::{SessionStore, StoreError};

/// How many keys a single SCAN step asks for.
const SCAN_BATCH: usize = 200;

/// A `SessionStore` backed by Redis.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own,
/// so each call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
}

impl RedisStore {
    /// Connects to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - The URL of the Redis server.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `RedisStore`.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self { redis })
    }
}

/// The `SCAN MATCH` glob covering every key of `subject` and nothing else.
///
/// Subject keys are alphanumeric, so the only metacharacter is the trailing `*`.
fn scan_pattern(subject: &SubjectKey) -> String {
    format!("{}*", CacheKey::subject_prefix(subject))
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key.as_str()).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("SET")
            .arg(key.as_str())
            .arg(value)
            .arg("EXAT")
            .arg(expires_at.timestamp())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_subject(&self, subject: &SubjectKey) -> Result<u64, StoreError> {
        let mut conn = self.redis.clone();
        let pattern = scan_pattern(subject);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::debug!("Deleted {} keys for subject {}", removed, subject);
        Ok(removed)
    }
}
