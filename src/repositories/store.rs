use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::cache::CacheKey;
use crate::models::session::SubjectKey;

/// Errors raised by a session store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// A key-value store with per-entry absolute expiry.
///
/// Holds both serialized page records and liveness markers. Implementations
/// must be safe to share between concurrent requests.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads a value.
    ///
    /// Returns `Ok(None)` when the key is absent or expired. Any other failure
    /// is an error and must not be reported as a miss.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError>;

    /// Writes a value that stops being readable at `expires_at`.
    async fn set(
        &self,
        key: &CacheKey,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Deletes every key scoped to `subject`, returning how many were removed.
    async fn delete_subject(&self, subject: &SubjectKey) -> Result<u64, StoreError>;
}
