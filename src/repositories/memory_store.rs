use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::models::cache::CacheKey;
use crate::models::session::SubjectKey;
use crate::repositories::store::{SessionStore, StoreError};

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// An in-process `SessionStore`.
///
/// Used by tests and by single-instance deployments without Redis. Entries
/// are unreadable from their expiry instant on, and expired entries are
/// swept on every write.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that reads time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        Ok(entries
            .get(key.as_str())
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            key.as_str().to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete_subject(&self, subject: &SubjectKey) -> Result<u64, StoreError> {
        let prefix = CacheKey::subject_prefix(subject);
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::clock::next_local_midnight;
    use crate::models::academic::AcademicPeriod;
    use crate::models::cache::ResourceKind;
    use chrono::{FixedOffset, TimeDelta, TimeZone};

    fn subject(raw: &str) -> SubjectKey {
        SubjectKey::parse(raw).unwrap()
    }

    fn key(raw: &str, kind: ResourceKind) -> CacheKey {
        CacheKey::resource(&subject(raw), kind, &AcademicPeriod { year: 2024, semester: 1 })
    }

    #[tokio::test]
    async fn test_round_trip_before_expiry() {
        let store = MemoryStore::new();
        let k = key("1234567", ResourceKind::Grades);
        let expires = Utc::now() + TimeDelta::hours(1);

        store.set(&k, r#"{"courses":[]}"#, expires).await.unwrap();

        assert_eq!(store.get(&k).await.unwrap().as_deref(), Some(r#"{"courses":[]}"#));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(&key("1", ResourceKind::Schedule)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_from_local_midnight() {
        let offset = FixedOffset::east_opt(7 * 3600).unwrap();
        // 15:20 local.
        let written_at = Utc.with_ymd_and_hms(2024, 9, 2, 8, 20, 0).unwrap();
        let clock = Arc::new(ManualClock::new(written_at));
        let store = MemoryStore::with_clock(clock.clone());
        let k = key("1234567", ResourceKind::Attendance);

        let midnight = next_local_midnight(written_at, offset);
        store.set(&k, "cached", midnight).await.unwrap();

        clock.set(midnight - TimeDelta::seconds(1));
        assert_eq!(store.get(&k).await.unwrap().as_deref(), Some("cached"));

        clock.set(midnight);
        assert!(store.get(&k).await.unwrap().is_none());

        clock.advance(TimeDelta::hours(5));
        assert!(store.get(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_subject_is_exact() {
        let store = MemoryStore::new();
        let expires = Utc::now() + TimeDelta::hours(1);

        store.set(&key("12", ResourceKind::Grades), "a", expires).await.unwrap();
        store.set(&key("12", ResourceKind::Schedule), "b", expires).await.unwrap();
        store.set(&CacheKey::liveness(&subject("12")), "true", expires).await.unwrap();
        store.set(&key("123", ResourceKind::Grades), "c", expires).await.unwrap();

        let removed = store.delete_subject(&subject("12")).await.unwrap();

        assert_eq!(removed, 3);
        assert!(store.get(&key("12", ResourceKind::Grades)).await.unwrap().is_none());
        assert!(store.get(&CacheKey::liveness(&subject("12"))).await.unwrap().is_none());
        assert_eq!(
            store.get(&key("123", ResourceKind::Grades)).await.unwrap().as_deref(),
            Some("c")
        );
    }
}
