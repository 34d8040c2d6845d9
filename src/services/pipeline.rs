use chrono::FixedOffset;
use std::sync::Arc;

use crate::clock::{Clock, next_local_midnight};
use crate::error::{AppError, Result};
use crate::extractors::{ExtractError, PageExtractor, extract_page};
use crate::models::academic::ResourceQuery;
use crate::models::cache::CacheKey;
use crate::models::session::SessionContext;
use crate::repositories::store::SessionStore;
use crate::services::portal::PortalClient;

/// Where a resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// The value of the `X-Cache` response header.
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A record together with how it was obtained.
#[derive(Debug)]
pub struct Fetched<T> {
    pub record: T,
    pub status: CacheStatus,
}

/// Read-through cache in front of the portal's academic pages.
///
/// A record is cached per subject, page kind and period until the next local
/// midnight. Nothing is shared across subjects.
#[derive(Clone)]
pub struct CachePipeline {
    store: Arc<dyn SessionStore>,
    portal: PortalClient,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl CachePipeline {
    pub fn new(
        store: Arc<dyn SessionStore>,
        portal: PortalClient,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            portal,
            clock,
            offset,
        }
    }

    /// Returns the caller's record for `query`, from the cache if present.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The authenticated caller.
    /// * `extractor` - The extractor for the requested page kind.
    /// * `query` - The period (and week, for the logbook), already validated.
    ///
    /// # Returns
    ///
    /// A `Result` containing the record and whether it was a cache hit. A
    /// page carrying the expired-session marker evicts everything cached for
    /// the subject and fails with `AppError::Unauthorized`.
    pub async fn fetch_resource<E, Q>(
        &self,
        ctx: &SessionContext,
        extractor: &E,
        query: &Q,
    ) -> Result<Fetched<E::Record>>
    where
        E: PageExtractor,
        Q: ResourceQuery,
    {
        let kind = extractor.kind();
        let key = CacheKey::resource(&ctx.subject, kind, query);

        if let Some(cached) = self.store.get(&key).await? {
            match sonic_rs::from_str::<E::Record>(&cached) {
                Ok(record) => {
                    tracing::debug!("Cache hit: {}", key);
                    return Ok(Fetched {
                        record,
                        status: CacheStatus::Hit,
                    });
                }
                Err(e) => {
                    let err = AppError::Serialization(e.to_string());
                    tracing::warn!("Discarding unreadable cache entry {}: {}", key, err);
                }
            }
        }

        tracing::debug!("Cache miss: {}", key);

        let body = self
            .portal
            .fetch_page(kind.path(), &query.query(), &ctx.session_cookie)
            .await?;

        let record = match extract_page(extractor, &body) {
            Ok(record) => record,
            Err(ExtractError::Expired) => {
                tracing::info!("Portal session expired for subject {}", ctx.subject);
                match self.store.delete_subject(&ctx.subject).await {
                    Ok(removed) => tracing::debug!("Evicted {} entries for {}", removed, ctx.subject),
                    Err(e) => tracing::warn!("Eviction failed for {}: {}", ctx.subject, e),
                }
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        let expires_at = next_local_midnight(self.clock.now(), self.offset);
        match sonic_rs::to_string(&record) {
            Ok(encoded) => {
                if let Err(e) = self.store.set(&key, &encoded, expires_at).await {
                    tracing::warn!("Failed to cache {}: {}", key, e);
                }
            }
            Err(e) => {
                let err = AppError::Serialization(e.to_string());
                tracing::warn!("Not caching {}: {}", key, err);
            }
        }

        Ok(Fetched {
            record,
            status: CacheStatus::Miss,
        })
    }
}
