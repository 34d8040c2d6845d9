use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StoreBackend};
use crate::error::Result;
use crate::repositories::memory_store::MemoryStore;
use crate::repositories::redis_store::RedisStore;
use crate::repositories::store::SessionStore;
use crate::services::pipeline::CachePipeline;
use crate::services::portal::PortalClient;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The cache and liveness store.
    pub store: Arc<dyn SessionStore>,
    /// The shared client for authenticated portal reads.
    pub portal: PortalClient,
    /// The read-through cache in front of the portal.
    pub pipeline: CachePipeline,
    /// The application's configuration.
    pub config: Config,
    /// The time source for cache expiry.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match config.store_backend {
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.redis_url).await?;
                tracing::info!("✅ Redis Connection Manager initialized");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::info!("✅ In-memory store initialized (single instance only)");
                Arc::new(MemoryStore::new())
            }
        };

        Self::with_store(config, store, Arc::new(SystemClock))
    }

    /// Builds the state around an existing store and clock.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let portal = PortalClient::new(config)?;
        tracing::info!("✅ Portal client initialized for {}", config.portal_url);

        let pipeline = CachePipeline::new(
            Arc::clone(&store),
            portal.clone(),
            Arc::clone(&clock),
            config.utc_offset,
        );

        Ok(AppState {
            store,
            portal,
            pipeline,
            config: config.clone(),
            clock,
        })
    }
}
