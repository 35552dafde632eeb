//! Shared service state.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use vitrine_core::{Product, VitrineError};
use vitrine_storage::{
    CatalogQueryCache, InMemoryCatalog, InMemoryResultStore, LmdbResultStore, RecordSourceOracle,
    ResultStore,
};

use crate::config::{CacheBackendKind, ServiceConfig};
use crate::error::{ApiError, ApiResult};

/// Type alias for the query cache used by the service.
///
/// The result store is chosen at startup, so it is held as a trait object.
/// The oracle reads the catalog's own modification watermark.
pub type ApiCache = CatalogQueryCache<
    Product,
    dyn ResultStore,
    InMemoryCatalog,
    RecordSourceOracle<InMemoryCatalog, Product>,
>;

/// Process-wide state, built once at startup and shared behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Product collection; source of truth for reads and writes.
    pub catalog: Arc<InMemoryCatalog>,
    /// Result store behind the query cache.
    pub store: Arc<dyn ResultStore>,
    /// Watermark-checked listing cache.
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
    /// Periodic sweep of expired result store entries. Absent when the
    /// state was built outside a tokio runtime.
    purge: Option<PurgeHandle>,
}

#[derive(Clone)]
struct PurgeHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    task: Arc<JoinHandle<()>>,
}

impl AppState {
    /// Build state over an empty catalog.
    pub fn build(config: &ServiceConfig) -> ApiResult<Self> {
        Self::with_catalog(config, Arc::new(InMemoryCatalog::new()))
    }

    /// Build state over an existing catalog.
    pub fn with_catalog(config: &ServiceConfig, catalog: Arc<InMemoryCatalog>) -> ApiResult<Self> {
        config.validate()?;

        let store = open_store(config)?;
        let oracle = Arc::new(RecordSourceOracle::new(Arc::clone(&catalog)));
        let cache: Arc<ApiCache> = Arc::new(CatalogQueryCache::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            oracle,
            config.cache.clone(),
        ));

        let purge = spawn_purge(&store, config.cache.purge_interval);

        tracing::info!(
            cache_backend = config.cache_backend.as_str(),
            entry_ttl_secs = config.cache.entry_ttl.as_secs(),
            page_size = config.cache.page_size,
            purge_interval_secs = config.cache.purge_interval.as_secs(),
            "Service state initialized"
        );

        Ok(Self {
            catalog,
            store,
            cache,
            start_time: Instant::now(),
            purge,
        })
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether the expired-entry sweep is running.
    pub fn is_purging(&self) -> bool {
        self.purge
            .as_ref()
            .is_some_and(|purge| !purge.task.is_finished())
    }

    /// Stop the sweep and release the result store. The state must not be
    /// used afterwards.
    pub async fn shutdown(&self) -> ApiResult<()> {
        if let Some(purge) = &self.purge {
            let _ = purge.shutdown_tx.send(true);
        }
        self.store.close().await?;
        tracing::info!(
            uptime_secs = self.uptime().as_secs(),
            "Service state shut down"
        );
        Ok(())
    }
}

fn spawn_purge(store: &Arc<dyn ResultStore>, every: Duration) -> Option<PurgeHandle> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("No tokio runtime, expired cache entries are only dropped on read");
        return None;
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = runtime.spawn(purge_expired_task(Arc::downgrade(store), every, shutdown_rx));
    Some(PurgeHandle {
        shutdown_tx: Arc::new(shutdown_tx),
        task: Arc::new(task),
    })
}

/// Sweep expired entries every `every` until shutdown is signalled or the
/// store is dropped.
async fn purge_expired_task(
    store: Weak<dyn ResultStore>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Purged expired cache entries"),
                    Err(e) => tracing::warn!(error = %e, "Cache purge failed"),
                }
            }
        }
    }
    tracing::debug!("Cache purge task stopped");
}

fn open_store(config: &ServiceConfig) -> ApiResult<Arc<dyn ResultStore>> {
    match config.cache_backend {
        CacheBackendKind::Memory => Ok(Arc::new(InMemoryResultStore::new())),
        CacheBackendKind::Lmdb => {
            let path = config
                .cache_path
                .as_ref()
                .ok_or_else(|| ApiError::missing_field("VITRINE_CACHE_PATH"))?;
            std::fs::create_dir_all(path).map_err(|e| {
                ApiError::internal_error(format!(
                    "Failed to create cache directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let store = LmdbResultStore::open(path, config.cache_max_size_mb)
                .map_err(VitrineError::from)?;
            Ok(Arc::new(store))
        }
    }
}
