//! Schema description caching
//!
//! Describing a namespace walks the whole catalog, so descriptions are kept
//! per namespace with a TTL. Validation verdicts never go through here.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{CatalogError, SchemaCatalog, SchemaDescription};

pub struct SchemaCache {
    catalog: Arc<dyn SchemaCatalog>,
    cache: Cache<String, Arc<SchemaDescription>>,
    hits: AtomicU64,
    misses: AtomicU64,
    ttl: Duration,
}

impl SchemaCache {
    pub fn new(catalog: Arc<dyn SchemaCatalog>) -> Self {
        Self::with_config(catalog, 256, Duration::from_secs(300))
    }

    pub fn with_config(catalog: Arc<dyn SchemaCatalog>, max_entries: u64, ttl: Duration) -> Self {
        Self {
            catalog,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            ttl,
        }
    }

    /// Cached description of `namespace`, loading it on a miss
    pub async fn describe(&self, namespace: &str) -> Result<Arc<SchemaDescription>, CatalogError> {
        let key = namespace.to_lowercase();

        if let Some(description) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(description);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let description =
            Arc::new(SchemaDescription::load(self.catalog.as_ref(), namespace).await?);
        self.cache.insert(key, description.clone()).await;
        Ok(description)
    }

    /// Drop the cached description of one namespace
    pub async fn invalidate(&self, namespace: &str) {
        self.cache.invalidate(&namespace.to_lowercase()).await;
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    pub entry_count: u64,
    pub ttl_secs: u64,
}
