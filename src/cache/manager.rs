use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::stats::{CacheStats, HitRates};
use crate::cache::timed::TimedCache;
use crate::config::{env_parse, process_env};
use crate::geojson::Feature;
use crate::geometry::{Bounds, Point};

pub const DEFAULT_TRANSFORMATION_CAPACITY: usize = 10_000;
pub const DEFAULT_PREVIEW_CAPACITY: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cache sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub transformation_capacity: usize,
    pub preview_capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            transformation_capacity: DEFAULT_TRANSFORMATION_CAPACITY,
            preview_capacity: DEFAULT_PREVIEW_CAPACITY,
            ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by `GEOLOADER_TRANSFORM_CACHE_CAPACITY`,
    /// `GEOLOADER_PREVIEW_CACHE_CAPACITY` and `GEOLOADER_CACHE_TTL_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            transformation_capacity: env_parse(&lookup, "GEOLOADER_TRANSFORM_CACHE_CAPACITY")
                .unwrap_or(defaults.transformation_capacity),
            preview_capacity: env_parse(&lookup, "GEOLOADER_PREVIEW_CACHE_CAPACITY")
                .unwrap_or(defaults.preview_capacity),
            ttl: env_parse(&lookup, "GEOLOADER_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
        }
    }
}

/// Memoized result of a bounded file preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub features: Vec<Feature>,
    pub bounds: Option<Bounds>,
    pub layers: Vec<String>,
    pub feature_count: usize,
    pub coordinate_system: String,
}

/// Exact fingerprint of a transform request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TransformKey {
    x: u64,
    y: u64,
    z: Option<u64>,
    from: String,
    to: String,
}

impl TransformKey {
    fn new(point: &Point, from: &str, to: &str) -> Self {
        TransformKey {
            x: point.x.to_bits(),
            y: point.y.to_bits(),
            z: point.z.map(f64::to_bits),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PreviewKey {
    file_id: String,
    options: String,
}

impl PreviewKey {
    /// `None` when the options cannot be serialized.
    fn new<O: Serialize + ?Sized>(file_id: &str, options: &O) -> Option<Self> {
        // Value maps are ordered, so the string is canonical.
        let options = match serde_json::to_value(options) {
            Ok(value) => value.to_string(),
            Err(e) => {
                tracing::debug!(file_id, error = %e, "Preview options are not serializable");
                return None;
            }
        };
        Some(PreviewKey {
            file_id: file_id.to_string(),
            options,
        })
    }
}

/// Shared store for transformed points and file previews.
///
/// Each cache sits behind its own mutex. Nothing here returns an error:
/// a poisoned lock or unserializable key is treated as a miss.
pub struct CacheManager {
    transformations: Mutex<TimedCache<TransformKey, Point>>,
    previews: Mutex<TimedCache<PreviewKey, Arc<PreviewResult>>>,
    config: CacheConfig,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        CacheManager {
            transformations: Mutex::new(TimedCache::new(
                config.transformation_capacity,
                config.ttl,
            )),
            previews: Mutex::new(TimedCache::new(config.preview_capacity, config.ttl)),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn transformations(&self) -> Option<MutexGuard<'_, TimedCache<TransformKey, Point>>> {
        match self.transformations.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::warn!("Transformation cache lock poisoned; treating as miss");
                None
            }
        }
    }

    fn previews(&self) -> Option<MutexGuard<'_, TimedCache<PreviewKey, Arc<PreviewResult>>>> {
        match self.previews.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::warn!("Preview cache lock poisoned; treating as miss");
                None
            }
        }
    }

    pub fn cache_transformation(&self, point: &Point, from: &str, to: &str, result: Point) {
        if let Some(mut cache) = self.transformations() {
            cache.insert(TransformKey::new(point, from, to), result);
        }
    }

    pub fn get_cached_transformation(&self, point: &Point, from: &str, to: &str) -> Option<Point> {
        self.transformations()?
            .get(&TransformKey::new(point, from, to))
    }

    pub fn cache_preview<O: Serialize + ?Sized>(
        &self,
        file_id: &str,
        options: &O,
        preview: Arc<PreviewResult>,
    ) {
        let Some(key) = PreviewKey::new(file_id, options) else {
            return;
        };
        if let Some(mut cache) = self.previews() {
            cache.insert(key, preview);
        }
    }

    pub fn get_cached_preview<O: Serialize + ?Sized>(
        &self,
        file_id: &str,
        options: &O,
    ) -> Option<Arc<PreviewResult>> {
        let mut cache = self.previews()?;
        match PreviewKey::new(file_id, options) {
            Some(key) => cache.get(&key),
            None => {
                cache.misses += 1;
                None
            }
        }
    }

    /// Sweep both caches for entries older than the TTL.
    pub fn clear_expired(&self) -> usize {
        let mut removed = 0;
        if let Some(mut cache) = self.transformations() {
            removed += cache.clear_expired();
        }
        if let Some(mut cache) = self.previews() {
            removed += cache.clear_expired();
        }
        if removed > 0 {
            tracing::debug!(removed, "Cleared expired cache entries");
        }
        removed
    }

    /// Drop every memoized transform; counters are kept.
    pub fn clear_transformations(&self) {
        if let Some(mut cache) = self.transformations() {
            let (hits, misses, evictions, expirations) =
                (cache.hits, cache.misses, cache.evictions, cache.expirations);
            cache.clear();
            cache.hits = hits;
            cache.misses = misses;
            cache.evictions = evictions;
            cache.expirations = expirations;
        }
    }

    /// Empty both caches and reset every counter.
    pub fn clear(&self) {
        // Both locks held together so no reader sees a half-cleared state.
        let transformations = self.transformations();
        let previews = self.previews();
        if let Some(mut cache) = transformations {
            cache.clear();
        }
        if let Some(mut cache) = previews {
            cache.clear();
        }
    }

    pub fn get_stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        if let Some(cache) = self.transformations() {
            stats.transformation_cache_size = cache.len();
            stats.transformation_capacity = cache.capacity();
            stats.transformation_hits = cache.hits;
            stats.transformation_misses = cache.misses;
            stats.transformation_evictions = cache.evictions;
            stats.transformation_expirations = cache.expirations;
        }
        if let Some(cache) = self.previews() {
            stats.preview_cache_size = cache.len();
            stats.preview_capacity = cache.capacity();
            stats.preview_hits = cache.hits;
            stats.preview_misses = cache.misses;
            stats.preview_evictions = cache.evictions;
            stats.preview_expirations = cache.expirations;
        }
        stats
    }

    pub fn get_hit_rates(&self) -> HitRates {
        self.get_stats().hit_rates()
    }
}
