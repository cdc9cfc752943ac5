//! Cache statistics reporting.

use serde::Serialize;

/// Snapshot of both caches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    // Transformation cache
    pub transformation_cache_size: usize,
    pub transformation_capacity: usize,
    pub transformation_hits: u64,
    pub transformation_misses: u64,
    pub transformation_evictions: u64,
    pub transformation_expirations: u64,

    // Preview cache
    pub preview_cache_size: usize,
    pub preview_capacity: usize,
    pub preview_hits: u64,
    pub preview_misses: u64,
    pub preview_evictions: u64,
    pub preview_expirations: u64,
}

impl CacheStats {
    /// Transformation cache hit rate (0.0 to 1.0).
    pub fn transformation_hit_rate(&self) -> f64 {
        hit_rate(self.transformation_hits, self.transformation_misses)
    }

    /// Preview cache hit rate (0.0 to 1.0).
    pub fn preview_hit_rate(&self) -> f64 {
        hit_rate(self.preview_hits, self.preview_misses)
    }

    pub fn hit_rates(&self) -> HitRates {
        HitRates {
            transformation: self.transformation_hit_rate(),
            preview: self.preview_hit_rate(),
        }
    }
}

/// Hit rates per cache; 0 when a cache has not been accessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HitRates {
    pub transformation: f64,
    pub preview: f64,
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
