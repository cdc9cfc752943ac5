//! Memoization of coordinate transforms and file previews.
//!
//! Two independent caches, each bounded by entry count and a time-to-live.
//! Eviction is by insertion order: lookups never refresh an entry.

mod manager;
mod stats;
mod timed;

pub use manager::{
    CacheConfig, CacheManager, PreviewResult, DEFAULT_PREVIEW_CAPACITY,
    DEFAULT_TRANSFORMATION_CAPACITY, DEFAULT_TTL,
};
pub use stats::{CacheStats, HitRates};
