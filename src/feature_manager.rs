//! Chunked storage for parsed features.
//!
//! Features are appended to an open chunk that is sealed once it holds
//! `chunk_size` features. Chunking never reorders or alters features; it
//! only bounds the size of each allocation and lets callers page through
//! large imports.
//!
//! Malformed features (no geometry, empty or non-finite coordinates) are
//! dropped instead of failing the batch. Every drop is counted and logged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{env_flag, env_parse, process_env};
use crate::geojson::Feature;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_MAX_MEMORY_MB: usize = 512;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Sizing and memory monitoring for a [`FeatureManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureManagerOptions {
    /// Features per sealed chunk (at least 1).
    pub chunk_size: usize,
    /// Ceiling for the estimated footprint.
    pub max_memory_mb: usize,
    /// Whether the ceiling is enforced.
    pub monitor_memory: bool,
}

impl Default for FeatureManagerOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            monitor_memory: true,
        }
    }
}

impl FeatureManagerOptions {
    /// Defaults overridden by `GEOLOADER_CHUNK_SIZE`,
    /// `GEOLOADER_MAX_MEMORY_MB` and `GEOLOADER_MONITOR_MEMORY`.
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_parse(&lookup, "GEOLOADER_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            max_memory_mb: env_parse(&lookup, "GEOLOADER_MAX_MEMORY_MB").unwrap_or(defaults.max_memory_mb),
            monitor_memory: env_flag(&lookup, "GEOLOADER_MONITOR_MEMORY").unwrap_or(defaults.monitor_memory),
        }
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.max_memory_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// Counters reported by [`FeatureManager::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureManagerStats {
    pub total_features: usize,
    /// Sealed chunks; the open chunk counts once `finalize` seals it.
    pub chunk_count: usize,
    /// Estimated footprint in MB.
    pub memory_usage: f64,
    pub dropped_features: usize,
}

#[derive(Debug)]
pub struct FeatureManager {
    options: FeatureManagerOptions,
    chunks: Vec<Vec<Feature>>,
    current: Vec<Feature>,
    total_features: usize,
    dropped_features: usize,
    estimated_bytes: usize,
}

impl Default for FeatureManager {
    fn default() -> Self {
        Self::new(FeatureManagerOptions::default())
    }
}

impl FeatureManager {
    pub fn new(mut options: FeatureManagerOptions) -> Self {
        options.chunk_size = options.chunk_size.max(1);
        FeatureManager {
            current: Vec::with_capacity(options.chunk_size.min(DEFAULT_CHUNK_SIZE)),
            options,
            chunks: Vec::new(),
            total_features: 0,
            dropped_features: 0,
            estimated_bytes: 0,
        }
    }

    pub fn options(&self) -> &FeatureManagerOptions {
        &self.options
    }

    /// Append a feature; returns false when it was dropped as malformed.
    pub fn add_feature(&mut self, feature: Feature) -> bool {
        if !feature.is_well_formed() {
            self.dropped_features += 1;
            tracing::debug!(
                id = ?feature.id,
                geometry = ?feature.geometry_type(),
                dropped = self.dropped_features,
                "Dropping malformed feature"
            );
            return false;
        }

        self.estimated_bytes += feature.estimated_size();
        self.current.push(feature);
        self.total_features += 1;

        if self.current.len() >= self.options.chunk_size {
            self.seal();
        }
        true
    }

    /// Append many features; returns how many were accepted.
    pub fn add_features<I: IntoIterator<Item = Feature>>(&mut self, features: I) -> usize {
        features
            .into_iter()
            .map(|f| self.add_feature(f))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Append a raw GeoJSON feature object.
    pub fn add_value(&mut self, value: Value) -> bool {
        match serde_json::from_value::<Feature>(value) {
            Ok(feature) => self.add_feature(feature),
            Err(e) => {
                self.dropped_features += 1;
                tracing::debug!(error = %e, dropped = self.dropped_features, "Dropping unparseable feature");
                false
            }
        }
    }

    fn seal(&mut self) {
        let chunk = std::mem::replace(
            &mut self.current,
            Vec::with_capacity(self.options.chunk_size.min(DEFAULT_CHUNK_SIZE)),
        );
        tracing::debug!(chunk = self.chunks.len(), features = chunk.len(), "Sealed feature chunk");
        self.chunks.push(chunk);
    }

    /// Every feature in insertion order: sealed chunks, then the open one.
    ///
    /// Each call starts a fresh traversal.
    pub fn get_features(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.chunks.iter().flatten().chain(self.current.iter())
    }

    /// A sealed chunk, or `None` for negative or out-of-range indices.
    pub fn get_chunk(&self, index: isize) -> Option<&[Feature]> {
        let index = usize::try_from(index).ok()?;
        self.chunks.get(index).map(Vec::as_slice)
    }

    /// Seal the open chunk if it holds anything.
    pub fn finalize(&mut self) {
        if !self.current.is_empty() {
            self.seal();
        }
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.current.clear();
        self.total_features = 0;
        self.dropped_features = 0;
        self.estimated_bytes = 0;
    }

    /// Drain every feature, in order.
    pub fn into_features(mut self) -> Vec<Feature> {
        let mut out = Vec::with_capacity(self.total_features);
        for chunk in self.chunks.drain(..) {
            out.extend(chunk);
        }
        out.append(&mut self.current);
        out
    }

    pub fn len(&self) -> usize {
        self.total_features
    }

    pub fn is_empty(&self) -> bool {
        self.total_features == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn dropped_features(&self) -> usize {
        self.dropped_features
    }

    pub fn memory_usage_bytes(&self) -> usize {
        self.estimated_bytes
    }

    pub fn memory_usage_mb(&self) -> f64 {
        self.estimated_bytes as f64 / BYTES_PER_MB as f64
    }

    /// True when monitoring is on and the estimate is over the ceiling.
    pub fn is_memory_exceeded(&self) -> bool {
        self.options.monitor_memory && self.estimated_bytes > self.options.memory_limit_bytes()
    }

    pub fn stats(&self) -> FeatureManagerStats {
        FeatureManagerStats {
            total_features: self.total_features,
            chunk_count: self.chunks.len(),
            memory_usage: self.memory_usage_mb(),
            dropped_features: self.dropped_features,
        }
    }
}
