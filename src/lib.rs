//! # geoloader - Geospatial Ingestion Core
//!
//! Turns uploaded geodata files into coordinate-correct, memory-bounded
//! streams of GeoJSON features.
//!
//! ## Features
//!
//! - **Coordinate systems**: Registry seeded with WGS84, Swiss LV95 and LV03,
//!   extensible from the bundled EPSG database
//! - **Transforms**: Pure Rust proj4rs, memoized per exact input
//! - **Detection**: Heuristic guess of the source system from sample points
//! - **Caching**: Size- and TTL-bounded transform and preview caches with
//!   hit/miss accounting
//! - **Chunked storage**: Features kept in fixed-size chunks with memory
//!   estimates and a configurable ceiling
//! - **Streaming**: Cancellable, progress-reporting chunked processing with
//!   pluggable producers and parsers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use geoloader::{CacheManager, CoordinateSystemManager, Point, SWISS_LV95, WGS84};
//!
//! let cache = Arc::new(CacheManager::default());
//! let crs = CoordinateSystemManager::new(cache);
//! crs.initialize()?;
//!
//! let suggestion = crs.suggest_coordinate_system(&[Point::new(2600000.0, 1200000.0)]);
//! assert_eq!(suggestion.code, SWISS_LV95);
//!
//! let lonlat = crs.transform(Point::new(2600000.0, 1200000.0), SWISS_LV95, WGS84)?;
//! ```
//!
//! ## Architecture
//!
//! - [`crs`]: Coordinate system registry, transformer, detection and the
//!   [`CoordinateSystemManager`] facade
//! - [`cache`]: [`CacheManager`] for transforms and previews
//! - [`feature_manager`]: Chunked [`FeatureManager`]
//! - [`stream`]: [`StreamProcessor`] driver and its producer/parser traits
//! - [`geojson`]: GeoJSON feature model
//! - [`geometry`]: [`Point`], [`Bounds`], projections and shapefile geometry helpers
//! - [`error`]: [`IngestError`]

// ============================================================================
// Public modules
// ============================================================================

pub mod cache;
mod config;
pub mod crs;
pub mod error;
pub mod feature_manager;
pub mod geojson;
pub mod geometry;
pub mod stream;

// ============================================================================
// Errors
// ============================================================================

pub use error::{IngestError, Result};

// ============================================================================
// Coordinate Systems
// ============================================================================

pub use crs::{
    CoordinateSystemDefinition,
    CoordinateSystemManager,
    CoordinateSystemRegistry,
    CoordinateTransformer,
    ManagerState,
    SystemSuggestion,
    TransformerStats,
    NONE,
    SWISS_LV03,
    SWISS_LV95,
    WGS84,
};

// ============================================================================
// Caching
// ============================================================================

pub use cache::{
    CacheConfig,
    CacheManager,
    CacheStats,
    HitRates,
    PreviewResult,
};

// ============================================================================
// Feature Storage
// ============================================================================

pub use feature_manager::{
    FeatureManager,
    FeatureManagerOptions,
    FeatureManagerStats,
};

// ============================================================================
// Stream Processing
// ============================================================================

pub use stream::{
    ByteChunkProducer,
    CancelHandle,
    ChunkContext,
    ChunkParser,
    ChunkProducer,
    FileProcessor,
    FormatOptions,
    InputFile,
    LineChunkProducer,
    ProcessingContext,
    ProcessorOptions,
    ProcessorResult,
    RawChunk,
    StreamOutcome,
    StreamProcessor,
};

// ============================================================================
// Geometry & GeoJSON
// ============================================================================

pub use geojson::{Feature, FeatureCollection, Geometry};
pub use geometry::{Bounds, Point};
