use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use serde::Serialize;

use crate::cache::CacheManager;
use crate::crs::detection::{suggest_coordinate_system, SystemSuggestion};
use crate::crs::registry::{
    builtin_definitions, CoordinateSystemDefinition, CoordinateSystemRegistry, SWISS_LV95, WGS84,
};
use crate::crs::transformer::{CoordinateTransformer, TransformerStats};
use crate::error::{IngestError, Result};
use crate::geojson::Geometry;
use crate::geometry::{Bounds, Point};

/// LV95 projection origin used by the start-up check.
pub const SANITY_SOURCE: Point = Point {
    x: 2_600_000.0,
    y: 1_200_000.0,
    z: None,
};

/// Where [`SANITY_SOURCE`] must land in WGS84.
pub const SANITY_EXPECTED: Point = Point {
    x: 7.43958,
    y: 46.95241,
    z: None,
};

/// Allowed deviation from [`SANITY_EXPECTED`], in degrees.
pub const SANITY_TOLERANCE: f64 = 1e-3;

/// Lifecycle of a [`CoordinateSystemManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    Ready,
}

enum Route {
    Identity,
    Unprojectable,
    Project(Arc<CoordinateTransformer>),
}

struct Inner {
    state: ManagerState,
    registry: CoordinateSystemRegistry,
    transformers: AHashMap<(String, String), Arc<CoordinateTransformer>>,
}

impl Inner {
    fn clear(&mut self) {
        self.state = ManagerState::Uninitialized;
        self.registry.clear();
        self.transformers.clear();
    }
}

/// Registry of known coordinate systems and the gateway for every transform.
///
/// Shared between processors behind an `Arc`. Transforms consult the
/// [`CacheManager`] before touching the projection engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use geoloader::{CacheManager, CoordinateSystemManager, Point, SWISS_LV95, WGS84};
///
/// # fn main() -> geoloader::Result<()> {
/// let manager = CoordinateSystemManager::new(Arc::new(CacheManager::default()));
/// manager.initialize()?;
///
/// let lonlat = manager.transform(Point::new(2_600_000.0, 1_200_000.0), SWISS_LV95, WGS84)?;
/// println!("{:.5}, {:.5}", lonlat.x, lonlat.y);
/// # Ok(())
/// # }
/// ```
pub struct CoordinateSystemManager {
    inner: RwLock<Inner>,
    builtins: Vec<CoordinateSystemDefinition>,
    cache: Arc<CacheManager>,
}

impl CoordinateSystemManager {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self::with_builtins(cache, builtin_definitions())
    }

    /// Manager seeded with custom built-ins instead of WGS84/LV95/LV03.
    ///
    /// The start-up check still needs `EPSG:2056` and `EPSG:4326`.
    pub fn with_builtins(cache: Arc<CacheManager>, builtins: Vec<CoordinateSystemDefinition>) -> Self {
        CoordinateSystemManager {
            inner: RwLock::new(Inner {
                state: ManagerState::Uninitialized,
                registry: CoordinateSystemRegistry::new(),
                transformers: AHashMap::new(),
            }),
            builtins,
            cache,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn state(&self) -> ManagerState {
        self.read().state
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == ManagerState::Ready
    }

    /// Register the built-in systems and run the start-up check.
    ///
    /// Does nothing when already initialized. On failure the manager is
    /// left uninitialized with an empty registry.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.write();
        if inner.state == ManagerState::Ready {
            return Ok(());
        }
        inner.state = ManagerState::Initializing;

        let seeded = self
            .builtins
            .iter()
            .try_for_each(|def| inner.registry.register(def.clone()).map(|_| ()));
        if let Err(e) = seeded.and_then(|()| sanity_check(&inner.registry)) {
            tracing::warn!(error = %e, "Coordinate system initialization failed");
            inner.clear();
            return Err(e);
        }

        inner.registry.register_sentinel();
        inner.state = ManagerState::Ready;
        tracing::info!(systems = inner.registry.len(), "Coordinate system manager ready");
        Ok(())
    }

    /// Forget every system, transformer and cached transform result.
    pub fn reset(&self) {
        self.write().clear();
        self.cache.clear_transformations();
        tracing::debug!("Coordinate system manager reset");
    }

    /// Add or replace a system. Allowed in any state.
    pub fn register_system(&self, def: CoordinateSystemDefinition) -> Result<()> {
        let code = def.code.clone();
        let mut inner = self.write();
        let replaced = inner.registry.register(def)?;
        inner
            .transformers
            .retain(|(from, to), _| *from != code && *to != code);
        drop(inner);

        if replaced.is_some() {
            self.cache.clear_transformations();
        }
        tracing::debug!(code = %code, replaced = replaced.is_some(), "Registered coordinate system");
        Ok(())
    }

    /// Register an EPSG code from the bundled database; returns its code.
    pub fn register_epsg(&self, epsg: i32) -> Result<String> {
        let def = CoordinateSystemDefinition::from_epsg(epsg)?;
        let code = def.code.clone();
        self.register_system(def)?;
        Ok(code)
    }

    pub fn get(&self, code: &str) -> Option<Arc<CoordinateSystemDefinition>> {
        self.read().registry.get(code)
    }

    pub fn codes(&self) -> Vec<String> {
        self.read().registry.codes()
    }

    fn route(&self, from: &str, to: &str) -> Result<Route> {
        {
            let inner = self.read();
            if inner.state != ManagerState::Ready {
                return Err(IngestError::NotInitialized);
            }
            let source = inner.registry.require(from)?;
            let target = inner.registry.require(to)?;
            if from == to {
                return Ok(Route::Identity);
            }
            if source.is_sentinel() || target.is_sentinel() {
                return Ok(Route::Unprojectable);
            }
            if let Some(t) = inner.transformers.get(&(from.to_string(), to.to_string())) {
                return Ok(Route::Project(Arc::clone(t)));
            }
        }

        let mut inner = self.write();
        if inner.state != ManagerState::Ready {
            return Err(IngestError::NotInitialized);
        }
        let key = (from.to_string(), to.to_string());
        if let Some(t) = inner.transformers.get(&key) {
            return Ok(Route::Project(Arc::clone(t)));
        }
        let source = inner.registry.require(from)?;
        let target = inner.registry.require(to)?;
        let transformer = Arc::new(CoordinateTransformer::new(&source, &target)?);
        inner.transformers.insert(key, Arc::clone(&transformer));
        tracing::debug!(from, to, "Built coordinate transformer");
        Ok(Route::Project(transformer))
    }

    /// Transform one point between two registered systems.
    pub fn transform(&self, point: Point, from: &str, to: &str) -> Result<Point> {
        let route = self.route(from, to)?;
        if !point.is_valid() {
            return Err(IngestError::InvalidCoordinate {
                point,
                reason: "coordinates must be finite".to_string(),
            });
        }

        match route {
            Route::Identity => Ok(point),
            Route::Unprojectable => Err(unprojectable(point, from, to)),
            Route::Project(transformer) => {
                if let Some(hit) = self.cache.get_cached_transformation(&point, from, to) {
                    return Ok(hit);
                }
                let result = transformer.transform(point)?;
                self.cache.cache_transformation(&point, from, to, result);
                Ok(result)
            }
        }
    }

    /// Transform a bounding box through its four corners.
    pub fn transform_bounds(&self, bounds: &Bounds, from: &str, to: &str) -> Result<Bounds> {
        let route = self.route(from, to)?;
        if !bounds.is_well_formed() {
            return Err(IngestError::InvalidCoordinate {
                point: Point::new(bounds.min_x, bounds.min_y),
                reason: "bounds must be finite and ordered".to_string(),
            });
        }

        match route {
            Route::Identity => Ok(*bounds),
            Route::Unprojectable => Err(unprojectable(Point::new(bounds.min_x, bounds.min_y), from, to)),
            Route::Project(transformer) => transformer.transform_bounds(bounds),
        }
    }

    /// Transform every position of a geometry; fails on the first bad one.
    pub fn transform_geometry(&self, geometry: &Geometry, from: &str, to: &str) -> Result<Geometry> {
        geometry.try_map_points(|p| self.transform(p, from, to))
    }

    /// Whether `point` lies inside the registered bounds of `code`.
    ///
    /// Unknown codes and non-finite points are simply outside.
    pub fn validate_bounds(&self, point: &Point, code: &str) -> bool {
        point.is_valid()
            && self
                .read()
                .registry
                .get(code)
                .is_some_and(|def| def.bounds.contains(point))
    }

    /// Guess the system of a point set; see [`suggest_coordinate_system`].
    pub fn suggest_coordinate_system(&self, points: &[Point]) -> SystemSuggestion {
        let suggestion = suggest_coordinate_system(points);
        if suggestion.is_none() {
            tracing::warn!(
                sampled = suggestion.sampled,
                diagnostics = ?suggestion.diagnostics,
                "Could not detect coordinate system"
            );
        } else {
            tracing::debug!(code = %suggestion.code, ratio = suggestion.ratio, "Detected coordinate system");
        }
        suggestion
    }

    /// Attempt counters of every transformer built so far.
    pub fn transformer_stats(&self) -> Vec<TransformerStats> {
        let mut stats: Vec<TransformerStats> = self
            .read()
            .transformers
            .values()
            .map(|t| t.stats())
            .collect();
        stats.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        stats
    }
}

fn unprojectable(point: Point, from: &str, to: &str) -> IngestError {
    IngestError::TransformationFailed {
        point,
        from: from.to_string(),
        to: to.to_string(),
        reason: "NONE has no projection".to_string(),
    }
}

fn sanity_check(registry: &CoordinateSystemRegistry) -> Result<()> {
    let source = registry.require(SWISS_LV95)?;
    let target = registry.require(WGS84)?;
    let transformer = CoordinateTransformer::new(&source, &target)?;
    let actual = transformer.transform(SANITY_SOURCE)?;
    let dx = (actual.x - SANITY_EXPECTED.x).abs();
    let dy = (actual.y - SANITY_EXPECTED.y).abs();
    if dx > SANITY_TOLERANCE || dy > SANITY_TOLERANCE {
        return Err(IngestError::SanityCheckFailed {
            expected: SANITY_EXPECTED,
            actual,
        });
    }
    Ok(())
}
