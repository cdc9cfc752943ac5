//! Known coordinate systems, keyed by code.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::geometry::projection::{get_proj_string, is_geographic_proj, parse_proj};
use crate::geometry::Bounds;

/// WGS84 geographic coordinates (degrees).
pub const WGS84: &str = "EPSG:4326";
/// Swiss CH1903+ / LV95 (meters).
pub const SWISS_LV95: &str = "EPSG:2056";
/// Swiss CH1903 / LV03 (meters).
pub const SWISS_LV03: &str = "EPSG:21781";
/// Sentinel for "no usable coordinate system".
pub const NONE: &str = "NONE";

const WGS84_PROJ: &str = "+proj=longlat +datum=WGS84 +no_defs";
const LV95_PROJ: &str = "+proj=somerc +lat_0=46.95240555555556 +lon_0=7.439583333333333 +k_0=1 +x_0=2600000 +y_0=1200000 +ellps=bessel +units=m +no_defs";
const LV03_PROJ: &str = "+proj=somerc +lat_0=46.95240555555556 +lon_0=7.439583333333333 +k_0=1 +x_0=600000 +y_0=200000 +ellps=bessel +units=m +no_defs";

/// A registered coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystemDefinition {
    pub code: String,
    pub proj_definition: String,
    pub bounds: Bounds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl CoordinateSystemDefinition {
    pub fn new(code: impl Into<String>, proj_definition: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            code: code.into(),
            proj_definition: proj_definition.into(),
            bounds,
            units: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Definition for an EPSG code from the bundled database.
    ///
    /// Geographic systems get the WGS84 range as bounds; projected ones get
    /// the whole plane since the database carries no extents.
    pub fn from_epsg(epsg: i32) -> Result<Self> {
        let code = format!("EPSG:{}", epsg);
        let proj = get_proj_string(epsg).ok_or_else(|| IngestError::InvalidDefinition {
            code: code.clone(),
            reason: "not in the crs-definitions database".to_string(),
        })?;
        let (bounds, units) = if is_geographic_proj(proj) {
            (Bounds::new(-180.0, -90.0, 180.0, 90.0), "degrees")
        } else {
            (
                Bounds::new(f64::MIN, f64::MIN, f64::MAX, f64::MAX),
                "m",
            )
        };
        Ok(Self::new(code, proj, bounds).with_units(units))
    }

    pub fn is_sentinel(&self) -> bool {
        self.code == NONE
    }

    pub fn is_geographic(&self) -> bool {
        is_geographic_proj(&self.proj_definition)
    }

    /// Check the definition is usable: parseable projection, sane bounds.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| IngestError::InvalidDefinition {
            code: self.code.clone(),
            reason,
        };
        if self.code.trim().is_empty() {
            return Err(invalid("empty code".to_string()));
        }
        parse_proj(&self.proj_definition).map_err(invalid)?;
        if !self.bounds.is_well_formed() {
            return Err(invalid(format!("malformed bounds {:?}", self.bounds)));
        }
        Ok(())
    }
}

/// The built-in systems seeded by `initialize()`, sentinel excluded.
pub fn builtin_definitions() -> Vec<CoordinateSystemDefinition> {
    vec![
        CoordinateSystemDefinition::new(WGS84, WGS84_PROJ, Bounds::new(-180.0, -90.0, 180.0, 90.0))
            .with_units("degrees"),
        CoordinateSystemDefinition::new(
            SWISS_LV95,
            LV95_PROJ,
            Bounds::new(2_485_000.0, 1_075_000.0, 2_835_000.0, 1_295_000.0),
        )
        .with_units("m"),
        CoordinateSystemDefinition::new(
            SWISS_LV03,
            LV03_PROJ,
            Bounds::new(485_000.0, 75_000.0, 835_000.0, 295_000.0),
        )
        .with_units("m"),
    ]
}

fn sentinel_definition() -> CoordinateSystemDefinition {
    CoordinateSystemDefinition::new(NONE, "", Bounds::empty())
}

/// In-memory table of coordinate systems.
#[derive(Debug, Default)]
pub struct CoordinateSystemRegistry {
    systems: AHashMap<String, Arc<CoordinateSystemDefinition>>,
}

impl CoordinateSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a definition, replacing any with the same code.
    ///
    /// Returns the replaced definition, if any.
    pub fn register(
        &mut self,
        def: CoordinateSystemDefinition,
    ) -> Result<Option<Arc<CoordinateSystemDefinition>>> {
        if def.is_sentinel() {
            return Err(IngestError::InvalidDefinition {
                code: def.code,
                reason: "reserved code".to_string(),
            });
        }
        def.validate()?;
        Ok(self.systems.insert(def.code.clone(), Arc::new(def)))
    }

    pub(crate) fn register_sentinel(&mut self) {
        self.systems
            .insert(NONE.to_string(), Arc::new(sentinel_definition()));
    }

    pub fn get(&self, code: &str) -> Option<Arc<CoordinateSystemDefinition>> {
        self.systems.get(code).cloned()
    }

    /// Lookup that fails with `UnknownSystem`.
    pub fn require(&self, code: &str) -> Result<Arc<CoordinateSystemDefinition>> {
        self.get(code).ok_or_else(|| IngestError::UnknownSystem {
            code: code.to_string(),
        })
    }

    pub fn contains(&self, code: &str) -> bool {
        self.systems.contains_key(code)
    }

    /// Registered codes, sorted.
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.systems.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn clear(&mut self) {
        self.systems.clear();
    }
}
