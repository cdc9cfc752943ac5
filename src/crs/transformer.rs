use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::crs::registry::CoordinateSystemDefinition;
use crate::error::{IngestError, Result};
use crate::geometry::projection::{project, Projection};
use crate::geometry::{Bounds, Point};

/// Coordinate transformer between two registered systems (proj4rs)
pub struct CoordinateTransformer {
    source_code: String,
    target_code: String,
    source: Projection,
    target: Projection,
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Attempt counters for one transformer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformerStats {
    pub source: String,
    pub target: String,
    pub attempts: u64,
    pub failures: u64,
}

impl CoordinateTransformer {
    /// Build a transformer from two definitions.
    ///
    /// The sentinel system has no projection and is rejected.
    pub fn new(source: &CoordinateSystemDefinition, target: &CoordinateSystemDefinition) -> Result<Self> {
        let build = |def: &CoordinateSystemDefinition| {
            if def.is_sentinel() {
                return Err(IngestError::InvalidDefinition {
                    code: def.code.clone(),
                    reason: "sentinel system cannot be projected".to_string(),
                });
            }
            Projection::from_proj_string(&def.proj_definition).map_err(|reason| {
                IngestError::InvalidDefinition {
                    code: def.code.clone(),
                    reason,
                }
            })
        };

        Ok(Self {
            source_code: source.code.clone(),
            target_code: target.code.clone(),
            source: build(source)?,
            target: build(target)?,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn target_code(&self) -> &str {
        &self.target_code
    }

    /// Transform a point from the source system to the target system.
    pub fn transform(&self, point: Point) -> Result<Point> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        let result = project(
            &self.source,
            &self.target,
            point.x,
            point.y,
            point.z.unwrap_or(0.0),
        );

        match result {
            Ok((x, y, z)) if x.is_finite() && y.is_finite() => {
                let mut out = Point::new(x, y);
                if point.z.is_some() {
                    out.z = Some(z);
                }
                Ok(out)
            }
            Ok((x, y, _)) => Err(self.failed(point, format!("non-finite result ({}, {})", x, y))),
            Err(reason) => Err(self.failed(point, reason)),
        }
    }

    /// Transform a bounding box by projecting its corners.
    ///
    /// Curved projections can bulge between corners; the result is the
    /// envelope of the four projected corners only.
    pub fn transform_bounds(&self, bounds: &Bounds) -> Result<Bounds> {
        let mut out = Bounds::empty();
        for corner in bounds.corners() {
            out.extend(&self.transform(corner)?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> TransformerStats {
        TransformerStats {
            source: self.source_code.clone(),
            target: self.target_code.clone(),
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn failed(&self, point: Point, reason: String) -> IngestError {
        self.failures.fetch_add(1, Ordering::Relaxed);
        IngestError::TransformationFailed {
            point,
            from: self.source_code.clone(),
            to: self.target_code.clone(),
            reason,
        }
    }
}
