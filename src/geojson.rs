//! Minimal GeoJSON model used for parsed features.
//!
//! Geometries serialize as `{"type": ..., "coordinates": ...}` and positions
//! are plain `[x, y]` / `[x, y, z]` arrays, matching RFC 7946.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::{Bounds, Point};

/// A GeoJSON position: `[x, y]` or `[x, y, z]`.
pub type Position = Vec<f64>;

/// GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Visit every position in document order.
    pub fn for_each_position<F: FnMut(&[f64])>(&self, mut f: F) {
        match self {
            Geometry::Point(p) => f(p.as_slice()),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => {
                ps.iter().for_each(|p| f(p.as_slice()))
            }
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => lines
                .iter()
                .flatten()
                .for_each(|p| f(p.as_slice())),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| f(p.as_slice())),
        }
    }

    /// Number of positions.
    pub fn position_count(&self) -> usize {
        let mut n = 0;
        self.for_each_position(|_| n += 1);
        n
    }

    /// All positions as points; malformed positions are skipped.
    pub fn points(&self) -> Vec<Point> {
        let mut out = Vec::new();
        self.for_each_position(|p| {
            if let Some(point) = Point::from_position(p) {
                out.push(point);
            }
        });
        out
    }

    /// True when the geometry has at least one position and every position
    /// has two or three finite components.
    pub fn is_well_formed(&self) -> bool {
        let mut count = 0usize;
        let mut valid = true;
        self.for_each_position(|p| {
            count += 1;
            valid &= (p.len() == 2 || p.len() == 3) && p.iter().all(|v| v.is_finite());
        });
        valid && count > 0
    }

    /// Envelope of all positions.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points())
    }

    /// Rebuild the geometry with every position passed through `f`.
    ///
    /// Stops at the first error.
    pub fn try_map_points<E, F>(&self, mut f: F) -> Result<Geometry, E>
    where
        F: FnMut(Point) -> Result<Point, E>,
        E: From<crate::IngestError>,
    {
        let mut map = |p: &Position| -> Result<Position, E> {
            let point = Point::from_position(p).ok_or_else(|| {
                E::from(crate::IngestError::Geometry(format!(
                    "position must have 2 or 3 components, got {}",
                    p.len()
                )))
            })?;
            Ok(f(point)?.to_position())
        };

        Ok(match self {
            Geometry::Point(p) => Geometry::Point(map(p)?),
            Geometry::MultiPoint(ps) => Geometry::MultiPoint(map_line(ps, &mut map)?),
            Geometry::LineString(ps) => Geometry::LineString(map_line(ps, &mut map)?),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(map_lines(lines, &mut map)?)
            }
            Geometry::Polygon(rings) => Geometry::Polygon(map_lines(rings, &mut map)?),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|rings| map_lines(rings, &mut map))
                    .collect::<Result<_, E>>()?,
            ),
        })
    }

    /// Rough heap footprint in bytes.
    pub fn estimated_size(&self) -> usize {
        let mut bytes = std::mem::size_of::<Geometry>();
        self.for_each_position(|p| {
            bytes += std::mem::size_of::<Position>() + p.len() * std::mem::size_of::<f64>();
        });
        bytes
    }
}

fn map_line<E>(
    line: &[Position],
    map: &mut impl FnMut(&Position) -> Result<Position, E>,
) -> Result<Vec<Position>, E> {
    line.iter().map(|p| map(p)).collect()
}

fn map_lines<E>(
    lines: &[Vec<Position>],
    map: &mut impl FnMut(&Position) -> Result<Position, E>,
) -> Result<Vec<Vec<Position>>, E> {
    lines.iter().map(|line| map_line(line, map)).collect()
}

/// A GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// The `layer` property, as DXF imports set it.
    pub fn layer(&self) -> Option<&str> {
        self.properties.get("layer").and_then(Value::as_str)
    }

    /// Geometry type name, if the feature has a geometry.
    pub fn geometry_type(&self) -> Option<&'static str> {
        self.geometry.as_ref().map(Geometry::type_name)
    }

    /// A feature is well formed when it has a well-formed geometry.
    pub fn is_well_formed(&self) -> bool {
        self.geometry.as_ref().is_some_and(Geometry::is_well_formed)
    }

    /// Rough heap footprint in bytes, used for memory accounting.
    pub fn estimated_size(&self) -> usize {
        let geometry = self.geometry.as_ref().map_or(0, Geometry::estimated_size);
        let properties: usize = self
            .properties
            .iter()
            .map(|(k, v)| k.len() + estimate_value(v))
            .sum();
        std::mem::size_of::<Feature>() + geometry + properties
    }
}

fn estimate_value(value: &Value) -> usize {
    let base = std::mem::size_of::<Value>();
    match value {
        Value::String(s) => base + s.len(),
        Value::Array(items) => base + items.iter().map(estimate_value).sum::<usize>(),
        Value::Object(map) => {
            base + map
                .iter()
                .map(|(k, v)| k.len() + estimate_value(v))
                .sum::<usize>()
        }
        _ => base,
    }
}

/// A GeoJSON feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Envelope of every feature geometry.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds = Bounds::empty();
        for geometry in self.features.iter().filter_map(|f| f.geometry.as_ref()) {
            if let Some(b) = geometry.bounds() {
                bounds.union(&b);
            }
        }
        (!bounds.is_empty()).then_some(bounds)
    }
}
