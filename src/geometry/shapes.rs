//! Builders that turn flat `[x0, y0, x1, y1, ...]` coordinate buffers into
//! GeoJSON geometries.
//!
//! Binary shapefile readers hand out coordinates in this layout, so chunk
//! parsers can convert records without building intermediate point lists.

use crate::error::{IngestError, Result};
use crate::geojson::{Geometry, Position};
use crate::geometry::validation::{self, ShapeType};

/// Envelope `[min_x, min_y, max_x, max_y]` of a flat coordinate buffer.
///
/// An empty buffer yields `[0, 0, 0, 0]`.
pub fn calculate_bounds(coordinates: &[f64]) -> Result<[f64; 4]> {
    let pairs = pairs(coordinates)?;

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for [x, y] in pairs {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if !min_x.is_finite() {
        return Ok([0.0; 4]);
    }
    Ok([min_x, min_y, max_x, max_y])
}

/// Ring orientation via the shoelace sum; true for clockwise rings.
pub fn is_clockwise(ring: &[f64]) -> Result<bool> {
    if ring.len() < 6 {
        return Err(IngestError::Geometry(
            "Ring must have at least 3 points".to_string(),
        ));
    }
    let points = pairs(ring)?;
    let sum: f64 = points
        .windows(2)
        .map(|w| (w[1][0] - w[0][0]) * (w[1][1] + w[0][1]))
        .sum();
    Ok(sum > 0.0)
}

pub fn convert_point(x: f64, y: f64) -> Geometry {
    Geometry::Point(vec![x, y])
}

pub fn convert_multi_point(coordinates: &[f64]) -> Result<Geometry> {
    Ok(Geometry::MultiPoint(positions(coordinates)?))
}

pub fn convert_polyline(coordinates: &[f64]) -> Result<Geometry> {
    Ok(Geometry::LineString(positions(coordinates)?))
}

/// Build a polygon or multipolygon from concatenated rings.
///
/// `ring_sizes` gives the point count of each ring. A clockwise ring opens
/// a new polygon (shapefile outer ring); counter-clockwise rings that
/// follow are its holes. One resulting polygon is returned as `Polygon`,
/// several as `MultiPolygon`.
pub fn convert_polygon(coordinates: &[f64], ring_sizes: &[usize]) -> Result<Geometry> {
    if coordinates.len() % 2 != 0 {
        return Err(odd_length());
    }

    let mut polygons: Vec<Vec<Vec<Position>>> = Vec::new();
    let mut current: Vec<Vec<Position>> = Vec::new();
    let mut offset = 0;

    for &size in ring_sizes {
        let end = offset + size * 2;
        let ring = coordinates.get(offset..end).ok_or_else(|| {
            IngestError::Geometry(format!(
                "ring of {} points overruns coordinate buffer of {} values",
                size,
                coordinates.len()
            ))
        })?;
        offset = end;

        if is_clockwise(ring)? && !current.is_empty() {
            polygons.push(std::mem::take(&mut current));
        }
        current.push(positions(ring)?);
    }

    if !current.is_empty() {
        polygons.push(current);
    }

    match polygons.len() {
        0 => Err(IngestError::Geometry("polygon has no rings".to_string())),
        1 => Ok(Geometry::Polygon(polygons.remove(0))),
        _ => Ok(Geometry::MultiPolygon(polygons)),
    }
}

/// Convert one shapefile record's coordinates by shape type.
///
/// Polygons are treated as a single ring here; multi-ring records go
/// through [`convert_polygon`] with their part sizes.
pub fn geometry_for_shape(shape_type: u32, coordinates: &[f64]) -> Result<Geometry> {
    if !validation::validate_shape_type(shape_type)? {
        return Err(IngestError::Geometry("Invalid or null shape type".to_string()));
    }

    match ShapeType::from_code(shape_type) {
        Some(ShapeType::Point) => match coordinates {
            [x, y] => Ok(convert_point(*x, *y)),
            _ => Err(IngestError::Geometry(
                "Point must have exactly 2 coordinates".to_string(),
            )),
        },
        Some(ShapeType::PolyLine) => convert_polyline(coordinates),
        Some(ShapeType::Polygon) => convert_polygon(coordinates, &[coordinates.len() / 2]),
        Some(ShapeType::MultiPoint) => convert_multi_point(coordinates),
        _ => Err(IngestError::Geometry(format!(
            "Unsupported shape type: {}",
            shape_type
        ))),
    }
}

fn pairs(coordinates: &[f64]) -> Result<Vec<[f64; 2]>> {
    if coordinates.len() % 2 != 0 {
        return Err(odd_length());
    }
    Ok(coordinates.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

fn positions(coordinates: &[f64]) -> Result<Vec<Position>> {
    Ok(pairs(coordinates)?.into_iter().map(|p| p.to_vec()).collect())
}

fn odd_length() -> IngestError {
    IngestError::Geometry("Coordinates array must have even length".to_string())
}
