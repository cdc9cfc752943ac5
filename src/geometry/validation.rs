//! Structural checks for ESRI shapefile headers and records.
//!
//! Each check returns `IngestError::Geometry` with the offending values so a
//! chunk parser can surface it as a chunk failure.

use crate::error::{IngestError, Result};

pub const HEADER_LENGTH: usize = 100;
pub const FILE_CODE: i32 = 9994;
pub const VERSION: i32 = 1000;

const MAX_RECORD_CONTENT_LENGTH: i32 = 1_000_000;
const MAX_PARTS_OR_POINTS: i32 = 1_000_000;

/// Shape types defined by the shapefile format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
    MultiPatch,
}

impl ShapeType {
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            31 => ShapeType::MultiPatch,
            _ => return None,
        })
    }
}

fn invalid(msg: String) -> IngestError {
    IngestError::Geometry(msg)
}

pub fn validate_header_buffer(buffer_length: usize) -> Result<()> {
    if buffer_length < HEADER_LENGTH {
        return Err(invalid(format!(
            "Invalid shapefile: buffer too small for header (got {}, need {})",
            buffer_length, HEADER_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_file_code(file_code: i32) -> Result<()> {
    if file_code != FILE_CODE {
        return Err(invalid(format!(
            "Invalid shapefile: incorrect file code (got {}, expected {})",
            file_code, FILE_CODE
        )));
    }
    Ok(())
}

pub fn validate_file_length(file_length: usize, buffer_length: usize) -> Result<()> {
    if file_length < HEADER_LENGTH || file_length > buffer_length {
        return Err(invalid(format!(
            "Invalid shapefile: incorrect file length (got {}, buffer size {})",
            file_length, buffer_length
        )));
    }
    Ok(())
}

pub fn validate_version(version: i32) -> Result<()> {
    if version != VERSION {
        return Err(invalid(format!(
            "Invalid shapefile: unsupported version (got {}, expected {})",
            version, VERSION
        )));
    }
    Ok(())
}

pub fn validate_bounding_box(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<()> {
    if ![x_min, y_min, x_max, y_max].iter().all(|v| v.is_finite()) {
        return Err(invalid(format!(
            "Invalid shapefile: invalid bounding box coordinates ({}, {}, {}, {})",
            x_min, y_min, x_max, y_max
        )));
    }
    Ok(())
}

pub fn validate_record_content_length(content_length: i32, record_number: i32) -> Result<()> {
    if !(0..=MAX_RECORD_CONTENT_LENGTH).contains(&content_length) {
        return Err(invalid(format!(
            "Invalid shapefile: unreasonable record content length {} for record {}",
            content_length, record_number
        )));
    }
    Ok(())
}

pub fn validate_record_buffer_space(
    offset: usize,
    record_size: usize,
    buffer_length: usize,
    record_number: i32,
) -> Result<()> {
    if offset.saturating_add(record_size) > buffer_length {
        return Err(invalid(format!(
            "Invalid shapefile: truncated record content for record {} (need {} bytes, have {})",
            record_number,
            record_size,
            buffer_length.saturating_sub(offset)
        )));
    }
    Ok(())
}

pub fn validate_point_coordinates(x: f64, y: f64, part_index: i32, point_index: i32) -> Result<()> {
    if !x.is_finite() || !y.is_finite() {
        return Err(invalid(format!(
            "Invalid shapefile: non-finite coordinates ({}, {}) at part {}, point {}",
            x, y, part_index, point_index
        )));
    }
    Ok(())
}

pub fn validate_parts_and_points(num_parts: i32, num_points: i32, shape_type: &str) -> Result<()> {
    let plausible = |n: i32| n > 0 && n <= MAX_PARTS_OR_POINTS;
    if !plausible(num_parts) || !plausible(num_points) {
        return Err(invalid(format!(
            "Invalid {}: unreasonable number of parts ({}) or points ({})",
            shape_type, num_parts, num_points
        )));
    }
    Ok(())
}

pub fn validate_part_index(part_index: i32, num_points: i32) -> Result<()> {
    if part_index < 0 || part_index >= num_points {
        return Err(invalid(format!(
            "Invalid shapefile: part index {} out of bounds (num points: {})",
            part_index, num_points
        )));
    }
    Ok(())
}

pub fn validate_part_range(start: i32, end: i32, part_index: i32) -> Result<()> {
    if start >= end {
        return Err(invalid(format!(
            "Invalid shapefile: part {} has invalid range ({} >= {})",
            part_index, start, end
        )));
    }
    Ok(())
}

/// `Ok(false)` for the null shape, `Ok(true)` for processable types.
pub fn validate_shape_type(shape_type: u32) -> Result<bool> {
    match ShapeType::from_code(shape_type) {
        Some(ShapeType::Null) => Ok(false),
        Some(_) => Ok(true),
        None => Err(invalid(format!("Invalid shape type: {}", shape_type))),
    }
}
