//! Error types for the ingestion core.
//!
//! Structural errors (registry, initialization) always reach the caller.
//! Per-feature failures are recorded in processing statistics instead of
//! being returned, and cache problems never surface at all.

use thiserror::Error;

use crate::geometry::Point;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors produced by coordinate handling and stream processing.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A transform was requested before `initialize()` completed.
    #[error("coordinate system manager is not initialized")]
    NotInitialized,

    /// A coordinate system code is not registered.
    #[error("unknown coordinate system: {code}")]
    UnknownSystem { code: String },

    /// A coordinate system definition was rejected at registration.
    #[error("invalid definition for {code}: {reason}")]
    InvalidDefinition { code: String, reason: String },

    /// Input coordinates are NaN or infinite.
    #[error("invalid coordinate ({}, {}): {reason}", point.x, point.y)]
    InvalidCoordinate { point: Point, reason: String },

    /// The projection engine rejected the point or produced non-finite output.
    #[error("transformation {from} -> {to} failed for ({}, {}): {reason}", point.x, point.y)]
    TransformationFailed {
        point: Point,
        from: String,
        to: String,
        reason: String,
    },

    /// The built-in reference transform did not land where expected.
    #[error("sanity check failed: expected ({}, {}), got ({}, {})", expected.x, expected.y, actual.x, actual.y)]
    SanityCheckFailed { expected: Point, actual: Point },

    /// The estimated heap usage crossed the configured ceiling.
    #[error("memory limit exceeded: {used_bytes} bytes used, limit {limit_bytes} bytes")]
    MemoryLimitExceeded { used_bytes: usize, limit_bytes: usize },

    /// A chunk could not be parsed; aborts the whole run.
    #[error("chunk {chunk_index} could not be processed: {reason}")]
    ChunkProcessingFailed { chunk_index: usize, reason: String },

    /// A single feature could not be converted; recorded and skipped.
    #[error("feature conversion failed in chunk {chunk_index}: {reason}")]
    FeatureConversionFailed { chunk_index: usize, reason: String },

    /// No parser accepts the given file.
    #[error("unsupported file: {name}")]
    UnsupportedFile { name: String },

    /// Malformed geometry input (odd coordinate counts, short rings, bad shapefile values).
    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Whether processing may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::FeatureConversionFailed { .. }
                | IngestError::InvalidCoordinate { .. }
                | IngestError::TransformationFailed { .. }
        )
    }

    /// Whether this error aborts a `process()` call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::MemoryLimitExceeded { .. }
                | IngestError::ChunkProcessingFailed { .. }
                | IngestError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformation_failed_display() {
        let err = IngestError::TransformationFailed {
            point: Point::new(2600000.0, 1200000.0),
            from: "EPSG:2056".to_string(),
            to: "EPSG:4326".to_string(),
            reason: "out of domain".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("EPSG:2056 -> EPSG:4326"));
        assert!(msg.contains("2600000"));
        assert!(msg.contains("out of domain"));
    }

    #[test]
    fn test_memory_limit_display() {
        let err = IngestError::MemoryLimitExceeded {
            used_bytes: 2048,
            limit_bytes: 1024,
        };
        assert_eq!(
            err.to_string(),
            "memory limit exceeded: 2048 bytes used, limit 1024 bytes"
        );
    }

    #[test]
    fn test_classification() {
        let conversion = IngestError::FeatureConversionFailed {
            chunk_index: 3,
            reason: "NaN".to_string(),
        };
        assert!(conversion.is_recoverable());
        assert!(!conversion.is_fatal());

        let chunk = IngestError::ChunkProcessingFailed {
            chunk_index: 0,
            reason: "truncated".to_string(),
        };
        assert!(chunk.is_fatal());
        assert!(!IngestError::NotInitialized.is_fatal());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.dxf");
        let err: IngestError = io.into();
        assert!(matches!(err, IngestError::Io(_)));
        assert!(err.to_string().contains("missing.dxf"));
    }
}
