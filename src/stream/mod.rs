//! Chunked, cancellable file processing.
//!
//! A [`StreamProcessor`] pairs a [`ChunkProducer`], which cuts a file into
//! raw chunks, with a [`ChunkParser`], which turns each chunk into GeoJSON
//! features. The processor detects or takes the source coordinate system,
//! transforms features into the target system through the shared
//! [`CoordinateSystemManager`](crate::CoordinateSystemManager), stores them
//! in a [`FeatureManager`](crate::FeatureManager) and reports progress.

mod context;
mod options;
mod processor;
mod result;
mod source;

pub use context::{ChunkContext, MemoryUsage, ProcessingContext, StreamOutcome};
pub use options::{
    CsvOptions, DxfOptions, FormatOptions, ProcessorOptions, ShapefileOptions,
    DEFAULT_PREVIEW_SAMPLE_SIZE,
};
pub use processor::{CancelHandle, ChunkParser, FileProcessor, ProgressCallback, StreamProcessor};
pub use result::{
    collect_layers, count_feature_types, ProcessingError, ProcessingStatistics, ProcessorResult,
    MAX_RECORDED_ERRORS,
};
pub use source::{
    ByteChunkProducer, ChunkProducer, ChunkStream, FileData, InputFile, LineChunkProducer,
    RawChunk,
};
