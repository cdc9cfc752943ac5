use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;

use crate::cache::PreviewResult;
use crate::crs::{CoordinateSystemManager, NONE};
use crate::error::{IngestError, Result};
use crate::feature_manager::FeatureManager;
use crate::geojson::{Feature, FeatureCollection};
use crate::geometry::Point;
use crate::stream::context::{ChunkContext, MemoryUsage, ProcessingContext, StreamOutcome};
use crate::stream::options::ProcessorOptions;
use crate::stream::result::{
    collect_layers, count_feature_types, ProcessingError, ProcessingStatistics, ProcessorResult,
    MAX_RECORDED_ERRORS,
};
use crate::stream::source::{ChunkProducer, InputFile, RawChunk};

/// Receives progress in `[0, 1]`, never decreasing within a run.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Progress reported before the run is known to be complete.
const MAX_PARTIAL_PROGRESS: f64 = 0.99;

/// Turns raw chunks of one format into features.
pub trait ChunkParser: Send + Sync {
    fn can_process(&self, file: &InputFile) -> bool;

    /// Parse one chunk.
    ///
    /// An error aborts the whole run. Records that merely fail to convert
    /// should go to [`ChunkContext::record_failure`] instead.
    fn parse_chunk(&self, chunk: RawChunk, ctx: &mut ChunkContext<'_>) -> Result<Vec<Feature>>;
}

/// A processor for one kind of file.
#[allow(async_fn_in_trait)]
pub trait FileProcessor {
    fn can_process(&self, file: &InputFile) -> bool;

    /// Bounded preview of the first features.
    async fn analyze(&self, file: &InputFile) -> Result<Arc<PreviewResult>>;

    /// Read the whole file.
    async fn process(&self, file: &InputFile) -> Result<ProcessorResult>;
}

/// Stops a running [`StreamProcessor`] at its next chunk boundary.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Chunked file processing built from a producer and a parser.
///
/// Each chunk is parsed, its features are moved into the target system
/// and stored. Cancellation and the memory ceiling are checked between
/// chunks, so a chunk in flight always completes.
///
/// One run at a time: a second concurrent `process()` on the same
/// instance shares the cancellation flag and context.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use geoloader::{
///     CacheManager, ChunkContext, ChunkParser, CoordinateSystemManager, Feature, FileProcessor,
///     InputFile, LineChunkProducer, ProcessorOptions, RawChunk, StreamProcessor,
/// };
///
/// struct Nothing;
///
/// impl ChunkParser for Nothing {
///     fn can_process(&self, _file: &InputFile) -> bool {
///         true
///     }
///
///     fn parse_chunk(&self, _chunk: RawChunk, _ctx: &mut ChunkContext<'_>) -> geoloader::Result<Vec<Feature>> {
///         Ok(Vec::new())
///     }
/// }
///
/// # async fn run() -> geoloader::Result<()> {
/// let manager = Arc::new(CoordinateSystemManager::new(Arc::new(CacheManager::default())));
/// manager.initialize()?;
///
/// let processor = StreamProcessor::new(LineChunkProducer::default(), Nothing, manager, ProcessorOptions::default())
///     .with_progress(|p| println!("{:.0}%", p * 100.0));
/// let result = processor.process(&InputFile::from_path("points.csv")).await?;
/// println!("{} features", result.statistics.feature_count);
/// # Ok(())
/// # }
/// ```
pub struct StreamProcessor<P, Q> {
    producer: P,
    parser: Q,
    manager: Arc<CoordinateSystemManager>,
    options: ProcessorOptions,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
    context: Mutex<ProcessingContext>,
}

impl<P: ChunkProducer, Q: ChunkParser> StreamProcessor<P, Q> {
    pub fn new(producer: P, parser: Q, manager: Arc<CoordinateSystemManager>, options: ProcessorOptions) -> Self {
        StreamProcessor {
            producer,
            parser,
            manager,
            options,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            context: Mutex::new(ProcessingContext::default()),
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    pub fn manager(&self) -> &Arc<CoordinateSystemManager> {
        &self.manager
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Context of the current or most recent run.
    pub fn get_context(&self) -> ProcessingContext {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, ctx: &ProcessingContext) {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = ctx.clone();
    }

    fn report(&self, progress: f64) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }

    /// Structural checks before any chunk is read.
    fn preflight(&self, file: &InputFile) -> Result<()> {
        if !self.parser.can_process(file) {
            return Err(IngestError::UnsupportedFile {
                name: file.name.clone(),
            });
        }
        if !self.manager.is_initialized() {
            return Err(IngestError::NotInitialized);
        }
        let codes = self
            .options
            .coordinate_system
            .iter()
            .chain(std::iter::once(&self.options.target_system));
        for code in codes {
            if self.manager.get(code).is_none() {
                return Err(IngestError::UnknownSystem { code: code.clone() });
            }
        }
        Ok(())
    }

    async fn run(&self, file: &InputFile, ctx: &mut ProcessingContext, pipeline: &mut Pipeline<'_>) -> Result<()> {
        let total_bytes = file.len().await?;
        let mut chunks = self.producer.open(file);
        let mut chunk_index = 0usize;
        let mut progress = 0.0_f64;

        loop {
            if self.is_cancelled() {
                ctx.cancelled = true;
                ctx.outcome = StreamOutcome::Cancelled;
                tracing::info!(
                    file = %file.name,
                    chunks = ctx.chunks_processed,
                    features = ctx.feature_count,
                    "Processing cancelled"
                );
                return Ok(());
            }

            let Some(chunk) = chunks.next().await else {
                break;
            };
            let ingested = pipeline.ingest(&self.parser, chunk_index, chunk?)?;

            ctx.bytes_processed += ingested.bytes as u64;
            ctx.records_processed += ingested.records as u64;
            ctx.chunks_processed += 1;
            ctx.feature_count = pipeline.features.len();
            ctx.error_count = pipeline.error_count;
            ctx.memory_usage = MemoryUsage {
                heap_used: pipeline.features.memory_usage_bytes(),
                heap_total: self.options.feature_manager_options().memory_limit_bytes(),
            };

            if total_bytes > 0 {
                let fraction = ctx.bytes_processed as f64 / total_bytes as f64;
                progress = progress.max(fraction.min(MAX_PARTIAL_PROGRESS));
            }
            self.report(progress);
            self.publish(ctx);

            tracing::debug!(
                chunk = chunk_index,
                accepted = ingested.accepted,
                features = ctx.feature_count,
                progress,
                "Processed chunk"
            );

            if pipeline.features.is_memory_exceeded() {
                let used_bytes = ctx.memory_usage.heap_used;
                let limit_bytes = ctx.memory_usage.heap_total;
                tracing::warn!(file = %file.name, used_bytes, limit_bytes, "Memory limit exceeded");
                return Err(IngestError::MemoryLimitExceeded {
                    used_bytes,
                    limit_bytes,
                });
            }

            chunk_index += 1;
            tokio::task::yield_now().await;
        }

        ctx.outcome = StreamOutcome::Exhausted;
        self.report(1.0);
        Ok(())
    }
}

impl<P: ChunkProducer, Q: ChunkParser> FileProcessor for StreamProcessor<P, Q> {
    fn can_process(&self, file: &InputFile) -> bool {
        self.parser.can_process(file)
    }

    async fn analyze(&self, file: &InputFile) -> Result<Arc<PreviewResult>> {
        self.preflight(file)?;
        let cache = self.manager.cache();
        let key = file.cache_key();
        if let Some(preview) = cache.get_cached_preview(&key, &self.options) {
            tracing::debug!(file = %file.name, "Preview served from cache");
            return Ok(preview);
        }

        let limit = self.options.preview_sample_size;
        let mut pipeline = Pipeline::new(&self.manager, &self.options);
        let mut chunks = self.producer.open(file);
        let mut chunk_index = 0usize;
        while pipeline.features.len() < limit {
            let Some(chunk) = chunks.next().await else {
                break;
            };
            pipeline.ingest(&self.parser, chunk_index, chunk?)?;
            chunk_index += 1;
        }

        let coordinate_system = pipeline.output_system();
        let mut features = pipeline.features.into_features();
        features.truncate(limit);
        let collection = FeatureCollection::new(features);
        let preview = Arc::new(PreviewResult {
            bounds: collection.bounds(),
            layers: collect_layers(&collection.features),
            feature_count: collection.len(),
            coordinate_system,
            features: collection.features,
        });

        cache.cache_preview(&key, &self.options, Arc::clone(&preview));
        tracing::debug!(file = %file.name, features = preview.feature_count, "Built preview");
        Ok(preview)
    }

    async fn process(&self, file: &InputFile) -> Result<ProcessorResult> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut ctx = ProcessingContext::new(self.options.feature_manager_options().memory_limit_bytes());
        self.publish(&ctx);

        if let Err(e) = self.preflight(file) {
            ctx.outcome = StreamOutcome::Errored;
            self.publish(&ctx);
            return Err(e);
        }

        let mut pipeline = Pipeline::new(&self.manager, &self.options);
        if let Err(e) = self.run(file, &mut ctx, &mut pipeline).await {
            ctx.outcome = StreamOutcome::Errored;
            ctx.error_count = pipeline.error_count;
            self.publish(&ctx);
            tracing::warn!(file = %file.name, error = %e, "Processing failed");
            return Err(e);
        }
        self.publish(&ctx);

        let result = pipeline.finish();
        tracing::info!(
            file = %file.name,
            features = result.statistics.feature_count,
            failed_transformations = result.statistics.failed_transformations,
            coordinate_system = %result.coordinate_system,
            cancelled = ctx.cancelled,
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Processing finished"
        );
        Ok(result)
    }
}

struct Ingested {
    bytes: usize,
    records: usize,
    accepted: usize,
}

/// Per-run state shared by `process` and `analyze`.
struct Pipeline<'a> {
    manager: &'a CoordinateSystemManager,
    options: &'a ProcessorOptions,
    features: FeatureManager,
    source: Option<String>,
    failed_transformations: usize,
    error_count: usize,
    errors: Vec<ProcessingError>,
}

impl<'a> Pipeline<'a> {
    fn new(manager: &'a CoordinateSystemManager, options: &'a ProcessorOptions) -> Self {
        Pipeline {
            manager,
            options,
            features: FeatureManager::new(options.feature_manager_options()),
            source: options.coordinate_system.clone(),
            failed_transformations: 0,
            error_count: 0,
            errors: Vec::new(),
        }
    }

    fn ingest<Q: ChunkParser>(&mut self, parser: &Q, chunk_index: usize, chunk: RawChunk) -> Result<Ingested> {
        let bytes = chunk.byte_len();
        let mut chunk_ctx = ChunkContext::new(chunk_index, self.manager, &self.options.format, chunk.record_count());
        let parsed = parser
            .parse_chunk(chunk, &mut chunk_ctx)
            .map_err(|e| match e {
                e @ IngestError::ChunkProcessingFailed { .. } => e,
                other => IngestError::ChunkProcessingFailed {
                    chunk_index,
                    reason: other.to_string(),
                },
            })?;
        let (records, failures) = chunk_ctx.into_parts();
        for reason in failures {
            let err = IngestError::FeatureConversionFailed { chunk_index, reason };
            tracing::debug!(error = %err, "Skipped record");
            self.record_error(chunk_index, err.to_string());
        }

        if self.source.is_none() {
            self.detect(&parsed);
        }

        let mut accepted = 0;
        for feature in parsed {
            if !self.keeps_layer(&feature) {
                continue;
            }
            if let Some(feature) = self.convert(feature, chunk_index) {
                if self.features.add_feature(feature) {
                    accepted += 1;
                }
            }
        }

        Ok(Ingested {
            bytes,
            records,
            accepted,
        })
    }

    fn detect(&mut self, features: &[Feature]) {
        let points: Vec<Point> = features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| g.points())
            .collect();
        if points.is_empty() {
            return;
        }
        self.source = Some(self.manager.suggest_coordinate_system(&points).code);
    }

    fn keeps_layer(&self, feature: &Feature) -> bool {
        match self.options.format.layer_filter() {
            Some(layers) => feature
                .layer()
                .is_some_and(|layer| layers.iter().any(|l| l == layer)),
            None => true,
        }
    }

    fn needs_transform(&self) -> Option<&str> {
        let source = self.source.as_deref()?;
        (source != NONE && source != self.options.target_system).then_some(source)
    }

    /// Move a feature into the target system; `None` when that failed.
    fn convert(&mut self, mut feature: Feature, chunk_index: usize) -> Option<Feature> {
        let Some(source) = self.needs_transform() else {
            return Some(feature);
        };
        let Some(geometry) = &feature.geometry else {
            return Some(feature);
        };

        match self
            .manager
            .transform_geometry(geometry, source, &self.options.target_system)
        {
            Ok(transformed) => {
                feature.geometry = Some(transformed);
                Some(feature)
            }
            Err(e) => {
                tracing::warn!(chunk = chunk_index, id = ?feature.id, error = %e, "Dropping feature after failed transformation");
                self.failed_transformations += 1;
                self.record_error(chunk_index, e.to_string());
                None
            }
        }
    }

    fn record_error(&mut self, chunk_index: usize, message: String) {
        self.error_count += 1;
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(ProcessingError {
                chunk_index,
                message,
            });
        }
    }

    /// System the stored features are expressed in.
    fn output_system(&self) -> String {
        if self.needs_transform().is_some() {
            return self.options.target_system.clone();
        }
        self.source.clone().unwrap_or_else(|| NONE.to_string())
    }

    fn finish(self) -> ProcessorResult {
        let coordinate_system = self.output_system();
        let dropped_features = self.features.dropped_features();
        let features = FeatureCollection::new(self.features.into_features());
        let layers = collect_layers(&features.features);

        ProcessorResult {
            bounds: features.bounds(),
            coordinate_system,
            statistics: ProcessingStatistics {
                feature_count: features.len(),
                layer_count: layers.len(),
                feature_types: count_feature_types(&features.features),
                failed_transformations: self.failed_transformations,
                dropped_features,
                errors: self.errors,
            },
            layers,
            features,
        }
    }
}
