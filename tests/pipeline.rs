//! End-to-end checks through the public API.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geoloader::geometry::shapes::geometry_for_shape;
use geoloader::{
    ByteChunkProducer, CacheConfig, CacheManager, CancelHandle, ChunkContext, ChunkParser,
    CoordinateSystemManager, Feature, FeatureManager, FeatureManagerOptions, FileProcessor,
    Geometry, IngestError, InputFile, LineChunkProducer, Point, ProcessorOptions, RawChunk,
    StreamOutcome, StreamProcessor, NONE, SWISS_LV03, SWISS_LV95, WGS84,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ready_manager() -> Arc<CoordinateSystemManager> {
    let manager = Arc::new(CoordinateSystemManager::new(Arc::new(CacheManager::default())));
    manager.initialize().expect("initialize");
    manager
}

/// Little-endian `(x, y)` f64 pairs, 16 bytes per record.
struct BinaryXyParser;

impl ChunkParser for BinaryXyParser {
    fn can_process(&self, file: &InputFile) -> bool {
        file.extension().as_deref() == Some("bin")
    }

    fn parse_chunk(&self, chunk: RawChunk, ctx: &mut ChunkContext<'_>) -> geoloader::Result<Vec<Feature>> {
        let RawChunk::Bytes(bytes) = chunk else {
            return Err(IngestError::Geometry("expected bytes".to_string()));
        };
        if bytes.len() % 16 != 0 {
            return Err(IngestError::Geometry(format!("{} trailing bytes", bytes.len() % 16)));
        }
        ctx.set_records(bytes.len() / 16);
        Ok(bytes
            .chunks_exact(16)
            .map(|record| {
                let mut x = [0u8; 8];
                let mut y = [0u8; 8];
                x.copy_from_slice(&record[..8]);
                y.copy_from_slice(&record[8..]);
                Feature::new(Geometry::Point(vec![f64::from_le_bytes(x), f64::from_le_bytes(y)]))
            })
            .collect())
    }
}

fn binary_points(points: &[(f64, f64)]) -> Vec<u8> {
    points
        .iter()
        .flat_map(|(x, y)| x.to_le_bytes().into_iter().chain(y.to_le_bytes()))
        .collect()
}

fn lv95_grid(count: usize) -> Vec<(f64, f64)> {
    (0..count)
        .map(|i| (2_600_000.0 + i as f64 * 10.0, 1_200_000.0 + i as f64 * 5.0))
        .collect()
}

/// `x;y;layer` records, semicolon separated.
struct SemicolonParser;

impl ChunkParser for SemicolonParser {
    fn can_process(&self, file: &InputFile) -> bool {
        file.extension().as_deref() == Some("txt")
    }

    fn parse_chunk(&self, chunk: RawChunk, ctx: &mut ChunkContext<'_>) -> geoloader::Result<Vec<Feature>> {
        let RawChunk::Lines(lines) = chunk else {
            return Err(IngestError::Geometry("expected lines".to_string()));
        };
        let mut features = Vec::with_capacity(lines.len());
        for line in lines {
            let parts: Vec<&str> = line.split(';').collect();
            match (parts.first().map(|v| v.parse::<f64>()), parts.get(1).map(|v| v.parse::<f64>())) {
                (Some(Ok(x)), Some(Ok(y))) => {
                    let mut feature = Feature::new(Geometry::Point(vec![x, y]));
                    if let Some(layer) = parts.get(2) {
                        feature = feature.with_property("layer", *layer);
                    }
                    features.push(feature);
                }
                _ => ctx.record_failure(format!("bad record: {}", line)),
            }
        }
        Ok(features)
    }
}

#[tokio::test]
async fn processes_file_from_disk() {
    init_tracing();
    let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    for i in 0..42 {
        writeln!(tmp, "{};{};{}", 683_000 + i, 248_000 + i, if i % 2 == 0 { "even" } else { "odd" }).unwrap();
    }
    writeln!(tmp, "garbage").unwrap();
    tmp.flush().unwrap();

    let manager = ready_manager();
    let processor = StreamProcessor::new(
        LineChunkProducer { lines_per_chunk: 8 },
        SemicolonParser,
        Arc::clone(&manager),
        ProcessorOptions::default(),
    );
    let file = InputFile::from_path(tmp.path());
    assert!(processor.can_process(&file));

    let result = processor.process(&file).await.unwrap();
    assert_eq!(result.coordinate_system, WGS84);
    assert_eq!(result.statistics.feature_count, 42);
    assert_eq!(result.layers, vec!["even", "odd"]);
    assert_eq!(result.statistics.errors.len(), 1);

    // Zurich area in LV03.
    let bounds = result.bounds.unwrap();
    assert!(bounds.min_x > 8.5 && bounds.max_x < 8.6, "{:?}", bounds);
    assert!(bounds.min_y > 47.3 && bounds.max_y < 47.4, "{:?}", bounds);

    let ctx = processor.get_context();
    assert_eq!(ctx.records_processed, 43);
    assert_eq!(ctx.error_count, 1);
    assert_eq!(ctx.bytes_processed, std::fs::metadata(tmp.path()).unwrap().len());

    let json = serde_json::to_value(&result.features).unwrap();
    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["features"][0]["geometry"]["type"], "Point");
}

#[tokio::test]
async fn cancellation_returns_partial_result_and_resets() {
    init_tracing();
    let handle: Arc<Mutex<Option<CancelHandle>>> = Arc::new(Mutex::new(None));
    let chunks_seen = Arc::new(AtomicUsize::new(0));
    let cancel_on_first_run = Arc::new(Mutex::new(true));

    let (h, seen, first) = (Arc::clone(&handle), Arc::clone(&chunks_seen), Arc::clone(&cancel_on_first_run));
    let processor = StreamProcessor::new(
        ByteChunkProducer { chunk_bytes: 160 },
        BinaryXyParser,
        ready_manager(),
        ProcessorOptions::default(),
    )
    .with_progress(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 2 && *first.lock().unwrap() {
            if let Some(handle) = h.lock().unwrap().as_ref() {
                handle.cancel();
            }
        }
    });
    *handle.lock().unwrap() = Some(processor.cancel_handle());

    let file = InputFile::from_bytes("points.bin", binary_points(&lv95_grid(1000)));
    let partial = processor.process(&file).await.unwrap();
    assert!(partial.statistics.feature_count < 1000);
    assert_eq!(partial.statistics.feature_count, 30);
    assert!(processor.is_cancelled());
    assert_eq!(processor.get_context().outcome, StreamOutcome::Cancelled);

    *cancel_on_first_run.lock().unwrap() = false;
    let full = processor.process(&file).await.unwrap();
    assert_eq!(full.statistics.feature_count, 1000);
    assert!(!processor.is_cancelled());
    assert_eq!(processor.get_context().records_processed, 1000);
}

#[tokio::test]
async fn memory_ceiling_rejects_processing() {
    let processor = StreamProcessor::new(
        ByteChunkProducer { chunk_bytes: 160 },
        BinaryXyParser,
        ready_manager(),
        ProcessorOptions {
            max_memory_mb: 0,
            monitor_memory: true,
            ..Default::default()
        },
    );
    let file = InputFile::from_bytes("points.bin", binary_points(&lv95_grid(100)));
    let err = processor.process(&file).await.unwrap_err();
    assert!(matches!(err, IngestError::MemoryLimitExceeded { .. }), "{}", err);
    assert_eq!(processor.get_context().outcome, StreamOutcome::Errored);

    let relaxed = StreamProcessor::new(
        ByteChunkProducer { chunk_bytes: 160 },
        BinaryXyParser,
        ready_manager(),
        ProcessorOptions {
            max_memory_mb: 0,
            monitor_memory: false,
            ..Default::default()
        },
    );
    assert_eq!(relaxed.process(&file).await.unwrap().statistics.feature_count, 100);
}

#[tokio::test]
async fn hard_parse_failure_aborts() {
    let processor = StreamProcessor::new(
        ByteChunkProducer { chunk_bytes: 160 },
        BinaryXyParser,
        ready_manager(),
        ProcessorOptions::default(),
    );
    let mut bytes = binary_points(&lv95_grid(15));
    bytes.extend_from_slice(&[1, 2, 3]);
    let err = processor
        .process(&InputFile::from_bytes("short.bin", bytes))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ChunkProcessingFailed { chunk_index: 1, .. }), "{}", err);
    assert_eq!(processor.get_context().chunks_processed, 1);
}

#[test]
fn transforms_round_trip() {
    let manager = ready_manager();
    let swiss = [
        Point::new(2_600_000.0, 1_200_000.0),
        Point::new(2_500_000.0, 1_100_000.0),
        Point::new(2_800_000.0, 1_280_000.0),
    ];
    for p in swiss {
        let there = manager.transform(p, SWISS_LV95, WGS84).unwrap();
        let back = manager.transform(there, WGS84, SWISS_LV95).unwrap();
        assert!(back.distance_to(&p) < 1.0, "{:?} -> {:?}", p, back);

        let lv03 = manager.transform(p, SWISS_LV95, SWISS_LV03).unwrap();
        assert!((lv03.x - (p.x - 2_000_000.0)).abs() < 1.0);
        assert!((lv03.y - (p.y - 1_000_000.0)).abs() < 1.0);
    }

    let lonlat = Point::new(9.37, 47.42);
    let there = manager.transform(lonlat, WGS84, SWISS_LV03).unwrap();
    let back = manager.transform(there, SWISS_LV03, WGS84).unwrap();
    assert!((back.x - lonlat.x).abs() < 1e-6 && (back.y - lonlat.y).abs() < 1e-6);
}

#[test]
fn identity_for_every_registered_system() {
    let manager = ready_manager();
    let p = Point::new(0.123, 4.567);
    for code in manager.codes() {
        assert_eq!(manager.transform(p, &code, &code).unwrap(), p);
    }
    assert!(manager.transformer_stats().is_empty());
    assert!(manager.codes().iter().any(|c| c == NONE));
}

#[test]
fn cache_stays_bounded_and_sweeps() {
    let cache = CacheManager::new(CacheConfig {
        transformation_capacity: 10_000,
        preview_capacity: 10,
        ttl: Duration::from_millis(50),
    });
    for i in 0..15_000 {
        let p = Point::new(i as f64, -(i as f64));
        cache.cache_transformation(&p, SWISS_LV95, WGS84, p);
    }
    assert!(cache.get_stats().transformation_cache_size < 15_000);

    std::thread::sleep(Duration::from_millis(100));
    cache.clear_expired();
    assert_eq!(cache.get_stats().transformation_cache_size, 0);

    let fresh = Point::new(1.5, 2.5);
    cache.cache_transformation(&fresh, SWISS_LV95, WGS84, fresh);
    assert_eq!(cache.get_cached_transformation(&fresh, SWISS_LV95, WGS84), Some(fresh));
    assert_eq!(cache.get_cached_transformation(&fresh, SWISS_LV03, WGS84), None);
    assert!((cache.get_hit_rates().transformation - 0.5).abs() < f64::EPSILON);
}

#[test]
fn feature_chunks_are_deterministic() {
    let point = |i: usize| Feature::new(Geometry::Point(vec![i as f64, 1.5]));
    for (count, expected) in [(15usize, vec![10usize, 5]), (25, vec![10, 10, 5])] {
        let mut store = FeatureManager::new(FeatureManagerOptions {
            chunk_size: 10,
            ..Default::default()
        });
        store.add_features((0..count).map(point));
        store.finalize();

        let sizes: Vec<usize> = (0..store.stats().chunk_count as isize)
            .filter_map(|i| store.get_chunk(i).map(|c| c.len()))
            .collect();
        assert_eq!(sizes, expected);
        assert!(store.get_chunk(-1).is_none());
        assert!(store.get_chunk(999).is_none());
        assert_eq!(store.get_features().count(), count);
    }
}

#[test]
fn detection_heuristic() {
    let manager = ready_manager();
    let swiss = [
        Point::new(2_600_000.0, 1_200_000.0),
        Point::new(2_600_100.0, 1_200_100.0),
        Point::new(2_800_000.0, 1_600_000.0),
    ];
    let suggestion = manager.suggest_coordinate_system(&swiss);
    assert_eq!(suggestion.code, SWISS_LV95);
    assert_eq!(suggestion.ratio, 1.0);

    let mixed = [swiss[0], swiss[1], Point::new(7.43958, 46.95241)];
    let suggestion = manager.suggest_coordinate_system(&mixed);
    assert!(suggestion.ratio < 0.8);
    assert_eq!(suggestion.code, NONE);
}

#[test]
fn shapefile_geometries_feed_the_store() {
    let mut store = FeatureManager::default();
    let shapes = [
        (1u32, vec![7.44, 46.95]),
        (3, vec![7.0, 46.0, 7.5, 46.5, 8.0, 46.0]),
        (8, vec![7.0, 46.0, 7.1, 46.1]),
    ];
    for (shape_type, coords) in shapes {
        let geometry = geometry_for_shape(shape_type, &coords).unwrap();
        assert!(store.add_feature(Feature::new(geometry)));
    }
    let kinds: Vec<_> = store.get_features().filter_map(Feature::geometry_type).collect();
    assert_eq!(kinds, vec!["Point", "LineString", "MultiPoint"]);
}
