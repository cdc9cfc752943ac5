use std::time::{Duration, Instant};

use serde::Serialize;

use crate::crs::CoordinateSystemManager;
use crate::stream::options::FormatOptions;

/// How a `process()` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamOutcome {
    Running,
    /// Every chunk was consumed.
    Exhausted,
    /// Stopped at a chunk boundary after `cancel()`.
    Cancelled,
    /// A fatal error aborted the run.
    Errored,
}

/// Estimated feature memory against the configured ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub heap_used: usize,
    pub heap_total: usize,
}

/// Bookkeeping for one `process()` call, kept afterwards for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingContext {
    pub bytes_processed: u64,
    pub records_processed: u64,
    pub chunks_processed: usize,
    pub feature_count: usize,
    pub error_count: usize,
    pub memory_usage: MemoryUsage,
    pub cancelled: bool,
    pub outcome: StreamOutcome,
    #[serde(skip)]
    pub start_time: Instant,
}

impl ProcessingContext {
    pub fn new(memory_limit_bytes: usize) -> Self {
        ProcessingContext {
            bytes_processed: 0,
            records_processed: 0,
            chunks_processed: 0,
            feature_count: 0,
            error_count: 0,
            memory_usage: MemoryUsage {
                heap_used: 0,
                heap_total: memory_limit_bytes,
            },
            cancelled: false,
            outcome: StreamOutcome::Running,
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != StreamOutcome::Running
    }
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new(0)
    }
}

/// What a [`ChunkParser`](super::ChunkParser) sees while parsing one chunk.
pub struct ChunkContext<'a> {
    chunk_index: usize,
    manager: &'a CoordinateSystemManager,
    format: &'a FormatOptions,
    records: usize,
    failures: Vec<String>,
}

impl<'a> ChunkContext<'a> {
    pub(crate) fn new(
        chunk_index: usize,
        manager: &'a CoordinateSystemManager,
        format: &'a FormatOptions,
        records: usize,
    ) -> Self {
        ChunkContext {
            chunk_index,
            manager,
            format,
            records,
            failures: Vec::new(),
        }
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Shared coordinate system manager, for parsers that transform themselves.
    pub fn manager(&self) -> &CoordinateSystemManager {
        self.manager
    }

    pub fn format(&self) -> &FormatOptions {
        self.format
    }

    /// Override the record count; byte-oriented parsers know it only after parsing.
    pub fn set_records(&mut self, records: usize) {
        self.records = records;
    }

    /// Note a record that could not become a feature. Processing continues.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.failures.push(reason.into());
    }

    pub(crate) fn into_parts(self) -> (usize, Vec<String>) {
        (self.records, self.failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheManager;
    use std::sync::Arc;

    #[test]
    fn test_new_context() {
        let ctx = ProcessingContext::new(1024);
        assert_eq!(ctx.memory_usage.heap_total, 1024);
        assert_eq!(ctx.outcome, StreamOutcome::Running);
        assert!(!ctx.cancelled);
        assert!(!ctx.is_finished());

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["outcome"], "Running");
        assert!(json.get("start_time").is_none());
    }

    #[test]
    fn test_chunk_context_records_failures() {
        let manager = CoordinateSystemManager::new(Arc::new(CacheManager::default()));
        let format = FormatOptions::Generic;
        let mut ctx = ChunkContext::new(3, &manager, &format, 10);
        ctx.record_failure("bad row");
        ctx.set_records(12);
        assert_eq!(ctx.chunk_index(), 3);
        assert_eq!(ctx.into_parts(), (12, vec!["bad row".to_string()]));
    }
}
