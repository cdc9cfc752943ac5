//! Input files and the producers that cut them into raw chunks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Lines};

use crate::error::Result;

type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// Where the bytes of an [`InputFile`] live.
#[derive(Debug, Clone)]
pub enum FileData {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file handed to a processor.
#[derive(Debug, Clone)]
pub struct InputFile {
    /// Display name.
    pub name: String,
    pub data: FileData,
}

impl InputFile {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            data: FileData::Path(path.to_path_buf()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: FileData::Memory(bytes.into()),
        }
    }

    /// Lowercase extension of the name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Identity of the underlying data, used to key cached previews.
    ///
    /// Disk files are identified by their full path, in-memory files by
    /// name, length and a content hash.
    pub fn cache_key(&self) -> String {
        match &self.data {
            FileData::Path(path) => format!("path:{}", path.display()),
            FileData::Memory(bytes) => {
                let digest = ahash::RandomState::with_seeds(0, 0, 0, 0).hash_one(&bytes[..]);
                format!("memory:{}:{}:{:016x}", self.name, bytes.len(), digest)
            }
        }
    }

    /// Size in bytes.
    pub async fn len(&self) -> Result<u64> {
        match &self.data {
            FileData::Path(path) => Ok(tokio::fs::metadata(path).await?.len()),
            FileData::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    async fn open(&self) -> Result<Reader> {
        match &self.data {
            FileData::Path(path) => Ok(Box::new(tokio::fs::File::open(path).await?)),
            FileData::Memory(bytes) => Ok(Box::new(std::io::Cursor::new(Arc::clone(bytes)))),
        }
    }
}

/// One unit of raw input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChunk {
    Bytes(Vec<u8>),
    /// Text records without line terminators.
    Lines(Vec<String>),
}

impl RawChunk {
    /// Input bytes covered by the chunk, terminators included.
    pub fn byte_len(&self) -> usize {
        match self {
            RawChunk::Bytes(bytes) => bytes.len(),
            RawChunk::Lines(lines) => lines.iter().map(|l| l.len() + 1).sum(),
        }
    }

    /// Records in the chunk; byte blocks carry none until parsed.
    pub fn record_count(&self) -> usize {
        match self {
            RawChunk::Bytes(_) => 0,
            RawChunk::Lines(lines) => lines.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawChunk::Bytes(bytes) => bytes.is_empty(),
            RawChunk::Lines(lines) => lines.is_empty(),
        }
    }
}

/// Stream of raw chunks; opening the file happens on first poll.
pub type ChunkStream = BoxStream<'static, Result<RawChunk>>;

/// Cuts a file into raw chunks.
pub trait ChunkProducer: Send + Sync {
    fn open(&self, file: &InputFile) -> ChunkStream;
}

/// Fixed-size byte blocks; the last one may be shorter.
#[derive(Debug, Clone)]
pub struct ByteChunkProducer {
    pub chunk_bytes: usize,
}

impl Default for ByteChunkProducer {
    fn default() -> Self {
        Self {
            chunk_bytes: 64 * 1024,
        }
    }
}

impl ChunkProducer for ByteChunkProducer {
    fn open(&self, file: &InputFile) -> ChunkStream {
        let file = file.clone();
        let chunk_bytes = self.chunk_bytes.max(1);
        stream::once(async move { file.open().await })
            .map_ok(move |reader| stream::try_unfold(reader, move |r| read_block(r, chunk_bytes)))
            .try_flatten()
            .boxed()
    }
}

async fn read_block(mut reader: Reader, size: usize) -> Result<Option<(RawChunk, Reader)>> {
    let mut buf = Vec::with_capacity(size);
    (&mut reader).take(size as u64).read_to_end(&mut buf).await?;
    if buf.is_empty() {
        return Ok(None);
    }
    Ok(Some((RawChunk::Bytes(buf), reader)))
}

/// Groups of text lines, for record-oriented formats like CSV and DXF.
#[derive(Debug, Clone)]
pub struct LineChunkProducer {
    pub lines_per_chunk: usize,
}

impl Default for LineChunkProducer {
    fn default() -> Self {
        Self {
            lines_per_chunk: 1000,
        }
    }
}

impl ChunkProducer for LineChunkProducer {
    fn open(&self, file: &InputFile) -> ChunkStream {
        let file = file.clone();
        let per_chunk = self.lines_per_chunk.max(1);
        stream::once(async move { file.open().await })
            .map_ok(move |reader| {
                stream::try_unfold(BufReader::new(reader).lines(), move |lines| {
                    read_lines(lines, per_chunk)
                })
            })
            .try_flatten()
            .boxed()
    }
}

async fn read_lines(
    mut lines: Lines<BufReader<Reader>>,
    count: usize,
) -> Result<Option<(RawChunk, Lines<BufReader<Reader>>)>> {
    let mut batch = Vec::with_capacity(count);
    while batch.len() < count {
        match lines.next_line().await? {
            Some(line) => batch.push(line),
            None => break,
        }
    }
    if batch.is_empty() {
        return Ok(None);
    }
    Ok(Some((RawChunk::Lines(batch), lines)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn collect(producer: &dyn ChunkProducer, file: &InputFile) -> Vec<RawChunk> {
        producer.open(file).try_collect().await.unwrap()
    }

    #[test]
    fn test_cache_key_identifies_data() {
        let a = InputFile::from_path("/data/a/points.csv");
        let b = InputFile::from_path("/data/b/points.csv");
        assert_eq!(a.name, b.name);
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), InputFile::from_path("/data/a/points.csv").cache_key());

        let one = InputFile::from_bytes("points.csv", b"1,2\n".to_vec());
        let same = InputFile::from_bytes("points.csv", b"1,2\n".to_vec());
        let other = InputFile::from_bytes("points.csv", b"3,4\n".to_vec());
        assert_eq!(one.cache_key(), same.cache_key());
        assert_ne!(one.cache_key(), other.cache_key());
    }

    #[tokio::test]
    async fn test_byte_chunks() {
        let file = InputFile::from_bytes("data.bin", (0u8..10).collect::<Vec<_>>());
        let chunks = collect(&ByteChunkProducer { chunk_bytes: 4 }, &file).await;
        let sizes: Vec<usize> = chunks.iter().map(RawChunk::byte_len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(chunks[2], RawChunk::Bytes(vec![8, 9]));
    }

    #[tokio::test]
    async fn test_line_chunks_from_disk() {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for i in 0..25 {
            writeln!(tmp, "{},{}", i, i * 2).unwrap();
        }
        let file = InputFile::from_path(tmp.path());
        assert_eq!(file.extension().as_deref(), Some("csv"));
        assert!(file.len().await.unwrap() > 0);

        let chunks = collect(&LineChunkProducer { lines_per_chunk: 10 }, &file).await;
        let counts: Vec<usize> = chunks.iter().map(RawChunk::record_count).collect();
        assert_eq!(counts, vec![10, 10, 5]);
        let total: usize = chunks.iter().map(RawChunk::byte_len).sum();
        assert_eq!(total as u64, file.len().await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_input_yields_nothing() {
        let file = InputFile::from_bytes("empty.csv", Vec::new());
        assert!(collect(&LineChunkProducer::default(), &file).await.is_empty());
        assert!(collect(&ByteChunkProducer::default(), &file).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_errors_on_first_poll() {
        let file = InputFile::from_path("/nonexistent/geoloader/plan.dxf");
        let mut stream = ByteChunkProducer::default().open(&file);
        assert!(matches!(
            stream.next().await,
            Some(Err(crate::IngestError::Io(_)))
        ));
    }
}
