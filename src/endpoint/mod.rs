//! Source and target endpoints for a copy
//!
//! A file takes part in a copy through an endpoint: local files can act as
//! source or target, remote chunk services only as source. Sources are
//! unified behind [`SourceEndpoint`]; the target is always a [`LocalFile`].

pub mod http;
pub mod local;

pub use http::HttpFile;
pub use local::LocalFile;

use crate::error::Result;
use crate::hasher::HashAlgorithm;
use crate::types::{ChunkEntry, ChunkRecord, FileManifest};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Ordered, finite, non-restartable stream of chunk entries.
///
/// Entries arrive strictly ascending by chunk id. A producer task feeds a
/// bounded single-slot channel, overlapping cache decoding with whatever the
/// consumer does per entry.
pub struct ChunkStream {
    count: u64,
    rx: mpsc::Receiver<Result<ChunkEntry>>,
}

impl ChunkStream {
    pub(crate) fn new(count: u64, rx: mpsc::Receiver<Result<ChunkEntry>>) -> Self {
        Self { count, rx }
    }

    /// Total number of entries this stream will yield.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Receive the next entry, or `None` once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<ChunkEntry>> {
        self.rx.recv().await
    }
}

/// The source side of a copy: a local file or a remote chunk service.
pub enum SourceEndpoint {
    Local(LocalFile),
    Http(HttpFile),
}

impl SourceEndpoint {
    /// Endpoint kind name (for logging)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Http(_) => "http",
        }
    }

    /// Load the existing chunk cache. A remote source serves its manifest
    /// directly, so nothing is loaded there.
    pub async fn load_cache(&mut self) -> Result<()> {
        match self {
            Self::Local(f) => f.load_cache(),
            Self::Http(f) => f.load_cache(),
        }
    }

    /// Rebuild the chunk cache by rereading the whole file. Only possible
    /// for local sources.
    pub async fn build_cache(&mut self, algorithm: HashAlgorithm, chunksize: u64) -> Result<()> {
        match self {
            Self::Local(f) => f.build_cache(algorithm, chunksize).await,
            Self::Http(f) => f.build_cache(),
        }
    }

    /// The manifest describing this source.
    pub async fn file_info(&self) -> Result<FileManifest> {
        match self {
            Self::Local(f) => f.file_info(),
            Self::Http(f) => f.file_info().await,
        }
    }

    /// Chunk details for a single id.
    pub async fn chunk(&self, chunk_id: u64) -> Result<ChunkRecord> {
        match self {
            Self::Local(f) => f.chunk(chunk_id),
            Self::Http(f) => f.chunk(chunk_id).await,
        }
    }

    /// Stream all chunk entries in ascending order.
    pub async fn iter_chunks(&self) -> Result<ChunkStream> {
        match self {
            Self::Local(f) => f.iter_chunks(),
            Self::Http(f) => f.iter_chunks().await,
        }
    }

    /// Read the raw bytes of chunk `chunk_id`.
    ///
    /// Local files are addressed by byte offset, the chunk service by chunk
    /// index; the divergence is resolved here so the copy loop stays
    /// identical for both source kinds.
    pub async fn read_chunk_data(&mut self, chunk_id: u64, chunksize: u64) -> Result<(Bytes, usize)> {
        match self {
            Self::Local(f) => f.read_chunk_data(chunk_id * chunksize).await,
            Self::Http(f) => f.read_chunk_data(chunk_id).await,
        }
    }

    /// Close the source, keeping its cache file on disk.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Local(f) => f.close(),
            Self::Http(f) => f.close(),
        }
    }
}
