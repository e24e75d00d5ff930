//! Local file endpoint
//!
//! Wraps an open file together with its chunk cache at `<path>.tcache.db`.
//! The same type serves both roles of a copy: sources are opened read-only
//! with an existing cache, targets are opened read-write and rebuild their
//! cache from current contents.

use crate::cache::ChunkCache;
use crate::error::{Error, Result};
use crate::hasher::HashAlgorithm;
use crate::progress;
use crate::types::{ChunkRecord, FileManifest};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;

use super::ChunkStream;

/// Suffix of the cache database next to the file (before the store's own
/// `.db` extension)
const CACHE_SUFFIX: &str = ".tcache";

/// A local file taking part in a copy, together with its chunk cache.
pub struct LocalFile {
    path: PathBuf,
    file: File,
    algorithm: Option<HashAlgorithm>,
    chunksize: u64,
    cache: ChunkCache,
}

impl LocalFile {
    /// Open an existing file read-only as a copy source. The cache handle is
    /// attached but not opened yet; call [`load_cache`](Self::load_cache) or
    /// [`build_cache`](Self::build_cache) next.
    pub async fn open_source(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| Error::io(format!("opening source file {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            algorithm: None,
            chunksize: 0,
            cache: ChunkCache::new(),
        })
    }

    /// Open a file read-write as a copy target, creating it when missing.
    pub async fn open_or_create_target(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .await
            .map_err(|e| Error::io(format!("opening target file {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            algorithm: None,
            chunksize: 0,
            cache: ChunkCache::new(),
        })
    }

    fn cache_base(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(CACHE_SUFFIX);
        PathBuf::from(os)
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest algorithm adopted from the cache manifest or the last build.
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        self.algorithm
    }

    /// Open the existing chunk cache and adopt its chunk size and digest
    /// algorithm. Fails when the stored algorithm is not recognized, which
    /// also covers a cache without a manifest.
    pub fn load_cache(&mut self) -> Result<()> {
        self.cache.open(&self.cache_base())?;

        let info = self.cache.manifest()?;
        self.chunksize = info.chunksize;
        self.algorithm = Some(HashAlgorithm::parse(&info.hash_algorithm)?);

        Ok(())
    }

    /// Rebuild the chunk cache by rereading the whole file.
    ///
    /// Existing chunk records are removed first, so a failed build leaves a
    /// partially filled cache that the next build restarts from zero.
    pub async fn build_cache(&mut self, algorithm: HashAlgorithm, chunksize: u64) -> Result<()> {
        if chunksize < 1 {
            return Err(Error::BadChunkSize { chunksize });
        }
        self.chunksize = chunksize;
        self.algorithm = Some(algorithm);

        self.cache.open(&self.cache_base())?;
        self.cache.clear_chunks()?;

        let meta = self
            .file
            .metadata()
            .await
            .map_err(|e| Error::io(format!("stat {}", self.path.display()), e))?;
        let filesize = meta.len();

        let mut hasher = algorithm.hasher();
        let bar = progress::chunk_bar(filesize.div_ceil(chunksize));

        self.file
            .seek(std::io::SeekFrom::Start(0))
            .await
            .map_err(|e| Error::io(format!("rewinding {}", self.path.display()), e))?;

        let mut chunk_id: u64 = 0;
        let mut buf = vec![0u8; chunksize as usize];
        loop {
            let n = read_full(&mut self.file, &mut buf).await.map_err(|e| {
                Error::io(
                    format!("reading chunk {} from {}", chunk_id, self.path.display()),
                    e,
                )
            })?;
            if n == 0 {
                break;
            }

            let hash = hasher.hash_chunk(&buf[..n]);
            self.cache
                .put_chunk(chunk_id, &ChunkRecord::new(hash, n as u64))?;

            bar.inc(1);
            chunk_id += 1;
        }
        bar.finish_and_clear();

        let manifest = FileManifest {
            filename: basename(&self.path),
            filesize,
            checksum: hasher.file_hash(),
            hash_algorithm: hasher.name().to_string(),
            chunksize,
        };
        self.cache.put_manifest(&manifest)?;

        tracing::debug!(
            path = %self.path.display(),
            chunks = chunk_id,
            algorithm = manifest.hash_algorithm,
            "Chunk cache built"
        );
        Ok(())
    }

    /// The manifest stored in the cache.
    pub fn file_info(&self) -> Result<FileManifest> {
        self.cache.manifest()
    }

    /// Truncate or zero-extend the file to exactly `newsize` bytes.
    pub async fn set_filesize(&mut self, newsize: u64) -> Result<()> {
        let meta = self
            .file
            .metadata()
            .await
            .map_err(|e| Error::io(format!("stat {}", self.path.display()), e))?;

        if meta.len() == newsize {
            return Ok(());
        }

        self.file
            .set_len(newsize)
            .await
            .map_err(|e| Error::io(format!("resizing {}", self.path.display()), e))?;
        Ok(())
    }

    /// Chunk details for a single id, from the cache.
    pub fn chunk(&self, chunk_id: u64) -> Result<ChunkRecord> {
        self.cache.chunk(chunk_id)
    }

    /// Stream all chunk entries in ascending order.
    ///
    /// A blocking producer task walks the cache and hands entries over a
    /// single-slot channel, so decoding overlaps with the consumer's file
    /// I/O without reordering anything.
    pub fn iter_chunks(&self) -> Result<ChunkStream> {
        let count = self.cache.chunk_count()?;
        let (tx, rx) = mpsc::channel(1);

        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            let walk = cache.for_each_chunk(|entry| {
                tx.blocking_send(Ok(entry))
                    .map_err(|_| Error::cache("chunk stream receiver dropped"))
            });
            if let Err(e) = walk {
                let _ = tx.blocking_send(Err(e));
            }
        });

        Ok(ChunkStream::new(count, rx))
    }

    /// Read up to one chunk of raw bytes starting at `filepos`.
    pub async fn read_chunk_data(&mut self, filepos: u64) -> Result<(Bytes, usize)> {
        self.file
            .seek(std::io::SeekFrom::Start(filepos))
            .await
            .map_err(|e| Error::io(format!("seeking {}", self.path.display()), e))?;

        let mut buf = vec![0u8; self.chunksize as usize];
        let n = read_full(&mut self.file, &mut buf)
            .await
            .map_err(|e| Error::io(format!("reading {}", self.path.display()), e))?;
        buf.truncate(n);

        Ok((Bytes::from(buf), n))
    }

    /// Overwrite exactly `datalen` bytes at `filepos`.
    pub async fn write_chunk_data(&mut self, filepos: u64, data: &[u8], datalen: usize) -> Result<()> {
        self.file
            .seek(std::io::SeekFrom::Start(filepos))
            .await
            .map_err(|e| Error::io(format!("seeking {}", self.path.display()), e))?;

        self.file
            .write_all(&data[..datalen])
            .await
            .map_err(|e| Error::io(format!("writing chunk to {}", self.path.display()), e))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::io(format!("flushing {}", self.path.display()), e))?;

        Ok(())
    }

    /// Close the cache and the file, keeping the cache on disk.
    pub fn close(mut self) -> Result<()> {
        self.cache.close()
    }

    /// Close the cache and the file, then delete the cache file. Targets
    /// call this at the end of a copy to drop their transient cache.
    pub fn close_and_remove(mut self) -> Result<()> {
        self.cache.cleanup()
    }
}

/// Read until the buffer is full or the file ends, tolerating short reads.
async fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
