//! Persistent chunk cache backed by an embedded transactional store
//!
//! Each cache file holds exactly one [`FileManifest`] plus one record per
//! chunk. Two tables are used: `info` with a single fixed key, and `chunks`
//! keyed by 8-byte big-endian chunk indices. Big-endian keys sort
//! lexicographically in numeric order, so iteration yields chunks strictly
//! ascending by index. Values are UTF-8 JSON.
//!
//! The big-endian key encoding and the JSON field names are the on-disk
//! contract; a cache written by one build of this tool stays readable by the
//! next.

use crate::error::{Error, Result};
use crate::types::{ChunkEntry, ChunkRecord, FileManifest};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const INFO_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("info");
const CHUNKS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("chunks");

/// Key of the single manifest record in the info table
const INFO_KEY: &[u8] = b"info";

/// How long `open` retries before giving up on a locked cache file
const OPEN_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A persistent chunk cache for one file.
///
/// Created closed; [`open`](ChunkCache::open) attaches it to an on-disk
/// store. The cache is owned by the endpoint that opened it and must be
/// closed exactly once: [`close`](ChunkCache::close) keeps the file on disk,
/// [`cleanup`](ChunkCache::cleanup) removes it.
#[derive(Clone, Default)]
pub struct ChunkCache {
    db: Option<Arc<Database>>,
    path: Option<PathBuf>,
}

impl ChunkCache {
    /// Create a new, unopened cache handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) the cache database at `base`, appending a `.db`
    /// suffix. Both tables are guaranteed to exist afterwards.
    ///
    /// A cache file may be held by at most one process; contention is
    /// retried for up to five seconds before failing.
    pub fn open(&mut self, base: &Path) -> Result<()> {
        let mut os = base.as_os_str().to_os_string();
        os.push(".db");
        let path = PathBuf::from(os);

        // Reuse an already open database; dropping it first would race our
        // own file lock.
        if self.db.is_some() && self.path.as_deref() == Some(path.as_path()) {
            return Ok(());
        }
        self.db = None;

        let deadline = Instant::now() + OPEN_LOCK_TIMEOUT;
        let db = loop {
            match Database::create(&path) {
                Ok(db) => break db,
                Err(e) if is_locked(&e) => {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout { path });
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(Error::cache(format!(
                        "failed to open cache database {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        };

        let tx = db
            .begin_write()
            .map_err(|e| Error::cache(format!("begin transaction: {}", e)))?;
        tx.open_table(INFO_TABLE)
            .map_err(|e| Error::cache(format!("create info table: {}", e)))?;
        tx.open_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("create chunks table: {}", e)))?;
        tx.commit()
            .map_err(|e| Error::cache(format!("commit table creation: {}", e)))?;

        tracing::debug!(path = %path.display(), "Opened chunk cache");
        self.db = Some(Arc::new(db));
        self.path = Some(path);
        Ok(())
    }

    /// Close the cache, releasing the file lock. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.db = None;
        Ok(())
    }

    /// Close the cache and delete its on-disk file.
    pub fn cleanup(&mut self) -> Result<()> {
        self.close()?;
        if let Some(path) = self.path.take() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::io(format!("deleting cache {}", path.display()), e))?;
        }
        Ok(())
    }

    /// Path of the on-disk database, if opened.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn db(&self) -> Result<&Database> {
        self.db
            .as_deref()
            .ok_or_else(|| Error::cache("cache database is not open"))
    }

    /// Remove all stored chunks atomically by dropping and recreating the
    /// chunks table.
    pub fn clear_chunks(&self) -> Result<()> {
        let tx = self
            .db()?
            .begin_write()
            .map_err(|e| Error::cache(format!("begin transaction: {}", e)))?;
        tx.delete_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("drop chunks table: {}", e)))?;
        tx.open_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("recreate chunks table: {}", e)))?;
        tx.commit()
            .map_err(|e| Error::cache(format!("commit chunk clear: {}", e)))?;
        Ok(())
    }

    /// Read the stored manifest.
    ///
    /// An absent manifest decodes to [`FileManifest::default`]; callers
    /// detect that through the empty algorithm name or zero file size. A
    /// present but undecodable manifest is a corrupt-cache error.
    pub fn manifest(&self) -> Result<FileManifest> {
        let tx = self
            .db()?
            .begin_read()
            .map_err(|e| Error::cache(format!("begin read transaction: {}", e)))?;
        let table = tx
            .open_table(INFO_TABLE)
            .map_err(|e| Error::cache(format!("open info table: {}", e)))?;

        let Some(value) = table
            .get(INFO_KEY)
            .map_err(|e| Error::cache(format!("read manifest: {}", e)))?
        else {
            return Ok(FileManifest::default());
        };

        serde_json::from_slice(value.value())
            .map_err(|e| Error::corrupt(format!("manifest does not decode: {}", e)))
    }

    /// Store the manifest, replacing any previous one.
    pub fn put_manifest(&self, manifest: &FileManifest) -> Result<()> {
        let data = serde_json::to_vec(manifest)
            .map_err(|e| Error::cache(format!("serialize manifest: {}", e)))?;

        let tx = self
            .db()?
            .begin_write()
            .map_err(|e| Error::cache(format!("begin transaction: {}", e)))?;
        {
            let mut table = tx
                .open_table(INFO_TABLE)
                .map_err(|e| Error::cache(format!("open info table: {}", e)))?;
            table
                .insert(INFO_KEY, data.as_slice())
                .map_err(|e| Error::cache(format!("store manifest: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| Error::cache(format!("commit manifest: {}", e)))?;
        Ok(())
    }

    /// Look up the chunk record stored under `chunk_id`.
    pub fn chunk(&self, chunk_id: u64) -> Result<ChunkRecord> {
        let tx = self
            .db()?
            .begin_read()
            .map_err(|e| Error::cache(format!("begin read transaction: {}", e)))?;
        let table = tx
            .open_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("open chunks table: {}", e)))?;

        let key = chunk_id.to_be_bytes();
        let Some(value) = table
            .get(key.as_slice())
            .map_err(|e| Error::cache(format!("read chunk {}: {}", chunk_id, e)))?
        else {
            return Err(Error::ChunkNotFound { chunk_id });
        };

        serde_json::from_slice(value.value())
            .map_err(|e| Error::corrupt(format!("chunk {} does not decode: {}", chunk_id, e)))
    }

    /// Store a chunk record under `chunk_id`.
    pub fn put_chunk(&self, chunk_id: u64, chunk: &ChunkRecord) -> Result<()> {
        let data = serde_json::to_vec(chunk)
            .map_err(|e| Error::cache(format!("serialize chunk {}: {}", chunk_id, e)))?;

        let tx = self
            .db()?
            .begin_write()
            .map_err(|e| Error::cache(format!("begin transaction: {}", e)))?;
        {
            let mut table = tx
                .open_table(CHUNKS_TABLE)
                .map_err(|e| Error::cache(format!("open chunks table: {}", e)))?;
            let key = chunk_id.to_be_bytes();
            table
                .insert(key.as_slice(), data.as_slice())
                .map_err(|e| Error::cache(format!("store chunk {}: {}", chunk_id, e)))?;
        }
        tx.commit()
            .map_err(|e| Error::cache(format!("commit chunk {}: {}", chunk_id, e)))?;
        Ok(())
    }

    /// Number of stored chunks.
    pub fn chunk_count(&self) -> Result<u64> {
        let tx = self
            .db()?
            .begin_read()
            .map_err(|e| Error::cache(format!("begin read transaction: {}", e)))?;
        let table = tx
            .open_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("open chunks table: {}", e)))?;
        table
            .len()
            .map_err(|e| Error::cache(format!("count chunks: {}", e)))
    }

    /// Walk all chunks in ascending chunk-id order, passing each entry to
    /// the sink. Sink errors abort the walk and propagate.
    pub fn for_each_chunk(&self, mut sink: impl FnMut(ChunkEntry) -> Result<()>) -> Result<()> {
        let tx = self
            .db()?
            .begin_read()
            .map_err(|e| Error::cache(format!("begin read transaction: {}", e)))?;
        let table = tx
            .open_table(CHUNKS_TABLE)
            .map_err(|e| Error::cache(format!("open chunks table: {}", e)))?;

        for item in table
            .iter()
            .map_err(|e| Error::cache(format!("iterate chunks: {}", e)))?
        {
            let (key, value) = item.map_err(|e| Error::cache(format!("iterate chunks: {}", e)))?;

            let raw: [u8; 8] = key
                .value()
                .try_into()
                .map_err(|_| Error::corrupt("chunk key is not 8 bytes"))?;
            let chunk_id = u64::from_be_bytes(raw);

            let chunk: ChunkRecord = serde_json::from_slice(value.value()).map_err(|e| {
                Error::corrupt(format!("chunk {} does not decode: {}", chunk_id, e))
            })?;

            sink(ChunkEntry { chunk_id, chunk })?;
        }

        Ok(())
    }
}

fn is_locked(err: &redb::DatabaseError) -> bool {
    match err {
        redb::DatabaseError::DatabaseAlreadyOpen => true,
        redb::DatabaseError::Storage(redb::StorageError::Io(io)) => {
            io.kind() == std::io::ErrorKind::WouldBlock
        }
        _ => false,
    }
}
