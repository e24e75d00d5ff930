//! Remote chunk-service source endpoint
//!
//! Read-only counterpart of the local endpoint, speaking the chunk-service
//! protocol: every operation is a `GET {base}/{method}[/{arg}]` whose body is
//! JSON, except chunk data which arrives as an octet stream bounded by the
//! `X-ChunkLength` header.

use crate::error::{Error, Result};
use crate::server::CHUNK_LENGTH_HEADER;
use crate::types::{ChunkEntry, ChunkRecord, FileManifest};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::ChunkStream;

/// How long idle connections to the chunk service are kept alive
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// A remote file exposed by a chunk service.
pub struct HttpFile {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpFile {
    /// Create a client for the chunk service at `base_url`.
    pub fn open(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(IDLE_TIMEOUT)
            .build()
            .map_err(|e| Error::remote(format!("building HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// The remote serves its manifest directly; there is no cache to load.
    pub fn load_cache(&self) -> Result<()> {
        Ok(())
    }

    /// Caches can only be built where the file lives.
    pub fn build_cache(&self) -> Result<()> {
        Err(Error::Unsupported {
            operation: "building a cache for a remote source",
        })
    }

    /// Fetch the manifest from `GET /GetFileInfo`.
    pub async fn file_info(&self) -> Result<FileManifest> {
        let body = self.fetch("GetFileInfo").await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::remote(format!("decoding file info: {}", e)))
    }

    /// Fetch one chunk record from `GET /GetChunk/{id}`.
    pub async fn chunk(&self, chunk_id: u64) -> Result<ChunkRecord> {
        let body = self.fetch(&format!("GetChunk/{}", chunk_id)).await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::remote(format!("decoding chunk {}: {}", chunk_id, e)))
    }

    /// Fetch the full chunk list from `GET /GetAllChunks` and replay it in
    /// server order over a stream.
    pub async fn iter_chunks(&self) -> Result<ChunkStream> {
        let body = self.fetch("GetAllChunks").await?;
        let entries: Vec<ChunkEntry> = serde_json::from_slice(&body)
            .map_err(|e| Error::remote(format!("decoding chunk list: {}", e)))?;

        let count = entries.len() as u64;
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for entry in entries {
                if tx.send(Ok(entry)).await.is_err() {
                    break;
                }
            }
        });

        Ok(ChunkStream::new(count, rx))
    }

    /// Fetch the raw bytes of chunk `chunk_id` from
    /// `GET /ReadChunkData/{id}`. The remote addresses data by chunk index,
    /// not byte offset.
    pub async fn read_chunk_data(&self, chunk_id: u64) -> Result<(Bytes, usize)> {
        let body = self.fetch(&format!("ReadChunkData/{}", chunk_id)).await?;
        let len = body.len();
        Ok((body, len))
    }

    /// Nothing to release for a remote connection.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    fn request_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), method)
    }

    async fn fetch(&self, method: &str) -> Result<Bytes> {
        let url = self.request_url(method);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::remote(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::remote(format!("GET {}: status {}", url, status)));
        }

        // The chunk-length header bounds the meaningful prefix of the body.
        let chunk_length = response
            .headers()
            .get(CHUNK_LENGTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        let mut body = response
            .bytes()
            .await
            .map_err(|e| Error::remote(format!("GET {}: reading body: {}", url, e)))?;

        if let Some(len) = chunk_length {
            if len <= body.len() {
                body.truncate(len);
            }
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_joins_method_paths() {
        let file = HttpFile::open(Url::parse("http://localhost:8000").unwrap()).unwrap();
        assert_eq!(
            file.request_url("GetFileInfo"),
            "http://localhost:8000/GetFileInfo"
        );
        assert_eq!(
            file.request_url("GetChunk/17"),
            "http://localhost:8000/GetChunk/17"
        );
    }

    #[test]
    fn request_url_tolerates_trailing_slash() {
        let file = HttpFile::open(Url::parse("http://localhost:8000/").unwrap()).unwrap();
        assert_eq!(
            file.request_url("GetAllChunks"),
            "http://localhost:8000/GetAllChunks"
        );
    }

    #[test]
    fn build_cache_is_unsupported() {
        let file = HttpFile::open(Url::parse("http://localhost:8000").unwrap()).unwrap();
        assert!(matches!(
            file.build_cache(),
            Err(Error::Unsupported { .. })
        ));
    }
}
