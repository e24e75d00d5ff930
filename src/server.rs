//! Chunk-service HTTP server
//!
//! Exposes a local source file and its chunk cache to remote clients:
//!
//! | Route                | Body                                       |
//! |----------------------|--------------------------------------------|
//! | `GET /GetFileInfo`   | JSON manifest                              |
//! | `GET /GetChunk/{n}`  | JSON chunk record                          |
//! | `GET /GetAllChunks`  | JSON array of chunk entries, ascending     |
//! | `GET /ReadChunkData/{n}` | raw chunk bytes, `X-ChunkLength` header |
//!
//! Chunk data is addressed by chunk index; the byte offset is derived from
//! the manifest's chunk size.

use crate::endpoint::LocalFile;
use crate::error::{Error, Result};
use crate::types::{ChunkEntry, ChunkRecord, FileManifest};
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::timeout::TimeoutLayer;

/// Header bounding the meaningful prefix of a binary chunk body
pub const CHUNK_LENGTH_HEADER: &str = "x-chunklength";

/// Per-request deadline covering both reading and writing
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct ServiceState {
    source: Mutex<LocalFile>,
    manifest: FileManifest,
}

/// A chunk service wrapping one local source file.
pub struct ChunkService {
    state: Arc<ServiceState>,
}

impl ChunkService {
    /// Open `source_path` and its existing chunk cache for serving. The
    /// cache must have been built beforehand.
    pub async fn open(source_path: &Path) -> Result<Self> {
        let mut source = LocalFile::open_source(source_path).await?;
        source.load_cache()?;
        let manifest = source.file_info()?;

        tracing::info!(
            file = %source_path.display(),
            filesize = manifest.filesize,
            chunksize = manifest.chunksize,
            algorithm = manifest.hash_algorithm,
            "Serving chunk cache"
        );

        Ok(Self {
            state: Arc::new(ServiceState {
                source: Mutex::new(source),
                manifest,
            }),
        })
    }

    /// The axum router for this service.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/GetFileInfo", get(get_file_info))
            .route("/GetChunk/:chunkno", get(get_chunk))
            .route("/GetAllChunks", get(get_all_chunks))
            .route("/ReadChunkData/:chunkno", get(read_chunk_data))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
            .with_state(self.state.clone())
    }

    /// Serve requests on an already bound listener until the task is
    /// aborted.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        axum::serve(listener, router)
            .await
            .map_err(|e| Error::io("serving chunk requests", e))?;
        Ok(())
    }
}

/// Serve `source_path` on `listen_addr` until interrupted.
pub async fn serve_file(listen_addr: &str, source_path: &Path) -> Result<()> {
    let service = ChunkService::open(source_path).await?;

    let listener = TcpListener::bind(listen_addr)
        .await
        .map_err(|e| Error::io(format!("binding {}", listen_addr), e))?;

    tracing::info!(addr = %listen_addr, "Waiting for incoming requests");
    service.serve(listener).await
}

type HandlerError = (StatusCode, String);

fn internal(err: Error) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn get_file_info(State(state): State<Arc<ServiceState>>) -> Json<FileManifest> {
    tracing::debug!("Sending file info");
    Json(state.manifest.clone())
}

async fn get_chunk(
    State(state): State<Arc<ServiceState>>,
    AxumPath(chunkno): AxumPath<u64>,
) -> std::result::Result<Json<ChunkRecord>, HandlerError> {
    let source = state.source.lock().await;
    let chunk = source.chunk(chunkno).map_err(internal)?;

    tracing::debug!(chunkno, "Sending chunk");
    Ok(Json(chunk))
}

async fn get_all_chunks(
    State(state): State<Arc<ServiceState>>,
) -> std::result::Result<Json<Vec<ChunkEntry>>, HandlerError> {
    let mut stream = {
        let source = state.source.lock().await;
        source.iter_chunks().map_err(internal)?
    };

    let mut entries = Vec::with_capacity(stream.count() as usize);
    while let Some(entry) = stream.next().await {
        entries.push(entry.map_err(internal)?);
    }

    tracing::debug!(count = entries.len(), "Sending all chunks");
    Ok(Json(entries))
}

async fn read_chunk_data(
    State(state): State<Arc<ServiceState>>,
    AxumPath(chunkno): AxumPath<u64>,
) -> std::result::Result<(StatusCode, HeaderMap, Bytes), HandlerError> {
    // Offsets derive from the manifest's nominal chunk size; the stored
    // per-chunk size only describes the final short chunk.
    let filepos = chunkno * state.manifest.chunksize;

    let (data, datalen) = {
        let mut source = state.source.lock().await;
        source.read_chunk_data(filepos).await.map_err(internal)?
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        HeaderName::from_static(CHUNK_LENGTH_HEADER),
        HeaderValue::from(datalen),
    );

    tracing::debug!(chunkno, bytes = datalen, "Sending chunk data");
    Ok((StatusCode::OK, headers, data))
}
