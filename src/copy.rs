//! Differential copy orchestration
//!
//! A copy walks the source's chunk manifest in order, compares each chunk
//! digest against the freshly built target manifest and overwrites only the
//! chunks that disagree. Afterwards the whole target file is digested once
//! more and checked against the source checksum. The target's cache is
//! transient and removed on every exit path; the source cache stays.

use crate::endpoint::{HttpFile, LocalFile, SourceEndpoint};
use crate::error::{Error, Result};
use crate::hasher::{self, HashAlgorithm};
use crate::progress;
use std::path::Path;
use url::Url;

/// Copy `source_path` onto `target_path`, both on the local filesystem.
///
/// The source must already carry a chunk cache (see `gencache`); the
/// algorithm and chunk size must match the ones the source cache was built
/// with, otherwise verification fails.
pub async fn copy_local_to_local(
    source_path: &Path,
    target_path: &Path,
    algorithm: HashAlgorithm,
    chunksize: u64,
) -> Result<()> {
    let source = LocalFile::open_source(source_path).await?;
    copy_to_local(
        SourceEndpoint::Local(source),
        target_path,
        algorithm,
        chunksize,
    )
    .await
}

/// Copy the file served by the chunk service at `base_url` onto
/// `target_path`.
pub async fn copy_http_to_local(
    base_url: Url,
    target_path: &Path,
    algorithm: HashAlgorithm,
    chunksize: u64,
) -> Result<()> {
    let source = SourceEndpoint::Http(HttpFile::open(base_url)?);
    copy_to_local(source, target_path, algorithm, chunksize).await
}

async fn copy_to_local(
    mut source: SourceEndpoint,
    target_path: &Path,
    algorithm: HashAlgorithm,
    chunksize: u64,
) -> Result<()> {
    let result = copy_from(&mut source, target_path, algorithm, chunksize).await;
    let closed = source.close();
    result.and(closed)
}

async fn copy_from(
    source: &mut SourceEndpoint,
    target_path: &Path,
    algorithm: HashAlgorithm,
    chunksize: u64,
) -> Result<()> {
    tracing::info!(kind = source.kind(), "Loading source cache");
    source.load_cache().await?;

    let source_info = source.file_info().await?;

    let mut target = LocalFile::open_or_create_target(target_path).await?;
    let result = copy_chunks(
        source,
        &mut target,
        &source_info.checksum,
        source_info.filesize,
        algorithm,
        chunksize,
    )
    .await;

    // The target cache is transient; drop it whether the copy succeeded or
    // not.
    let cleanup = target.close_and_remove();
    result.and(cleanup)
}

async fn copy_chunks(
    source: &mut SourceEndpoint,
    target: &mut LocalFile,
    source_checksum: &str,
    source_filesize: u64,
    algorithm: HashAlgorithm,
    chunksize: u64,
) -> Result<()> {
    target.set_filesize(source_filesize).await?;

    tracing::info!(path = %target.path().display(), "Building target file cache");
    target.build_cache(algorithm, chunksize).await?;

    tracing::info!("Copying individual file chunks");
    let mut stream = source.iter_chunks().await?;
    let bar = progress::chunk_bar(stream.count());

    let mut copied: u64 = 0;
    while let Some(entry) = stream.next().await {
        let entry = entry?;
        bar.inc(1);

        let target_chunk = target.chunk(entry.chunk_id)?;
        if entry.chunk.hash == target_chunk.hash {
            continue;
        }

        let filepos = entry.chunk_id * chunksize;
        let (data, datalen) = source.read_chunk_data(entry.chunk_id, chunksize).await?;
        target.write_chunk_data(filepos, &data, datalen).await?;
        copied += 1;
    }
    bar.finish_and_clear();

    tracing::info!(chunks_copied = copied, "Validating checksum");
    let actual = hasher::hash_file(algorithm, target.path())?;
    if actual != source_checksum {
        return Err(Error::VerificationFailed {
            expected: source_checksum.to_string(),
            actual,
        });
    }

    Ok(())
}
