//! Integration tests for the chunk service and HTTP-sourced copies

use chunksync::copy::{copy_http_to_local, copy_local_to_local};
use chunksync::endpoint::{HttpFile, LocalFile};
use chunksync::hasher::{hash_file, HashAlgorithm};
use chunksync::server::ChunkService;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::net::TcpListener;
use url::Url;

fn create_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

async fn build_source_cache(path: &Path, algorithm: HashAlgorithm, chunksize: u64) {
    let mut source = LocalFile::open_source(path).await.unwrap();
    source.build_cache(algorithm, chunksize).await.unwrap();
    source.close().unwrap();
}

/// Serve `path` on an ephemeral port, returning the bound address.
async fn spawn_service(path: &Path) -> SocketAddr {
    let service = ChunkService::open(path).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(service.serve(listener));
    addr
}

fn base_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("http://{}", addr)).unwrap()
}

#[tokio::test]
async fn served_file_info_matches_cache() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"testdata");
    build_source_cache(&source, HashAlgorithm::Sha1, 2).await;
    let addr = spawn_service(&source).await;

    let remote = HttpFile::open(base_url(addr)).unwrap();
    let info = remote.file_info().await.unwrap();

    assert_eq!(info.filename, "served.bin");
    assert_eq!(info.filesize, 8);
    assert_eq!(info.chunksize, 2);
    assert_eq!(info.hash_algorithm, "SHA1");
    assert_eq!(info.checksum, "44115646e09ab3481adc2b1dc17be10dd9cdaa09");
}

#[tokio::test]
async fn served_chunks_arrive_in_order() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"123456789");
    build_source_cache(&source, HashAlgorithm::Sha1, 4).await;
    let addr = spawn_service(&source).await;

    let remote = HttpFile::open(base_url(addr)).unwrap();
    let mut stream = remote.iter_chunks().await.unwrap();
    assert_eq!(stream.count(), 3);

    let mut entries = Vec::new();
    while let Some(entry) = stream.next().await {
        entries.push(entry.unwrap());
    }

    let ids: Vec<u64> = entries.iter().map(|e| e.chunk_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(entries[0].chunk.size, 4);
    assert_eq!(entries[2].chunk.size, 1);
}

#[tokio::test]
async fn served_chunk_lookup() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"testdata");
    build_source_cache(&source, HashAlgorithm::Sha1, 2).await;
    let addr = spawn_service(&source).await;

    let remote = HttpFile::open(base_url(addr)).unwrap();
    let chunk = remote.chunk(1).await.unwrap();
    // sha1("st")
    assert_eq!(chunk.hash, "9b02d9974c14e623c9ffbed7360beacbf0dcb95f");
    assert_eq!(chunk.size, 2);
}

#[tokio::test]
async fn served_chunk_data_honors_chunk_length_header() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"123456789");
    build_source_cache(&source, HashAlgorithm::Sha1, 4).await;
    let addr = spawn_service(&source).await;

    let remote = HttpFile::open(base_url(addr)).unwrap();

    let (data, n) = remote.read_chunk_data(0).await.unwrap();
    assert_eq!(n, 4);
    assert_eq!(&data[..], b"1234");

    // The final chunk is short; X-ChunkLength bounds the body.
    let (data, n) = remote.read_chunk_data(2).await.unwrap();
    assert_eq!(n, 1);
    assert_eq!(&data[..], b"9");
}

#[tokio::test]
async fn malformed_chunk_index_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"testdata");
    build_source_cache(&source, HashAlgorithm::Sha1, 2).await;
    let addr = spawn_service(&source).await;

    let response = reqwest::get(format!("http://{}/GetChunk/notanumber", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_chunk_is_internal_error() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"testdata");
    build_source_cache(&source, HashAlgorithm::Sha1, 2).await;
    let addr = spawn_service(&source).await;

    let response = reqwest::get(format!("http://{}/GetChunk/999", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn chunk_data_response_headers() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"123456789");
    build_source_cache(&source, HashAlgorithm::Sha1, 4).await;
    let addr = spawn_service(&source).await;

    let response = reqwest::get(format!("http://{}/ReadChunkData/2", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/octet-stream"
    );
    assert_eq!(response.headers().get("x-chunklength").unwrap(), "1");
}

#[tokio::test]
async fn http_copy_reproduces_the_source() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..50_000u32).map(|i| (i % 239) as u8).collect();
    let source = create_file(&dir, "served.bin", &content);
    build_source_cache(&source, HashAlgorithm::Sha1, 4096).await;
    let addr = spawn_service(&source).await;

    let target = dir.path().join("target.bin");
    copy_http_to_local(base_url(addr), &target, HashAlgorithm::Sha1, 4096)
        .await
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), content);
    assert_eq!(
        hash_file(HashAlgorithm::Sha1, &source).unwrap(),
        hash_file(HashAlgorithm::Sha1, &target).unwrap()
    );
}

#[tokio::test]
async fn http_copy_of_single_megabyte_chunk() {
    let dir = TempDir::new().unwrap();
    // One million bytes with a 1 MiB chunk size: the whole file is a single
    // short chunk.
    let content: Vec<u8> = (0..1_000_000u32).map(|i| (i % 253) as u8).collect();
    let source = create_file(&dir, "served.bin", &content);
    build_source_cache(&source, HashAlgorithm::Sha1, 1024 * 1024).await;
    let addr = spawn_service(&source).await;

    let remote = HttpFile::open(base_url(addr)).unwrap();
    assert_eq!(remote.iter_chunks().await.unwrap().count(), 1);

    let target = dir.path().join("target.bin");
    copy_http_to_local(base_url(addr), &target, HashAlgorithm::Sha1, 1024 * 1024)
        .await
        .unwrap();

    assert_eq!(
        hash_file(HashAlgorithm::Sha1, &source).unwrap(),
        hash_file(HashAlgorithm::Sha1, &target).unwrap()
    );
}

#[tokio::test]
async fn http_copy_updates_stale_target() {
    let dir = TempDir::new().unwrap();
    let source = create_file(&dir, "served.bin", b"aaaabbbbccccdd");
    let target = create_file(&dir, "target.bin", b"aaaaXXXXccccdd");
    build_source_cache(&source, HashAlgorithm::Sha1, 4).await;
    let addr = spawn_service(&source).await;

    copy_http_to_local(base_url(addr), &target, HashAlgorithm::Sha1, 4)
        .await
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"aaaabbbbccccdd");
}

#[tokio::test]
async fn http_copy_matches_local_copy() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..10_000u32).map(|i| (i % 71) as u8).collect();
    let source = create_file(&dir, "source.bin", &content);
    build_source_cache(&source, HashAlgorithm::Sha256, 1024).await;

    // Local copy first so the source cache lock is free again before the
    // service takes it.
    let local_target = dir.path().join("local_target.bin");
    copy_local_to_local(&source, &local_target, HashAlgorithm::Sha256, 1024)
        .await
        .unwrap();

    let addr = spawn_service(&source).await;
    let http_target = dir.path().join("http_target.bin");
    copy_http_to_local(base_url(addr), &http_target, HashAlgorithm::Sha256, 1024)
        .await
        .unwrap();

    assert_eq!(
        fs::read(&local_target).unwrap(),
        fs::read(&http_target).unwrap()
    );
}

#[tokio::test]
async fn copy_from_unreachable_service_fails() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("target.bin");

    // Nothing listens on this port.
    let url = Url::parse("http://127.0.0.1:1/").unwrap();
    let result = copy_http_to_local(url, &target, HashAlgorithm::Sha1, 4).await;
    assert!(result.is_err());
}
