//! Core domain types for chunksync

use serde::{Deserialize, Serialize};

/// Per-file metadata stored in the cache alongside the chunk records.
///
/// The manifest identifies the file the cache was built from and carries
/// everything a client needs to interpret the chunk records: the digest
/// algorithm, the nominal chunk length and the whole-file checksum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifest {
    /// Basename of the file, without directory
    pub filename: String,

    /// File size in bytes
    pub filesize: u64,

    /// Hex-encoded digest of the whole file, format depends on the algorithm
    pub checksum: String,

    /// Digest algorithm used for chunk and file checksums
    #[serde(rename = "hashalgo")]
    pub hash_algorithm: String,

    /// Nominal chunk length in bytes; the last chunk may be shorter
    pub chunksize: u64,
}

/// One segment of a file: its digest and its actual length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Hex-encoded digest of the chunk bytes
    pub hash: String,

    /// Chunk length in bytes, omitted from JSON when zero
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
}

impl ChunkRecord {
    /// Create a new chunk record
    pub fn new(hash: impl Into<String>, size: u64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }
}

/// A chunk record paired with its position in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Zero-based chunk index
    pub chunk_id: u64,

    /// The chunk details at this index
    pub chunk: ChunkRecord,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serializes_with_stable_field_names() {
        let manifest = FileManifest {
            filename: "data.bin".to_string(),
            filesize: 4096,
            checksum: "44115646e09ab3481adc2b1dc17be10dd9cdaa09".to_string(),
            hash_algorithm: "SHA1".to_string(),
            chunksize: 1024,
        };

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"filename\":\"data.bin\""));
        assert!(json.contains("\"filesize\":4096"));
        assert!(json.contains("\"hashalgo\":\"SHA1\""));
        assert!(json.contains("\"chunksize\":1024"));
    }

    #[test]
    fn manifest_roundtrip() {
        let manifest = FileManifest {
            filename: "large.iso".to_string(),
            filesize: 202020202,
            checksum: "9940b28d7ec4fcd6cbaa3333a4c3db4c31692d03".to_string(),
            hash_algorithm: "SHA1".to_string(),
            chunksize: 348728,
        };

        let json = serde_json::to_vec(&manifest).unwrap();
        let parsed: FileManifest = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn chunk_record_omits_zero_size() {
        let chunk = ChunkRecord::new("da39a3ee5e6b4b0d3255bfef95601890afd80709", 0);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(!json.contains("size"));

        let parsed: ChunkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.size, 0);
    }

    #[test]
    fn chunk_record_keeps_nonzero_size() {
        let chunk = ChunkRecord::new("00a6ba21da70f3e781567c43a9a22e8923e617c4", 512);
        let json = serde_json::to_string(&chunk).unwrap();
        assert!(json.contains("\"size\":512"));
    }

    #[test]
    fn default_manifest_is_detectable() {
        // An absent manifest deserializes to this; callers detect it through
        // the empty algorithm name and zero file size.
        let manifest = FileManifest::default();
        assert!(manifest.hash_algorithm.is_empty());
        assert_eq!(manifest.filesize, 0);
    }
}
