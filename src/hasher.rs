//! Chunk and whole-file digest computation
//!
//! Every cache build owns one [`ChunkHasher`]: per-chunk digests are computed
//! independently while the same bytes feed a running whole-file digest. The
//! running digest therefore equals the digest of streaming the file once, as
//! long as chunks are hashed in file order.

use crate::error::{Error, Result};
use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::io::Read;
use std::path::Path;

/// Digest algorithms recognized in cache manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Parse an algorithm name, case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(Error::UnsupportedAlgorithm {
                name: name.to_string(),
            }),
        }
    }

    /// Canonical algorithm name as stored in manifests.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    /// Create a fresh hasher for this algorithm.
    pub fn hasher(&self) -> ChunkHasher {
        ChunkHasher::new(*self)
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

enum FileDigest {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

/// Stateful digest provider for one cache build.
///
/// Holds the running whole-file digest; do not share one instance between
/// two builds.
pub struct ChunkHasher {
    algorithm: HashAlgorithm,
    file_digest: FileDigest,
}

impl ChunkHasher {
    /// Create a hasher with an empty running digest.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let file_digest = match algorithm {
            HashAlgorithm::Md5 => FileDigest::Md5(Md5::new()),
            HashAlgorithm::Sha1 => FileDigest::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => FileDigest::Sha256(Sha256::new()),
        };
        Self {
            algorithm,
            file_digest,
        }
    }

    /// The algorithm this hasher computes.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Canonical algorithm name for the manifest.
    pub fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Digest one chunk and feed the same bytes to the running file digest.
    pub fn hash_chunk(&mut self, data: &[u8]) -> String {
        match &mut self.file_digest {
            FileDigest::Md5(d) => {
                d.update(data);
                hex::encode(Md5::digest(data))
            }
            FileDigest::Sha1(d) => {
                d.update(data);
                hex::encode(Sha1::digest(data))
            }
            FileDigest::Sha256(d) => {
                d.update(data);
                hex::encode(Sha256::digest(data))
            }
        }
    }

    /// Finalize the running whole-file digest without consuming the hasher.
    pub fn file_hash(&self) -> String {
        match &self.file_digest {
            FileDigest::Md5(d) => hex::encode(d.clone().finalize()),
            FileDigest::Sha1(d) => hex::encode(d.clone().finalize()),
            FileDigest::Sha256(d) => hex::encode(d.clone().finalize()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match &mut self.file_digest {
            FileDigest::Md5(d) => d.update(data),
            FileDigest::Sha1(d) => d.update(data),
            FileDigest::Sha256(d) => d.update(data),
        }
    }
}

/// Standalone digest of an entire file, independent of any running state.
///
/// Used for post-copy verification of the target file.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| Error::io(format!("opening {} for hashing", path.display()), e))?;

    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| Error::io(format!("reading {} for hashing", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.file_hash())
}
