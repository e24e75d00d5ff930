//! chunksync - chunk-cache based differential file synchronization
//!
//! This library synchronizes one file onto another by comparing per-chunk
//! digests stored in persistent chunk caches and transferring only the
//! chunks that differ. Sources can be local files or remote chunk services
//! reached over HTTP; targets are always local.

pub mod cache;
pub mod cli;
pub mod config;
pub mod copy;
pub mod endpoint;
pub mod error;
pub mod hasher;
pub mod progress;
pub mod server;
pub mod types;
pub mod uri;

pub use config::Config;
pub use error::{Error, Result};
pub use hasher::HashAlgorithm;
pub use types::{ChunkEntry, ChunkRecord, FileManifest};
