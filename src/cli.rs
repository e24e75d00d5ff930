//! CLI argument parsing for chunksync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chunksync - chunk-cache based differential file synchronization
#[derive(Parser, Debug)]
#[command(name = "chunksync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy a source file onto a target, transferring only changed chunks
    Copy(CopyArgs),

    /// (Re-)build the chunk cache for a local file
    Gencache(GencacheArgs),

    /// Serve a local file and its chunk cache over HTTP
    Serve(ServeArgs),
}

/// Arguments for the copy command
#[derive(Parser, Debug)]
pub struct CopyArgs {
    /// Source file: a local path or the http:// base URL of a chunk service
    pub source: String,

    /// Target file on the local filesystem
    pub target: String,

    /// Size of the individual chunks in bytes
    #[arg(long)]
    pub chunksize: Option<u64>,

    /// Hash algorithm for chunk checksums (md5, sha1, sha256)
    #[arg(long = "hash-algorithm")]
    pub hash_algorithm: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the gencache command
#[derive(Parser, Debug)]
pub struct GencacheArgs {
    /// File to build the chunk cache for
    pub filename: PathBuf,

    /// Size of the individual chunks in bytes
    #[arg(long)]
    pub chunksize: Option<u64>,

    /// Hash algorithm for chunk checksums (md5, sha1, sha256)
    #[arg(long = "hash-algorithm")]
    pub hash_algorithm: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// File to serve; its chunk cache must already exist
    pub filename: PathBuf,

    /// Listen address, e.g. 0.0.0.0:8000
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

/// Merge a config file with command-line overrides.
pub fn resolve_config(
    config_path: Option<&PathBuf>,
    chunksize: Option<u64>,
    hash_algorithm: Option<&String>,
    listen: Option<&String>,
) -> crate::config::Config {
    let mut config = match config_path {
        Some(path) => crate::config::Config::load_from(path).unwrap_or_default(),
        None => crate::config::Config::load().unwrap_or_default(),
    };

    if let Some(chunksize) = chunksize {
        config.chunksize = chunksize;
    }
    if let Some(algorithm) = hash_algorithm {
        config.hash_algorithm = algorithm.clone();
    }
    if let Some(listen) = listen {
        config.listen = listen.clone();
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_win_over_defaults() {
        let config = resolve_config(
            None,
            Some(2048),
            Some(&"md5".to_string()),
            Some(&"127.0.0.1:9999".to_string()),
        );
        assert_eq!(config.chunksize, 2048);
        assert_eq!(config.hash_algorithm, "md5");
        assert_eq!(config.listen, "127.0.0.1:9999");
    }

    #[test]
    fn absent_overrides_keep_defaults() {
        let config = resolve_config(None, None, None, None);
        assert_eq!(config.chunksize, crate::config::DEFAULT_CHUNK_SIZE);
        assert_eq!(
            config.hash_algorithm,
            crate::config::DEFAULT_HASH_ALGORITHM
        );
    }
}
