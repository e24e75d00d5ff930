//! Location parsing for copy sources and targets

use crate::error::{Error, Result};
use std::path::PathBuf;
use url::Url;

/// A copy location - a local file or a remote chunk service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path
    Local(PathBuf),

    /// Base URL of a chunk service
    Http(Url),
}

impl Location {
    /// Parse a location string into a Location enum
    pub fn parse(s: &str) -> Result<Self> {
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| Error::InvalidLocation {
                location: s.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Location::Http(url));
        }

        Ok(Location::Local(PathBuf::from(s)))
    }

    /// Check if this location is local
    pub fn is_local(&self) -> bool {
        matches!(self, Location::Local(_))
    }

    /// Check if this location is remote
    pub fn is_remote(&self) -> bool {
        !self.is_local()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Http(url) => write!(f, "{}", url),
        }
    }
}
