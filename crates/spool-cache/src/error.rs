use std::io;
use std::path::PathBuf;

use spool_verify::VerificationError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot flush temp file, it does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot resolve a temporary file name for {} after {attempts} attempts", name.display())]
    NameResolution { name: PathBuf, attempts: u32 },

    #[error("cannot derive a file name from {}", .0.display())]
    InvalidName(PathBuf),

    #[error(transparent)]
    Fs(#[from] spool_fs::Error),

    #[error(transparent)]
    Checksum(#[from] VerificationError),

    #[error("failed to remove {}", path.display())]
    Remove {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create temp directory {}", path.display())]
    TempDir {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read config {}", path.display())]
    ConfigRead {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid cache config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Outcome of a scoped unit of work that did not complete cleanly.
///
/// Neither the body's error nor a flush error is ever dropped: when both
/// happen, both are returned.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError<E> {
    #[error("scope body failed")]
    Body(E),

    #[error("flush failed")]
    Flush(#[source] CacheError),

    #[error("scope body failed and the flush that followed failed too: {flush}")]
    BodyAndFlush {
        body:  E,
        #[source]
        flush: CacheError,
    },
}

impl<E> ScopeError<E> {
    /// The error returned by the scope body, if it failed.
    pub fn into_body(self) -> Option<E> {
        match self {
            ScopeError::Body(body) | ScopeError::BodyAndFlush { body, .. } => Some(body),
            ScopeError::Flush(_) => None,
        }
    }

    pub fn flush_error(&self) -> Option<&CacheError> {
        match self {
            ScopeError::Flush(flush) | ScopeError::BodyAndFlush { flush, .. } => Some(flush),
            ScopeError::Body(_) => None,
        }
    }
}
