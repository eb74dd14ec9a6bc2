use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{}` and `{}` are the same file", src.display(), dest.display())]
    SameFile { src: PathBuf, dest: PathBuf },

    #[error("`{}` is a named pipe", .0.display())]
    SpecialFile(PathBuf),

    #[error("{reason}: {}", path.display())]
    NotFound { path: PathBuf, reason: &'static str },

    #[error("unrecognized size specification: {0}")]
    InvalidBandwidth(String),

    #[error("failed to read {}", path.display())]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {}", path.display())]
    Remove {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to set permissions on {}", path.display())]
    Permissions {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            path:   path.into(),
            reason: "file does not exist",
        }
    }

    pub fn not_regular(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            path:   path.into(),
            reason: "not a regular file",
        }
    }

    /// Maps a failed open of `path` onto `NotFound` when the OS says so.
    pub(crate) fn on_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::not_found(path),
            _ => Self::Read { path, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
