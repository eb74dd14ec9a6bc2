use std::io;
use std::path::PathBuf;

use crate::Checksum;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(
        "checksum mismatch: {} has {source_digest}, {} has {destination_digest}",
        src.display(),
        dest.display()
    )]
    Mismatch {
        src:                PathBuf,
        dest:               PathBuf,
        source_digest:      Checksum,
        destination_digest: Checksum,
    },

    #[error("failed to read {} for hashing", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VerificationError>;
