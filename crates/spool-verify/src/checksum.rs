use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::hasher::HashAlgorithm;
use crate::{Result, VerificationError, VerifiedReader};

pub const DEFAULT_CHUNK_LEN: usize = 4 * 1024;

/// Content digest of a file. Used to compare two copies, never as an
/// identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    bytes:     Vec<u8>,
}

impl Checksum {
    pub fn new(algorithm: HashAlgorithm, bytes: Vec<u8>) -> Self { Self { algorithm, bytes } }

    pub fn algorithm(&self) -> HashAlgorithm { self.algorithm }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn to_hex(&self) -> String { hex::encode(&self.bytes) }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Digest everything `reader` yields, pulling `chunk_len` bytes at a time.
pub fn digest_reader<R: Read>(
    reader: R,
    algorithm: HashAlgorithm,
    chunk_len: usize,
) -> io::Result<Checksum> {
    let mut verified = VerifiedReader::new(reader, algorithm.hasher());
    let mut buf = vec![0u8; chunk_len.max(1)];

    loop {
        match verified.read(&mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(Checksum::new(algorithm, verified.finalize()))
}

/// Digest the file at `path` in 4 KiB chunks.
pub fn digest_file(path: impl AsRef<Path>, algorithm: HashAlgorithm) -> Result<Checksum> {
    let path = path.as_ref();
    let io_err = |source| VerificationError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    digest_reader(file, algorithm, DEFAULT_CHUNK_LEN).map_err(io_err)
}

/// Digest `src` and `dest` and fail unless they match. Returns the shared
/// digest.
pub fn verify_copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    algorithm: HashAlgorithm,
) -> Result<Checksum> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    let source_digest = digest_file(src, algorithm)?;
    let destination_digest = digest_file(dest, algorithm)?;

    if source_digest != destination_digest {
        return Err(VerificationError::Mismatch {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source_digest,
            destination_digest,
        });
    }

    tracing::trace!(src = %src.display(), dest = %dest.display(), digest = %source_digest, "copy verified");
    Ok(source_digest)
}
