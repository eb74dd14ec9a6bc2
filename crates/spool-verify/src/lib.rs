//! Content digests for validating file copies.
//!
//! The cache copies a scratch file to its destination and then compares
//! digests of both. Digests are streamed in fixed-size chunks through a
//! [`VerifiedReader`], so identical content always hashes identically no
//! matter how it is read.
//!
//! # Example
//!
//! ```
//! use spool_verify::{HashAlgorithm, digest_reader};
//!
//! let digest = digest_reader(&b"hello world"[..], HashAlgorithm::Md5, 4096).unwrap();
//! assert_eq!(digest.to_hex(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
//! ```

pub use self::checksum::{Checksum, DEFAULT_CHUNK_LEN, digest_file, digest_reader, verify_copy};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{AnyHasher, DigestHasher, HashAlgorithm, Hasher, Md5Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod checksum;
mod error;
mod hasher;
mod reader;
