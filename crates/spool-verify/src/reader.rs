use std::io::{self, Read};

use crate::Hasher;

/// Streaming reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    bytes:  u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self {
            reader,
            hasher,
            bytes: 0,
        }
    }

    /// Bytes hashed so far.
    pub fn bytes_read(&self) -> u64 { self.bytes }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    /// Consume the reader and return the digest of everything read.
    pub fn finalize(self) -> Vec<u8> { self.hasher.finalize() }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes += n as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Md5Hasher, Sha256Hasher};
    use std::io::Cursor;

    #[test]
    fn test_verified_reader_hashes_what_it_reads() {
        let data = b"test data for verification";
        let mut verified = VerifiedReader::new(Cursor::new(data), Sha256Hasher::new());

        let mut sink = Vec::new();
        io::copy(&mut verified, &mut sink).unwrap();

        assert_eq!(sink, data);
        assert_eq!(verified.bytes_read(), data.len() as u64);
        assert_eq!(verified.finalize(), Sha256Hasher::digest(data));
    }

    #[test]
    fn test_partial_read_hashes_prefix_only() {
        let data = b"0123456789";
        let mut verified = VerifiedReader::new(Cursor::new(data), Md5Hasher::new());

        let mut buf = [0u8; 4];
        verified.read_exact(&mut buf).unwrap();

        assert_eq!(verified.finalize(), Md5Hasher::digest(b"0123"));
    }
}
