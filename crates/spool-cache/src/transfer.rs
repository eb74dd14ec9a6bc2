use std::io;
use std::path::Path;

use spool_fs::{Bandwidth, ThrottledCopier, copy_mode};

/// Filesystem side of a flush: moving the bytes of one temp file to its
/// destination, and deleting files afterwards. The cache retries and
/// validates around whatever this does.
pub trait Transfer: Send + Sync {
    /// Write `src` to exactly `dest`. A directory at `dest` is an error.
    fn transfer(&self, src: &Path, dest: &Path, bandwidth: Option<Bandwidth>) -> spool_fs::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()> { std::fs::remove_file(path) }
}

impl Transfer for ThrottledCopier {
    fn transfer(&self, src: &Path, dest: &Path, bandwidth: Option<Bandwidth>) -> spool_fs::Result<()> {
        self.copy_file(src, dest, bandwidth)?;
        copy_mode(src, dest)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use spool_fs::ManualClock;
    use tempfile::tempdir;

    #[test]
    fn test_transfer_never_redirects_into_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("outdir");
        std::fs::write(&src, "data").unwrap();
        std::fs::create_dir(&dest).unwrap();

        let copier = ThrottledCopier::with_clock(Arc::new(ManualClock::new()));
        let err = copier.transfer(&src, &dest, None).unwrap_err();

        assert!(matches!(err, spool_fs::Error::Write { .. }), "{err:?}");
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }
}
