use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bandwidth::Bandwidth;
use crate::clock::{Clock, SystemClock};
use crate::path::absolutize;
use crate::{Error, Result};

pub const DEFAULT_CHUNK_LEN: usize = 16 * 1024;

/// Waits shorter than this are skipped so that small bursts do not turn
/// into a sleep per chunk.
const MIN_THROTTLE_SLEEP: Duration = Duration::from_millis(10);

/// Copies regular files chunk by chunk, optionally paced to a bandwidth
/// ceiling.
#[derive(Clone)]
pub struct ThrottledCopier {
    chunk_len: usize,
    clock:     Arc<dyn Clock>,
}

impl std::fmt::Debug for ThrottledCopier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottledCopier")
            .field("chunk_len", &self.chunk_len)
            .finish_non_exhaustive()
    }
}

impl Default for ThrottledCopier {
    fn default() -> Self { Self::new() }
}

impl ThrottledCopier {
    pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock::new())) }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            chunk_len: DEFAULT_CHUNK_LEN,
            clock,
        }
    }

    pub fn chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }

    pub fn get_chunk_len(&self) -> usize { self.chunk_len }

    /// Copy file data from `src` to `dest`, creating or truncating `dest`.
    /// Returns the number of bytes copied.
    pub fn copy_file(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        bandwidth: Option<Bandwidth>,
    ) -> Result<u64> {
        let src = src.as_ref();
        let dest = dest.as_ref();

        if same_file(src, dest) {
            return Err(Error::SameFile {
                src:  src.to_path_buf(),
                dest: dest.to_path_buf(),
            });
        }

        for path in [src, dest] {
            if is_named_pipe(path) {
                return Err(Error::SpecialFile(path.to_path_buf()));
            }
        }

        let mut reader = File::open(src).map_err(|e| Error::on_read(src, e))?;
        let mut writer = File::create(dest).map_err(|e| Error::Write {
            path:   dest.to_path_buf(),
            source: e,
        })?;

        let throttle = bandwidth.map(|bandwidth| Throttle {
            bandwidth,
            clock: self.clock.as_ref(),
            start: self.clock.now(),
            half_chunk: (self.chunk_len / 2) as u64,
        });

        let mut buf = vec![0u8; self.chunk_len];
        let mut copied = 0u64;

        loop {
            let n = reader.read(&mut buf).map_err(|e| Error::Read {
                path:   src.to_path_buf(),
                source: e,
            })?;
            if n == 0 {
                break;
            }

            writer.write_all(&buf[..n]).map_err(|e| Error::Write {
                path:   dest.to_path_buf(),
                source: e,
            })?;
            copied += n as u64;

            if let Some(throttle) = &throttle {
                throttle.pace(copied);
            }
        }

        writer.flush().map_err(|e| Error::Write {
            path:   dest.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            src = %src.display(),
            dest = %dest.display(),
            bytes = copied,
            bandwidth = ?bandwidth,
            "copied file data"
        );

        Ok(copied)
    }

    /// Copy data and permission bits, like `cp src dest`. If `dest` is a
    /// directory the file keeps its name inside it. Returns the path that
    /// was written.
    pub fn copy(
        &self,
        src: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        bandwidth: Option<Bandwidth>,
    ) -> Result<PathBuf> {
        let src = src.as_ref();
        let mut dest = dest.as_ref().to_path_buf();

        if dest.is_dir() {
            if let Some(name) = src.file_name() {
                dest.push(name);
            }
        }

        self.copy_file(src, &dest, bandwidth)?;
        copy_mode(src, &dest)?;

        Ok(dest)
    }
}

struct Throttle<'a> {
    bandwidth:  Bandwidth,
    clock:      &'a dyn Clock,
    start:      Duration,
    half_chunk: u64,
}

impl Throttle<'_> {
    fn pace(&self, copied: u64) {
        let ideal = self.bandwidth.ideal_elapsed(copied + self.half_chunk);
        let elapsed = self.clock.now().saturating_sub(self.start);

        if let Some(wait) = ideal.checked_sub(elapsed) {
            if wait > MIN_THROTTLE_SLEEP {
                self.clock.sleep(wait);
            }
        }
    }
}

/// Copy permission bits from `src` onto `dest`. No-op where the platform
/// has no mode bits.
pub fn copy_mode(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    #[cfg(unix)]
    {
        let perms = fs::metadata(src)
            .map_err(|e| Error::on_read(src, e))?
            .permissions();
        fs::set_permissions(dest, perms).map_err(|e| Error::Permissions {
            path:   dest.to_path_buf(),
            source: e,
        })?;
    }

    #[cfg(not(unix))]
    let _ = (src, dest);

    Ok(())
}

/// Whether `a` and `b` name the same file. Uses device and inode where
/// both can be stat'ed, otherwise compares normalized absolute paths.
pub fn same_file(a: impl AsRef<Path>, b: impl AsRef<Path>) -> bool {
    let a = a.as_ref();
    let b = b.as_ref();

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        if let (Ok(ma), Ok(mb)) = (fs::metadata(a), fs::metadata(b)) {
            return ma.dev() == mb.dev() && ma.ino() == mb.ino();
        }
    }

    match (absolutize(a, None), absolutize(b, None)) {
        (Ok(pa), Ok(pb)) if cfg!(windows) => {
            pa.to_string_lossy().to_lowercase() == pb.to_string_lossy().to_lowercase()
        }
        (Ok(pa), Ok(pb)) => pa == pb,
        _ => false,
    }
}

#[cfg(unix)]
fn is_named_pipe(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;

    fs::metadata(path)
        .map(|m| m.file_type().is_fifo())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_named_pipe(_path: &Path) -> bool { false }

/// [`ThrottledCopier::copy_file`] on the system clock.
pub fn copy_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    bandwidth: Option<Bandwidth>,
) -> Result<u64> {
    ThrottledCopier::new().copy_file(src, dest, bandwidth)
}

/// [`ThrottledCopier::copy`] on the system clock.
pub fn copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    bandwidth: Option<Bandwidth>,
) -> Result<PathBuf> {
    ThrottledCopier::new().copy(src, dest, bandwidth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::tempdir;

    fn manual() -> (ManualClock, ThrottledCopier) {
        let clock = ManualClock::new();
        let copier = ThrottledCopier::with_clock(Arc::new(clock.clone()));
        (clock, copier)
    }

    #[test]
    fn test_copy_file_contents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        let data: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &data).unwrap();

        let copied = copy_file(&src, &dest, None).unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), data);
        assert!(src.exists());
    }

    #[test]
    fn test_copy_truncates_existing_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("dest.txt");
        fs::write(&src, "short").unwrap();
        fs::write(&dest, "a much longer previous body").unwrap();

        copy_file(&src, &dest, None).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "short");
    }

    #[test]
    fn test_copy_same_path_is_rejected() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("same.txt");
        fs::write(&src, "keep me").unwrap();

        let err = copy_file(&src, &src, None).unwrap_err();
        assert!(matches!(err, Error::SameFile { .. }));
        assert_eq!(fs::read_to_string(&src).unwrap(), "keep me");

        let dotted = dir.path().join(".").join("same.txt");
        assert!(matches!(copy_file(&src, &dotted, None), Err(Error::SameFile { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_onto_hardlink_is_rejected() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("orig.txt");
        let link = dir.path().join("alias.txt");
        fs::write(&src, "shared").unwrap();
        fs::hard_link(&src, &link).unwrap();

        let err = copy_file(&src, &link, None).unwrap_err();
        assert!(matches!(err, Error::SameFile { .. }));
        assert_eq!(fs::read_to_string(&link).unwrap(), "shared");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_named_pipe_is_rejected() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;

        let dir = tempdir().unwrap();
        let fifo = dir.path().join("pipe");
        let regular = dir.path().join("file.txt");
        mkfifo(&fifo, Mode::S_IRWXU).unwrap();
        fs::write(&regular, "x").unwrap();

        assert!(matches!(copy_file(&fifo, &regular, None), Err(Error::SpecialFile(p)) if p == fifo));
        assert!(matches!(copy_file(&regular, &fifo, None), Err(Error::SpecialFile(p)) if p == fifo));
    }

    #[test]
    fn test_copy_missing_source() {
        let dir = tempdir().unwrap();
        let err = copy_file(dir.path().join("nope"), dir.path().join("out"), None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_throttle_paces_chunks() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        fs::write(&src, vec![7u8; 4 * DEFAULT_CHUNK_LEN]).unwrap();

        let (clock, copier) = manual();
        let bandwidth: Bandwidth = "16k".parse().unwrap();
        copier.copy_file(&src, &dest, Some(bandwidth)).unwrap();

        // Chunk n finishes ideally at (n + 0.5) seconds.
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(1500),
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(1),
            ]
        );
        assert_eq!(fs::read(&dest).unwrap().len(), 4 * DEFAULT_CHUNK_LEN);
    }

    #[test]
    fn test_throttle_skips_tiny_waits() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        fs::write(&src, vec![1u8; 3 * DEFAULT_CHUNK_LEN]).unwrap();

        let (clock, copier) = manual();
        copier.copy_file(&src, &dest, Some("1T".parse().unwrap())).unwrap();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_throttle_measures_from_copy_start() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dest = dir.path().join("dest.bin");
        fs::write(&src, vec![1u8; DEFAULT_CHUNK_LEN]).unwrap();

        let (clock, copier) = manual();
        // Time that passed before the copy started is not credited.
        clock.advance(Duration::from_secs(10));
        copier.copy_file(&src, &dest, Some("16k".parse().unwrap())).unwrap();
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(1500)]);
    }

    #[test]
    fn test_unthrottled_copy_never_sleeps() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, vec![0u8; 5 * DEFAULT_CHUNK_LEN]).unwrap();

        let (clock, copier) = manual();
        copier.copy_file(&src, dir.path().join("dest.bin"), None).unwrap();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_copy_into_directory_keeps_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("report.csv");
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, "a,b").unwrap();

        let written = copy(&src, &out, None).unwrap();
        assert_eq!(written, out.join("report.csv"));
        assert_eq!(fs::read_to_string(written).unwrap(), "a,b");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("run.sh");
        let dest = dir.path().join("run-copy.sh");
        fs::write(&src, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o750)).unwrap();

        copy(&src, &dest, None).unwrap();
        assert_eq!(fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o750);
    }
}
