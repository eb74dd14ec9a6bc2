use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use spool_fs::{Bandwidth, Clock, SystemClock, ThrottledCopier};
use spool_verify::{HashAlgorithm, verify_copy};
use uuid::Uuid;

use crate::retry::{CLEANUP_ATTEMPTS, CLEANUP_PAUSE, backoff_delay};
use crate::{
    CacheEntry, CacheError, CacheOptions, Result, RetryMode, ScopeError, Session, Transfer,
};

/// Temp names tried per registration before giving up.
const NAME_ATTEMPTS: u32 = 3;

const TEMP_SUFFIX: &str = "tmp";

/// Destinations written by a completed flush, in flush order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    flushed: Vec<PathBuf>,
}

impl FlushReport {
    pub fn flushed(&self) -> &[PathBuf] { &self.flushed }

    pub fn len(&self) -> usize { self.flushed.len() }

    pub fn is_empty(&self) -> bool { self.flushed.is_empty() }
}

/// Files staged in a scratch directory and written back to their real
/// destinations on flush.
///
/// A cache serves one unit of work: register destinations, write the
/// returned temp paths, then flush once. Flushing consumes the cache.
pub struct TempCache {
    options:  CacheOptions,
    temp_dir: PathBuf,
    entries:  Vec<CacheEntry>,
    taken:    HashSet<PathBuf>,
    clock:    Arc<dyn Clock>,
    transfer: Option<Arc<dyn Transfer>>,
}

impl std::fmt::Debug for TempCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempCache")
            .field("options", &self.options)
            .field("temp_dir", &self.temp_dir)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl TempCache {
    /// Create a cache, creating its temp directory if needed.
    pub fn new(options: CacheOptions) -> Result<Self> {
        let temp_dir = spool_fs::absolutize(options.get_temp_dir(), None)?;

        if !temp_dir.is_dir() {
            std::fs::create_dir_all(&temp_dir).map_err(|e| CacheError::TempDir {
                path:   temp_dir.clone(),
                source: e,
            })?;
        }

        tracing::debug!(temp_dir = %temp_dir.display(), ?options, "created temp cache");

        Ok(Self {
            options,
            temp_dir,
            entries: Vec::new(),
            taken: HashSet::new(),
            clock: Arc::new(SystemClock::new()),
            transfer: None,
        })
    }

    /// Use `clock` for backoff sleeps, cleanup pauses and, unless a custom
    /// transfer is set, throttling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the default [`ThrottledCopier`].
    pub fn with_transfer(mut self, transfer: Arc<dyn Transfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn options(&self) -> &CacheOptions { &self.options }

    /// Absolute temp directory.
    pub fn temp_dir(&self) -> &Path { &self.temp_dir }

    pub fn retry_count(&self) -> u32 { self.options.get_retry_count() }

    pub fn retry_delay_base(&self) -> u64 { self.options.get_retry_delay_base() }

    pub fn copy_on_error(&self) -> bool { self.options.get_copy_on_error() }

    pub fn bandwidth(&self) -> Option<Bandwidth> { self.options.get_bandwidth() }

    pub fn validate(&self) -> bool { self.options.get_validate() }

    pub fn retry_mode(&self) -> RetryMode { self.options.get_retry_mode() }

    pub fn algorithm(&self) -> HashAlgorithm { self.options.get_algorithm() }

    /// Registered entries in flush order.
    pub fn entries(&self) -> &[CacheEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// `(temp_path, destination_path)` pairs in flush order.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries
            .iter()
            .map(|entry| (entry.temp_path(), entry.destination_path()))
    }

    /// Register `name` for caching and return the temp path to write to.
    ///
    /// `name` is resolved against the current directory. When
    /// `remove_after_flush` is set the temp file is deleted once it has been
    /// copied back.
    pub fn register(&mut self, name: impl AsRef<Path>, remove_after_flush: bool) -> Result<PathBuf> {
        let name = name.as_ref();
        let destination = spool_fs::absolutize(name, None)?;
        let base = destination
            .file_name()
            .ok_or_else(|| CacheError::InvalidName(name.to_path_buf()))?
            .to_os_string();

        for attempt in 1..=NAME_ATTEMPTS {
            let temp_path = self.temp_dir.join(temp_file_name(&base));

            if temp_path.exists() || self.taken.contains(&temp_path) {
                tracing::warn!(
                    temp_path = %temp_path.display(),
                    attempt,
                    "temp file name collision"
                );
                continue;
            }

            let entry = CacheEntry::new(&destination, &temp_path, name, remove_after_flush);
            tracing::debug!(%entry, "registered cache entry");

            self.taken.insert(temp_path.clone());
            self.entries.push(entry);
            return Ok(temp_path);
        }

        Err(CacheError::NameResolution {
            name:     name.to_path_buf(),
            attempts: NAME_ATTEMPTS,
        })
    }

    /// Register `name`, removing the temp file after flush.
    pub fn register_default(&mut self, name: impl AsRef<Path>) -> Result<PathBuf> {
        self.register(name, true)
    }

    /// Copy every registered file to its destination, removing temp files
    /// as configured.
    ///
    /// Stops at the first entry that cannot be flushed. Entries flushed
    /// before it stay in place; entries after it are not touched.
    pub fn flush(mut self) -> Result<FlushReport> { self.flush_entries() }

    /// Run `body` against this cache and flush afterwards.
    ///
    /// If `body` fails, the flush still runs when `copy_on_error` is set.
    /// The body's error is handed back unchanged.
    pub fn scope<T, E, F>(self, body: F) -> std::result::Result<T, ScopeError<E>>
    where
        F: FnOnce(&mut TempCache) -> std::result::Result<T, E>,
    {
        let mut session = self.session();

        match body(&mut *session) {
            Ok(value) => session.finish().map(|_| value).map_err(ScopeError::Flush),
            Err(body) => match session.abort() {
                Ok(_) => Err(ScopeError::Body(body)),
                Err(flush) => Err(ScopeError::BodyAndFlush { body, flush }),
            },
        }
    }

    /// Wrap the cache in a guard that flushes when dropped.
    pub fn session(self) -> Session { Session::new(self) }

    /// Flushes and clears the entry list, so a second call is a no-op.
    pub(crate) fn flush_entries(&mut self) -> Result<FlushReport> {
        let entries = std::mem::take(&mut self.entries);
        self.taken.clear();

        let transfer = self.transfer();
        let mut report = FlushReport::default();

        for entry in &entries {
            self.transfer_one(transfer.as_ref(), entry)?;

            if entry.remove_after_flush() {
                self.remove_with_retry(transfer.as_ref(), entry.temp_path())?;
            }

            report.flushed.push(entry.destination_path().to_path_buf());
        }

        tracing::info!(files = report.len(), "flushed temp cache");
        Ok(report)
    }

    fn transfer(&self) -> Arc<dyn Transfer> {
        match &self.transfer {
            Some(transfer) => Arc::clone(transfer),
            None => Arc::new(ThrottledCopier::with_clock(Arc::clone(&self.clock))),
        }
    }

    fn transfer_one(&self, transfer: &dyn Transfer, entry: &CacheEntry) -> Result<()> {
        let temp = entry.temp_path();
        let dest = entry.destination_path();

        if !temp.is_file() {
            return Err(CacheError::NotFound(temp.to_path_buf()));
        }

        let retry_count = self.retry_count();
        let mut last_error: Option<CacheError> = None;

        for attempt in 0..=retry_count {
            if attempt > 0 {
                let delay = backoff_delay(attempt, self.retry_delay_base());
                match &last_error {
                    Some(err) => tracing::warn!(
                        dest = %dest.display(),
                        attempt,
                        ?delay,
                        error = %err,
                        "flush attempt failed, retrying"
                    ),
                    None => tracing::debug!(dest = %dest.display(), attempt, ?delay, "repeating flush attempt"),
                }
                self.clock.sleep(delay);
            }

            last_error = transfer
                .transfer(temp, dest, self.bandwidth())
                .err()
                .map(CacheError::from);

            if self.validate() {
                if let Err(err) = verify_copy(temp, dest, self.algorithm()) {
                    if last_error.is_none() {
                        last_error = Some(err.into());
                    } else {
                        // the copy error is the root cause
                        tracing::debug!(error = %err, "validation after failed copy");
                    }
                }
            }

            tracing::debug!(
                temp = %temp.display(),
                dest = %dest.display(),
                attempt,
                ok = last_error.is_none(),
                "flush attempt finished"
            );

            if last_error.is_none() && self.retry_mode() == RetryMode::StopOnSuccess {
                break;
            }
        }

        match last_error {
            None => Ok(()),
            Some(err) => {
                tracing::warn!(dest = %dest.display(), error = %err, "giving up on flush");
                self.discard_destination(transfer, dest);
                Err(err)
            }
        }
    }

    /// Best effort. Failures are logged, never returned. Only a regular file
    /// is ever removed.
    fn discard_destination(&self, transfer: &dyn Transfer, dest: &Path) {
        if !dest.is_file() {
            return;
        }

        for attempt in 1..=CLEANUP_ATTEMPTS {
            match transfer.remove(dest) {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(dest = %dest.display(), attempt, error = %err, "cannot remove failed destination");
                    if attempt < CLEANUP_ATTEMPTS {
                        self.clock.sleep(CLEANUP_PAUSE);
                    }
                }
            }
        }
    }

    fn remove_with_retry(&self, transfer: &dyn Transfer, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(CacheError::NotFound(path.to_path_buf()));
        }

        let mut attempt = 0;
        loop {
            match transfer.remove(path) {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= self.retry_count() => {
                    return Err(CacheError::Remove {
                        path: path.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    attempt += 1;
                    tracing::warn!(path = %path.display(), attempt, error = %err, "cannot remove temp file, retrying");
                    self.clock.sleep(backoff_delay(attempt, self.retry_delay_base()));
                }
            }
        }
    }
}

fn temp_file_name(base: &OsString) -> OsString {
    let mut name = base.clone();
    name.push(format!(".{}.{TEMP_SUFFIX}", Uuid::now_v7().simple()));
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_fs::ManualClock;
    use tempfile::tempdir;

    fn cache_in(dir: &Path, options: CacheOptions) -> (ManualClock, TempCache) {
        let clock = ManualClock::new();
        let cache = TempCache::new(options.temp_dir(dir.join("temp")))
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (clock, cache)
    }

    #[test]
    fn test_new_creates_temp_dir() {
        let dir = tempdir().unwrap();
        let (_, cache) = cache_in(dir.path(), CacheOptions::new());
        assert!(cache.temp_dir().is_dir());
        assert!(cache.temp_dir().is_absolute());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_temp_name_shape() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new());
        let dest = dir.path().join("out").join("sample.bam");

        let temp = cache.register_default(&dest).unwrap();
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(temp.parent().unwrap(), cache.temp_dir());
        assert!(name.starts_with("sample.bam."), "{name}");
        assert!(name.ends_with(".tmp"), "{name}");
        // base + '.' + 32 hex + ".tmp"
        assert_eq!(name.len(), "sample.bam.".len() + 32 + ".tmp".len());
    }

    #[test]
    fn test_register_keeps_names_and_order() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new());

        let a = cache.register(dir.path().join("a.txt"), true).unwrap();
        let b = cache.register(dir.path().join("b.txt"), false).unwrap();

        let pairs: Vec<(PathBuf, PathBuf)> = cache
            .iter_pairs()
            .map(|(temp, dest)| (temp.to_path_buf(), dest.to_path_buf()))
            .collect();
        assert_eq!(pairs, vec![
            (a, dir.path().join("a.txt")),
            (b, dir.path().join("b.txt")),
        ]);
        assert!(cache.entries()[0].remove_after_flush());
        assert!(!cache.entries()[1].remove_after_flush());
    }

    #[test]
    fn test_register_relative_name_resolves_against_cwd() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new());

        cache.register("relative/out.txt", true).unwrap();

        let entry = &cache.entries()[0];
        assert_eq!(entry.registered_name(), Path::new("relative/out.txt"));
        assert_eq!(
            entry.destination_path(),
            std::env::current_dir().unwrap().join("relative/out.txt")
        );
    }

    #[test]
    fn test_register_rejects_nameless_destination() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new());
        assert!(matches!(cache.register("/", true), Err(CacheError::InvalidName(_))));
    }

    #[test]
    fn test_flush_skips_removal_when_asked() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new());
        let dest = dir.path().join("keep.txt");

        let temp = cache.register(&dest, false).unwrap();
        std::fs::write(&temp, "kept").unwrap();

        let report = cache.flush().unwrap();
        assert_eq!(report.flushed(), [dest.clone()]);
        assert!(temp.exists());
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "kept");
    }

    #[test]
    fn test_exhaustive_mode_sleeps_even_after_success() {
        let dir = tempdir().unwrap();
        let (clock, mut cache) = cache_in(dir.path(), CacheOptions::new());
        let temp = cache.register(dir.path().join("ok.txt"), true).unwrap();
        std::fs::write(&temp, "fine").unwrap();

        cache.flush().unwrap();
        assert_eq!(clock.sleeps(), backoff_schedule(2, 4));
    }

    #[test]
    fn test_stop_on_success_mode_never_sleeps_on_clean_copy() {
        let dir = tempdir().unwrap();
        let options = CacheOptions::new().retry_mode(RetryMode::StopOnSuccess);
        let (clock, mut cache) = cache_in(dir.path(), options);
        let temp = cache.register(dir.path().join("ok.txt"), true).unwrap();
        std::fs::write(&temp, "fine").unwrap();

        cache.flush().unwrap();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_missing_temp_file_fails_without_retry() {
        let dir = tempdir().unwrap();
        let (clock, mut cache) = cache_in(dir.path(), CacheOptions::new());
        cache.register(dir.path().join("never-written.txt"), true).unwrap();

        assert!(matches!(cache.flush(), Err(CacheError::NotFound(_))));
        assert!(clock.sleeps().is_empty());
        assert!(!dir.path().join("never-written.txt").exists());
    }

    #[test]
    fn test_second_flush_pass_is_noop() {
        let dir = tempdir().unwrap();
        let (_, mut cache) = cache_in(dir.path(), CacheOptions::new().retry_count(0));
        let temp = cache.register(dir.path().join("once.txt"), true).unwrap();
        std::fs::write(&temp, "1").unwrap();

        assert_eq!(cache.flush_entries().unwrap().len(), 1);
        assert!(cache.is_empty());
        assert!(cache.flush_entries().unwrap().is_empty());
    }

    fn backoff_schedule(retries: u32, base: u64) -> Vec<std::time::Duration> {
        (1..=retries).map(|n| backoff_delay(n, base)).collect()
    }
}
