use std::ops::{Deref, DerefMut};

use crate::{FlushReport, Result, TempCache};

/// Guard that flushes its cache exactly once.
///
/// Call [`Session::finish`] when the work succeeded and [`Session::abort`]
/// when it did not. A session dropped without either behaves like `finish`,
/// except while unwinding from a panic, where it behaves like `abort`.
/// Errors from a drop-time flush can only be logged.
#[derive(Debug)]
pub struct Session {
    cache:  TempCache,
    closed: bool,
}

impl Session {
    pub(crate) fn new(cache: TempCache) -> Self {
        Self {
            cache,
            closed: false,
        }
    }

    pub fn finish(mut self) -> Result<FlushReport> {
        self.closed = true;
        self.cache.flush_entries()
    }

    /// Flush only if the cache was built with `copy_on_error`. Returns
    /// `None` when nothing was flushed.
    pub fn abort(mut self) -> Result<Option<FlushReport>> {
        self.closed = true;
        if !self.cache.copy_on_error() {
            tracing::info!(files = self.cache.len(), "discarding temp cache without flush");
            return Ok(None);
        }
        self.cache.flush_entries().map(Some)
    }
}

impl Deref for Session {
    type Target = TempCache;

    fn deref(&self) -> &TempCache { &self.cache }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut TempCache { &mut self.cache }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if std::thread::panicking() && !self.cache.copy_on_error() {
            tracing::warn!(files = self.cache.len(), "panicking, temp cache not flushed");
            return;
        }

        if let Err(err) = self.cache.flush_entries() {
            tracing::error!(error = %err, "flush on drop failed");
        }
    }
}
