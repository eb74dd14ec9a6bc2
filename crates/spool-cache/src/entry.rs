use std::fmt;
use std::path::{Path, PathBuf};

/// A registered file: where the data lives now, and where it must end up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    destination_path:   PathBuf,
    temp_path:          PathBuf,
    registered_name:    PathBuf,
    remove_after_flush: bool,
}

impl CacheEntry {
    pub fn new(
        destination_path: impl Into<PathBuf>,
        temp_path: impl Into<PathBuf>,
        registered_name: impl Into<PathBuf>,
        remove_after_flush: bool,
    ) -> Self {
        Self {
            destination_path: destination_path.into(),
            temp_path: temp_path.into(),
            registered_name: registered_name.into(),
            remove_after_flush,
        }
    }

    /// Absolute path the file must occupy after flush.
    pub fn destination_path(&self) -> &Path { &self.destination_path }

    /// Absolute path of the scratch file holding the data.
    pub fn temp_path(&self) -> &Path { &self.temp_path }

    /// Name as passed to `register`, possibly relative.
    pub fn registered_name(&self) -> &Path { &self.registered_name }

    pub fn remove_after_flush(&self) -> bool { self.remove_after_flush }
}

impl fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [rm={}]",
            self.temp_path.display(),
            self.destination_path.display(),
            self.remove_after_flush
        )
    }
}
