//! Write-back cache for output files.
//!
//! Work that produces files registers each destination with a [`TempCache`]
//! and writes to the temp path it gets back, somewhere fast and local.
//! When the work is done the cache copies every temp file to its real
//! destination, retrying with exponential backoff and checking a digest of
//! each copy against its source.
//!
//! ```no_run
//! use std::error::Error;
//!
//! use spool_cache::{CacheOptions, TempCache};
//!
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let cache = TempCache::new(CacheOptions::new().temp_dir("/scratch/job-42"))?;
//!
//! cache.scope(|cache| -> Result<(), Box<dyn Error>> {
//!     let temp = cache.register("results/summary.txt", true)?;
//!     std::fs::write(&temp, "42\n")?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod retry;

mod cache;
mod entry;
mod error;
mod options;
mod session;
mod transfer;

pub use cache::{FlushReport, TempCache};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, Result, ScopeError};
pub use options::{CacheOptions, RetryMode};
pub use session::Session;
pub use transfer::Transfer;
