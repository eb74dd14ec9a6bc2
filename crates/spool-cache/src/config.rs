//! File-based cache configuration.
//!
//! ```toml
//! temp_dir = "/scratch/job-42"
//! retry = 3
//! retry_delay = 2
//! copy_on_error = true
//! bandwidth = "50M"
//! validate = true
//! retry_mode = "stop_on_success"
//! algorithm = "md5"
//! ```
//!
//! Every key is optional. `bandwidth` takes a size specification string or
//! an integer number of KiB per second.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spool_fs::Bandwidth;
use spool_verify::HashAlgorithm;

use crate::{CacheError, CacheOptions, Result, RetryMode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub temp_dir:      PathBuf,
    pub retry:         u32,
    pub retry_delay:   u64,
    pub copy_on_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth:     Option<Bandwidth>,
    pub validate:      bool,
    pub retry_mode:    RetryMode,
    pub algorithm:     HashAlgorithm,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let options = CacheOptions::default();
        Self {
            temp_dir:      options.get_temp_dir().to_path_buf(),
            retry:         options.get_retry_count(),
            retry_delay:   options.get_retry_delay_base(),
            copy_on_error: options.get_copy_on_error(),
            bandwidth:     options.get_bandwidth(),
            validate:      options.get_validate(),
            retry_mode:    options.get_retry_mode(),
            algorithm:     options.get_algorithm(),
        }
    }
}

impl CacheConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> { Ok(toml::from_str(source)?) }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| CacheError::ConfigRead {
            path:   path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded cache config");
        Ok(config)
    }
}

impl From<CacheConfig> for CacheOptions {
    fn from(config: CacheConfig) -> Self {
        CacheOptions::new()
            .temp_dir(config.temp_dir)
            .retry_count(config.retry)
            .retry_delay_base(config.retry_delay)
            .copy_on_error(config.copy_on_error)
            .bandwidth(config.bandwidth)
            .validate(config.validate)
            .retry_mode(config.retry_mode)
            .algorithm(config.algorithm)
    }
}
