use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spool_fs::Bandwidth;
use spool_verify::HashAlgorithm;

/// How a flush treats an attempt that already succeeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Run every one of the `retry_count + 1` attempts, even after a
    /// clean one; the outcome is decided by the final attempt. Matches the
    /// timing existing pipelines were tuned against.
    #[default]
    Exhaustive,

    /// Stop at the first attempt that copies and validates cleanly.
    StopOnSuccess,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheOptions {
    temp_dir:         PathBuf,
    retry_count:      u32,
    retry_delay_base: u64,
    copy_on_error:    bool,
    bandwidth:        Option<Bandwidth>,
    validate:         bool,
    retry_mode:       RetryMode,
    algorithm:        HashAlgorithm,
}

impl Default for CacheOptions {
    fn default() -> Self { Self::new() }
}

impl CacheOptions {
    pub fn new() -> Self {
        Self {
            temp_dir:         PathBuf::from("temp"),
            retry_count:      2,
            retry_delay_base: 4,
            copy_on_error:    false,
            bandwidth:        None,
            validate:         true,
            retry_mode:       RetryMode::default(),
            algorithm:        HashAlgorithm::default(),
        }
    }

    pub fn temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Retries after the first attempt.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Retry `n` waits `retry_delay_base^n` seconds.
    pub fn retry_delay_base(mut self, retry_delay_base: u64) -> Self {
        self.retry_delay_base = retry_delay_base;
        self
    }

    pub fn copy_on_error(mut self, copy_on_error: bool) -> Self {
        self.copy_on_error = copy_on_error;
        self
    }

    pub fn bandwidth(mut self, bandwidth: Option<Bandwidth>) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn retry_mode(mut self, retry_mode: RetryMode) -> Self {
        self.retry_mode = retry_mode;
        self
    }

    pub fn algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn get_temp_dir(&self) -> &Path { &self.temp_dir }

    pub fn get_retry_count(&self) -> u32 { self.retry_count }

    pub fn get_retry_delay_base(&self) -> u64 { self.retry_delay_base }

    pub fn get_copy_on_error(&self) -> bool { self.copy_on_error }

    pub fn get_bandwidth(&self) -> Option<Bandwidth> { self.bandwidth }

    pub fn get_validate(&self) -> bool { self.validate }

    pub fn get_retry_mode(&self) -> RetryMode { self.retry_mode }

    pub fn get_algorithm(&self) -> HashAlgorithm { self.algorithm }
}
