use std::time::Duration;

/// Attempts made to delete a destination left behind by a failed flush.
pub const CLEANUP_ATTEMPTS: u32 = 3;

/// Pause between destination cleanup attempts.
pub const CLEANUP_PAUSE: Duration = Duration::from_secs(5);

/// Delay before retry `attempt` (1-based): `base` raised to `attempt`, in
/// seconds. The first attempt never waits.
///
/// ```
/// use std::time::Duration;
/// use spool_cache::retry::backoff_delay;
///
/// assert_eq!(backoff_delay(0, 4), Duration::ZERO);
/// assert_eq!(backoff_delay(1, 4), Duration::from_secs(4));
/// assert_eq!(backoff_delay(2, 4), Duration::from_secs(16));
/// ```
pub fn backoff_delay(attempt: u32, base: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(base.saturating_pow(attempt))
}

/// Worst-case time spent sleeping across `retry_count` retries.
pub fn total_backoff(retry_count: u32, base: u64) -> Duration {
    (1..=retry_count)
        .map(|attempt| backoff_delay(attempt, base))
        .fold(Duration::ZERO, Duration::saturating_add)
}
