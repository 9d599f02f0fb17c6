//! Shared utilities for the cache library.

use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Longest lock TTL or wait honoured. Longer durations are clamped to it.
pub const MAX_LOCK_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Build the name of the refresh lock guarding a cache key.
///
/// Format: `lock_{key}`
pub fn lock_name(key: &str) -> String {
    format!("lock_{}", key)
}

/// Build the registered name of a computation.
///
/// Format: `{prefix}_{scope}_{ident}`
pub fn registered_name(prefix: &str, scope: &str, ident: &str) -> String {
    format!("{}_{}_{}", prefix, scope, ident)
}

/// Get the current time in milliseconds since UNIX epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Whole milliseconds in a duration, saturating at `i64::MAX`.
pub fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// `start + d` with `d` clamped to [`MAX_LOCK_DURATION`].
pub fn deadline_after(start: Instant, d: Duration) -> Instant {
    start + d.min(MAX_LOCK_DURATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_name() {
        assert_eq!(lock_name("@p_m_f_{}"), "lock_@p_m_f_{}");
    }

    #[test]
    fn test_registered_name() {
        assert_eq!(
            registered_name("reports", "app::stats", "daily"),
            "reports_app::stats_daily"
        );
        assert_eq!(registered_name("", "app", "daily"), "_app_daily");
    }

    #[test]
    fn test_now_ms_is_positive() {
        let now = now_ms();
        assert!(now > 0);
    }

    #[test]
    fn test_duration_ms() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_deadline_after_clamps() {
        let start = Instant::now();
        assert_eq!(
            deadline_after(start, Duration::from_millis(10)),
            start + Duration::from_millis(10)
        );
        assert_eq!(
            deadline_after(start, Duration::MAX),
            start + MAX_LOCK_DURATION
        );
    }
}
