use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Entry records live in a store shared by many processes, so every timestamp
// written to it is wall-clock milliseconds since the unix epoch rather than a
// process-local `Instant`.

/// Returns the current wall-clock time in milliseconds since the unix epoch.
#[inline]
pub(crate) fn now_millis() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map_or(0, |d| d.as_millis() as u64)
}

/// Returns the timestamp `duration` after `now`, saturating on overflow.
#[inline]
pub(crate) fn after(now: u64, duration: Duration) -> u64 {
  now.saturating_add(duration.as_millis() as u64)
}
