use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector shared by every handle of a cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) stale_hits: CachePadded<AtomicU64>,
  pub(crate) negative_hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Loading ---
  pub(crate) loader_calls: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) populates_rejected: CachePadded<AtomicU64>,
  pub(crate) background_refreshes: CachePadded<AtomicU64>,

  // --- Waiting ---
  pub(crate) lock_waits: CachePadded<AtomicU64>,
  pub(crate) wait_timeouts: CachePadded<AtomicU64>,

  // --- Invalidation / store ---
  pub(crate) keys_tagged: CachePadded<AtomicU64>,
  pub(crate) store_errors: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      stale_hits: CachePadded::new(AtomicU64::new(0)),
      negative_hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      loader_calls: CachePadded::new(AtomicU64::new(0)),
      load_failures: CachePadded::new(AtomicU64::new(0)),
      populates_rejected: CachePadded::new(AtomicU64::new(0)),
      background_refreshes: CachePadded::new(AtomicU64::new(0)),
      lock_waits: CachePadded::new(AtomicU64::new(0)),
      wait_timeouts: CachePadded::new(AtomicU64::new(0)),
      keys_tagged: CachePadded::new(AtomicU64::new(0)),
      store_errors: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

#[inline]
pub(crate) fn bump(counter: &AtomicU64, n: usize) {
  counter.fetch_add(n as u64, Ordering::Relaxed);
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let stale_hits = self.stale_hits.load(Ordering::Relaxed);
    let negative_hits = self.negative_hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let served_from_store = hits + stale_hits + negative_hits;
    let total_lookups = served_from_store + misses;

    MetricsSnapshot {
      hits,
      stale_hits,
      negative_hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        served_from_store as f64 / total_lookups as f64
      },
      loader_calls: self.loader_calls.load(Ordering::Relaxed),
      load_failures: self.load_failures.load(Ordering::Relaxed),
      populates_rejected: self.populates_rejected.load(Ordering::Relaxed),
      background_refreshes: self.background_refreshes.load(Ordering::Relaxed),
      lock_waits: self.lock_waits.load(Ordering::Relaxed),
      wait_timeouts: self.wait_timeouts.load(Ordering::Relaxed),
      keys_tagged: self.keys_tagged.load(Ordering::Relaxed),
      store_errors: self.store_errors.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Keys served from a fresh record.
  pub hits: u64,
  /// Keys served from a stale record under eventual consistency.
  pub stale_hits: u64,
  /// Keys answered as absent from a negative-cached record.
  pub negative_hits: u64,
  /// Keys loaded after this process claimed them.
  pub misses: u64,
  /// The share of lookups answered without loading.
  pub hit_ratio: f64,
  /// Loader invocations, foreground and background.
  pub loader_calls: u64,
  /// Loader invocations that returned an error.
  pub load_failures: u64,
  /// Loaded values discarded because a soft-delete revoked the claim.
  pub populates_rejected: u64,
  /// Refreshes dispatched to the task spawner.
  pub background_refreshes: u64,
  /// Keys that had to wait for another actor's refresh.
  pub lock_waits: u64,
  /// Waits that gave up with a load timeout.
  pub wait_timeouts: u64,
  /// Keys tagged as deleted.
  pub keys_tagged: u64,
  /// Store gateway calls that failed.
  pub store_errors: u64,
  /// The number of seconds since the cache was built.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("stale_hits", &self.stale_hits)
      .field("negative_hits", &self.negative_hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("loader_calls", &self.loader_calls)
      .field("load_failures", &self.load_failures)
      .field("populates_rejected", &self.populates_rejected)
      .field("background_refreshes", &self.background_refreshes)
      .field("lock_waits", &self.lock_waits)
      .field("wait_timeouts", &self.wait_timeouts)
      .field("keys_tagged", &self.keys_tagged)
      .field("store_errors", &self.store_errors)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
