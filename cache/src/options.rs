use crate::error::BuildError;

use std::time::Duration;

use serde::Deserialize;

/// How a reader behaves when the cached entry is stale or being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
  /// Never return data known to be stale; wait (bounded) for a fresh load.
  Strong,
  /// Serve a stale value immediately and refresh it in the background.
  #[default]
  Eventual,
}

/// Immutable per-handle settings. Changing a setting produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
  /// The policy applied when a call does not override it.
  pub consistency: Consistency,
  /// Bypass the store entirely and call the loader directly.
  pub disable_cache_read: bool,
  /// Turn `tag_all_as_deleted` into a no-op.
  pub disable_cache_delete: bool,
  /// Maximum number of keys sent to the store or loader in one round trip.
  pub batch_size: usize,
  /// How long a refresh claim blocks other loaders.
  pub lock_duration: Duration,
  /// How long a freshly loaded value is served without reloading.
  pub fresh_ttl: Duration,
  /// When set, keys the loader cannot produce are remembered as absent for
  /// this long.
  pub empty_ttl: Option<Duration>,
  /// First backoff interval of a waiting reader.
  pub lock_sleep: Duration,
  /// Upper bound of a single backoff interval.
  pub max_backoff: Duration,
  /// Total time a reader waits for another actor's refresh.
  pub wait_timeout: Duration,
  /// Fraction in `[0, 1)` by which `fresh_ttl` is randomly shortened so that
  /// entries loaded together do not expire together.
  pub random_expire_adjustment: f64,
  /// How long a soft-deleted record is kept before the store may drop it.
  /// Must be non-zero; a claimed record is kept until its claimant is done.
  pub delete_retention: Duration,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      consistency: Consistency::Eventual,
      disable_cache_read: false,
      disable_cache_delete: false,
      batch_size: 100,
      lock_duration: Duration::from_secs(3),
      fresh_ttl: Duration::from_secs(60),
      empty_ttl: None,
      lock_sleep: Duration::from_millis(50),
      max_backoff: Duration::from_millis(400),
      wait_timeout: Duration::from_secs(5),
      random_expire_adjustment: 0.1,
      delete_retention: Duration::from_secs(10),
    }
  }
}

impl Options {
  /// Returns a copy with the consistency replaced.
  pub fn with_consistency(&self, consistency: Consistency) -> Self {
    Self {
      consistency,
      ..self.clone()
    }
  }

  pub fn validate(&self) -> Result<(), BuildError> {
    if self.batch_size == 0 {
      return Err(BuildError::ZeroBatchSize);
    }
    let required = [
      ("lock_duration", self.lock_duration),
      ("fresh_ttl", self.fresh_ttl),
      ("lock_sleep", self.lock_sleep),
      ("wait_timeout", self.wait_timeout),
      ("delete_retention", self.delete_retention),
    ];
    if let Some((name, _)) = required.iter().find(|(_, d)| d.is_zero()) {
      return Err(BuildError::ZeroDuration(*name));
    }
    if self.empty_ttl.is_some_and(|d| d.is_zero()) {
      return Err(BuildError::ZeroDuration("empty_ttl"));
    }
    if !(0.0..1.0).contains(&self.random_expire_adjustment) {
      return Err(BuildError::InvalidAdjustment(
        self.random_expire_adjustment.to_string(),
      ));
    }
    Ok(())
  }
}
