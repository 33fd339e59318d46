use crate::batch;
use crate::delete;
use crate::error::{Error, Result};
use crate::fetch::{self, Fetched};
use crate::metrics::{bump, MetricsSnapshot};
use crate::options::{Consistency, Options};
use crate::shared::CacheShared;

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashSet;

/// A handle to a stampede-safe, store-backed cache.
///
/// Handles are cheap to clone and immutable: [`Cache::with_consistency`]
/// returns a new handle over the same store, codecs and loader instead of
/// changing this one.
pub struct Cache<K, V> {
  pub(crate) shared: Arc<CacheShared<K, V>>,
  pub(crate) options: Arc<Options>,
}

impl<K, V> Clone for Cache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
      options: Arc::clone(&self.options),
    }
  }
}

impl<K, V> fmt::Debug for Cache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache")
      .field("shared", &self.shared)
      .field("options", &self.options)
      .finish()
  }
}

impl<K, V> Cache<K, V> {
  /// The options this handle applies.
  pub fn options(&self) -> &Options {
    &self.options
  }

  /// The prefix prepended to every serialized key.
  pub fn key_prefix(&self) -> &str {
    &self.shared.key_prefix
  }

  /// Returns a snapshot of the metrics shared by all handles of this cache.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Returns a handle that defaults to `consistency`.
  pub fn with_consistency(&self, consistency: Consistency) -> Self {
    if self.options.consistency == consistency {
      return self.clone();
    }
    Self {
      shared: Arc::clone(&self.shared),
      options: Arc::new(self.options.with_consistency(consistency)),
    }
  }
}

impl<K, V> Cache<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Fetches every key under this handle's consistency.
  ///
  /// Keys are de-duplicated first. Keys the loader cannot produce are absent
  /// from the result. Failures are reported per key in
  /// [`Fetched::failures`]; an `Err` is returned only when every key failed.
  pub async fn fetch_all<I>(&self, keys: I) -> Result<Fetched<K, V>>
  where
    I: IntoIterator<Item = K>,
  {
    self.fetch_all_with(keys, self.options.consistency).await
  }

  /// Like [`Cache::fetch_all`], overriding the consistency for this call only.
  pub async fn fetch_all_with<I>(&self, keys: I, consistency: Consistency) -> Result<Fetched<K, V>>
  where
    I: IntoIterator<Item = K>,
  {
    let mut seen = AHashSet::new();
    let keys: Vec<K> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
    drop(seen);
    let requested = keys.len();
    if requested == 0 {
      return Ok(Fetched::default());
    }

    if self.options.disable_cache_read {
      bump(&self.shared.metrics.loader_calls, 1);
      return match self.shared.loader.load(keys.clone()).await {
        Ok(values) => Ok(Fetched {
          values,
          failures: Default::default(),
        }),
        Err(e) => {
          bump(&self.shared.metrics.load_failures, 1);
          Fetched::failed(keys, Error::loader(e)).finish(requested)
        }
      };
    }

    let options = if consistency == self.options.consistency {
      Arc::clone(&self.options)
    } else {
      Arc::new(self.options.with_consistency(consistency))
    };

    let shared = &self.shared;
    batch::execute(keys, options.batch_size, |chunk| {
      fetch::fetch_chunk(Arc::clone(shared), Arc::clone(&options), chunk)
    })
    .await
    .finish(requested)
  }

  /// Fetches a single key. Returns `Ok(None)` if the loader cannot produce it.
  pub async fn fetch(&self, key: K) -> Result<Option<V>> {
    let mut fetched = self.fetch_all([key.clone()]).await?;
    match fetched.failures.remove(&key) {
      Some(e) => Err(e),
      None => Ok(fetched.values.remove(&key)),
    }
  }

  /// Like [`Cache::fetch`], overriding the consistency for this call only.
  pub async fn fetch_with(&self, key: K, consistency: Consistency) -> Result<Option<V>> {
    let mut fetched = self.fetch_all_with([key.clone()], consistency).await?;
    match fetched.failures.remove(&key) {
      Some(e) => Err(e),
      None => Ok(fetched.values.remove(&key)),
    }
  }

  /// Marks every key as stale without removing its cached value.
  ///
  /// A no-op when cache deletes are disabled or `keys` is empty.
  pub async fn tag_all_as_deleted<I>(&self, keys: I) -> Result<()>
  where
    I: IntoIterator<Item = K>,
  {
    let keys: Vec<K> = keys.into_iter().collect();
    delete::tag_all(&self.shared, &self.options, keys).await
  }

  pub async fn tag_as_deleted(&self, key: K) -> Result<()> {
    self.tag_all_as_deleted([key]).await
  }
}
