use crate::codec::{DisplayKey, JsonValue, KeySerializer, ValueSerializer};
use crate::config::OptionsConfig;
use crate::error::BuildError;
use crate::handles::Cache;
use crate::loader::{LoadResult, Loader};
use crate::metrics::Metrics;
use crate::options::{Consistency, Options};
use crate::runtime::TokioSpawner;
use crate::shared::CacheShared;
use crate::store::{MemoryStore, Store};
use crate::TaskSpawner;

use core::fmt;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A builder for creating [`Cache`] handles.
pub struct CacheBuilder<K, V> {
  key_prefix: String,
  options: Options,
  store: Option<Arc<dyn Store>>,
  key_serializer: Option<Box<dyn KeySerializer<K>>>,
  value_serializer: Option<Box<dyn ValueSerializer<V>>>,
  loader: Option<Loader<K, V>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("key_prefix", &self.key_prefix)
      .field("options", &self.options)
      .field("has_store", &self.store.is_some())
      .field("has_loader", &self.loader.is_some())
      .finish_non_exhaustive()
  }
}

impl<K, V> Default for CacheBuilder<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General Configuration Methods ---
impl<K, V> CacheBuilder<K, V> {
  /// Creates a builder with default [`Options`] and no codecs or loader.
  pub fn new() -> Self {
    Self {
      key_prefix: String::new(),
      options: Options::default(),
      store: None,
      key_serializer: None,
      value_serializer: None,
      loader: None,
      spawner: None,
    }
  }

  /// Sets the namespace prepended to every serialized key.
  pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.key_prefix = prefix.into();
    self
  }

  /// Replaces all options at once.
  pub fn options(mut self, options: Options) -> Self {
    self.options = options;
    self
  }

  /// Applies a deserialized configuration on top of the current options.
  pub fn config(mut self, config: &OptionsConfig) -> Result<Self, BuildError> {
    self.options = config.apply_to(self.options)?;
    Ok(self)
  }

  pub fn consistency(mut self, consistency: Consistency) -> Self {
    self.options.consistency = consistency;
    self
  }

  /// Bypasses the store: every fetch calls the loader directly.
  pub fn disable_cache_read(mut self, disabled: bool) -> Self {
    self.options.disable_cache_read = disabled;
    self
  }

  /// Turns soft-deletes into no-ops.
  pub fn disable_cache_delete(mut self, disabled: bool) -> Self {
    self.options.disable_cache_delete = disabled;
    self
  }

  pub fn batch_size(mut self, batch_size: usize) -> Self {
    self.options.batch_size = batch_size;
    self
  }

  /// How long a refresh claim keeps other loaders away from a key.
  ///
  /// Keep this comfortably above the loader's typical latency; a claim that
  /// lapses mid-load lets a second loader start.
  pub fn lock_duration(mut self, duration: Duration) -> Self {
    self.options.lock_duration = duration;
    self
  }

  /// How long a loaded value is considered fresh.
  pub fn fresh_ttl(mut self, duration: Duration) -> Self {
    self.options.fresh_ttl = duration;
    self
  }

  /// Remembers keys the loader could not produce as absent for `duration`.
  pub fn empty_ttl(mut self, duration: Duration) -> Self {
    self.options.empty_ttl = Some(duration);
    self
  }

  /// Sets the initial interval and the cap of the wait backoff.
  pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
    self.options.lock_sleep = initial;
    self.options.max_backoff = max;
    self
  }

  /// Total time a reader waits for another actor's refresh.
  pub fn wait_timeout(mut self, duration: Duration) -> Self {
    self.options.wait_timeout = duration;
    self
  }

  pub fn random_expire_adjustment(mut self, adjustment: f64) -> Self {
    self.options.random_expire_adjustment = adjustment;
    self
  }

  pub fn delete_retention(mut self, duration: Duration) -> Self {
    self.options.delete_retention = duration;
    self
  }

  /// Sets the store gateway. Defaults to an in-process [`MemoryStore`].
  pub fn store<S: Store>(mut self, store: Arc<S>) -> Self {
    self.store = Some(store as Arc<dyn Store>);
    self
  }

  pub fn key_serializer(mut self, serializer: impl KeySerializer<K>) -> Self {
    self.key_serializer = Some(Box::new(serializer));
    self
  }

  pub fn value_serializer(mut self, serializer: impl ValueSerializer<V>) -> Self {
    self.value_serializer = Some(Box::new(serializer));
    self
  }

  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Sets a synchronous batch loader.
  ///
  /// It receives a chunk of keys and returns the values it can produce.
  pub fn loader(mut self, f: impl Fn(Vec<K>) -> LoadResult<K, V> + Send + Sync + 'static) -> Self {
    self.loader = Some(Loader::Sync(Arc::new(f)));
    self
  }

  /// Sets an asynchronous batch loader.
  pub fn async_loader<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<K, V>> + Send + 'static,
  {
    self.loader = Some(Loader::Async(Arc::new(move |keys| f(keys).boxed())));
    self
  }
}

impl<K, V> CacheBuilder<K, V>
where
  K: Display + 'static,
  V: Serialize + DeserializeOwned + 'static,
{
  /// Creates a builder preset with `Display` keys and JSON values.
  pub fn json() -> Self {
    Self::new()
      .key_serializer(DisplayKey)
      .value_serializer(JsonValue::<V>::default())
  }
}

// --- Build Methods ---
impl<K, V> CacheBuilder<K, V>
where
  K: 'static,
  V: 'static,
{
  /// Builds the cache handle.
  ///
  /// Without an explicit spawner this must be called inside a Tokio runtime.
  pub fn build(self) -> Result<Cache<K, V>, BuildError> {
    self.options.validate()?;
    let loader = self.loader.ok_or(BuildError::MissingLoader)?;
    let key_serializer = self.key_serializer.ok_or(BuildError::MissingKeySerializer)?;
    let value_serializer = self
      .value_serializer
      .ok_or(BuildError::MissingValueSerializer)?;
    let spawner = match self.spawner {
      Some(spawner) => spawner,
      None => Arc::new(TokioSpawner::try_current().ok_or(BuildError::SpawnerRequired)?),
    };
    let store = self
      .store
      .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);

    let shared = Arc::new(CacheShared {
      key_prefix: self.key_prefix,
      store,
      key_serializer,
      value_serializer,
      loader,
      spawner,
      metrics: Metrics::new(),
    });

    Ok(Cache {
      shared,
      options: Arc::new(self.options),
    })
  }
}
