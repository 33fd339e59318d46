use crate::codec::{KeySerializer, ValueSerializer};
use crate::error::Error;
use crate::loader::Loader;
use crate::metrics::Metrics;
use crate::store::Store;
use crate::TaskSpawner;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// The internal core shared by every handle derived from one builder.
pub(crate) struct CacheShared<K, V> {
  pub(crate) key_prefix: String,
  pub(crate) store: Arc<dyn Store>,
  pub(crate) key_serializer: Box<dyn KeySerializer<K>>,
  pub(crate) value_serializer: Box<dyn ValueSerializer<V>>,
  pub(crate) loader: Loader<K, V>,
  pub(crate) spawner: Arc<dyn TaskSpawner>,
  pub(crate) metrics: Metrics,
}

impl<K, V> fmt::Debug for CacheShared<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("key_prefix", &self.key_prefix)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K: 'static, V: 'static> CacheShared<K, V> {
  /// The full store key for a domain key.
  #[inline]
  pub(crate) fn store_key(&self, key: &K) -> String {
    format!("{}{}", self.key_prefix, self.key_serializer.serialize(key))
  }

  pub(crate) fn decode(&self, store_key: &str, bytes: &Bytes) -> Result<V, Error> {
    self
      .value_serializer
      .deserialize(bytes)
      .map_err(|e| Error::Codec {
        key: store_key.to_string(),
        message: e.to_string(),
      })
  }

  pub(crate) fn encode(&self, store_key: &str, value: &V) -> Result<Bytes, Error> {
    self
      .value_serializer
      .serialize(value)
      .map_err(|e| Error::Codec {
        key: store_key.to_string(),
        message: e.to_string(),
      })
  }
}
