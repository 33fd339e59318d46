//! Key and value encoding between domain types and the store's strings/bytes.

use std::fmt::Display;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::BoxError;

/// Turns a domain key into the store key suffix. Must be deterministic and
/// collision free; the cache prepends its key prefix.
pub trait KeySerializer<K>: Send + Sync + 'static {
  fn serialize(&self, key: &K) -> String;
}

/// Encodes values for storage. `deserialize(serialize(v))` must equal `v`.
pub trait ValueSerializer<V>: Send + Sync + 'static {
  fn serialize(&self, value: &V) -> Result<Bytes, BoxError>;
  fn deserialize(&self, bytes: &[u8]) -> Result<V, BoxError>;
}

/// Serializes keys through their `Display` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayKey;

impl<K: Display> KeySerializer<K> for DisplayKey {
  fn serialize(&self, key: &K) -> String {
    key.to_string()
  }
}

/// Stores values as JSON documents.
pub struct JsonValue<V>(PhantomData<fn() -> V>);

impl<V> Default for JsonValue<V> {
  fn default() -> Self {
    Self(PhantomData)
  }
}

impl<V> std::fmt::Debug for JsonValue<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("JsonValue")
  }
}

impl<V> ValueSerializer<V> for JsonValue<V>
where
  V: Serialize + DeserializeOwned + 'static,
{
  fn serialize(&self, value: &V) -> Result<Bytes, BoxError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
  }

  fn deserialize(&self, bytes: &[u8]) -> Result<V, BoxError> {
    Ok(serde_json::from_slice(bytes)?)
  }
}

impl<K, F> KeySerializer<K> for F
where
  F: Fn(&K) -> String + Send + Sync + 'static,
{
  fn serialize(&self, key: &K) -> String {
    self(key)
  }
}
