#![allow(dead_code)]

use rockscache::{BoxError, CacheBuilder, Claim, EntryRecord, LoadResult, MemoryStore, Store};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

/// A `MemoryStore` wrapper that counts every gateway call.
#[derive(Default)]
pub struct CountingStore {
  pub inner: MemoryStore,
  pub calls: AtomicUsize,
}

impl CountingStore {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn hit(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
  }
}

#[async_trait]
impl Store for CountingStore {
  async fn get_or_claim(
    &self,
    keys: &[String],
    now: u64,
    lock_until: u64,
    owner: &str,
  ) -> Result<Vec<Claim>, BoxError> {
    self.hit();
    self.inner.get_or_claim(keys, now, lock_until, owner).await
  }

  async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<EntryRecord>>, BoxError> {
    self.hit();
    self.inner.get_entries(keys).await
  }

  async fn populate(
    &self,
    key: &str,
    owner: &str,
    value: Option<Bytes>,
    expiry: u64,
  ) -> Result<bool, BoxError> {
    self.hit();
    self.inner.populate(key, owner, value, expiry).await
  }

  async fn release(&self, key: &str, owner: &str, now: u64) -> Result<(), BoxError> {
    self.hit();
    self.inner.release(key, owner, now).await
  }

  async fn tag_deleted(&self, keys: &[String], now: u64, retain_until: u64) -> Result<(), BoxError> {
    self.hit();
    self.inner.tag_deleted(keys, now, retain_until).await
  }

  async fn set_entry(&self, key: &str, value: Option<Bytes>, expiry: u64) -> Result<(), BoxError> {
    self.hit();
    self.inner.set_entry(key, value, expiry).await
  }
}

/// A store whose every call fails, as if the remote were unreachable.
pub struct DownStore;

fn down() -> BoxError {
  "connection refused".into()
}

#[async_trait]
impl Store for DownStore {
  async fn get_or_claim(&self, _: &[String], _: u64, _: u64, _: &str) -> Result<Vec<Claim>, BoxError> {
    Err(down())
  }
  async fn get_entries(&self, _: &[String]) -> Result<Vec<Option<EntryRecord>>, BoxError> {
    Err(down())
  }
  async fn populate(&self, _: &str, _: &str, _: Option<Bytes>, _: u64) -> Result<bool, BoxError> {
    Err(down())
  }
  async fn release(&self, _: &str, _: &str, _: u64) -> Result<(), BoxError> {
    Err(down())
  }
  async fn tag_deleted(&self, _: &[String], _: u64, _: u64) -> Result<(), BoxError> {
    Err(down())
  }
  async fn set_entry(&self, _: &str, _: Option<Bytes>, _: u64) -> Result<(), BoxError> {
    Err(down())
  }
}

/// A simulated source of truth: `key -> "value-{key}-v{version}"`, where the
/// version is bumped by `write`.
#[derive(Default)]
pub struct Source {
  pub version: AtomicUsize,
  pub loads: AtomicUsize,
}

impl Source {
  pub fn loads(&self) -> usize {
    self.loads.load(Ordering::SeqCst)
  }

  pub fn write(&self) {
    self.version.fetch_add(1, Ordering::SeqCst);
  }

  pub fn value_for(&self, key: u32) -> String {
    format!("value-{key}-v{}", self.version.load(Ordering::SeqCst))
  }
}

/// An async loader over `source` that snapshots the source, then sleeps for
/// `delay` before answering, like a slow database read.
pub fn slow_loader(
  source: Arc<Source>,
  delay: Duration,
) -> impl Fn(Vec<u32>) -> BoxFuture<'static, LoadResult<u32, String>> + Send + Sync + 'static {
  move |keys: Vec<u32>| {
    let source = source.clone();
    async move {
      source.loads.fetch_add(1, Ordering::SeqCst);
      let snapshot: HashMap<u32, String> = keys.iter().map(|k| (*k, source.value_for(*k))).collect();
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      Ok::<_, BoxError>(snapshot)
    }
    .boxed()
  }
}

/// A JSON cache over a shared store with the given loader delay.
pub fn cache_over(
  store: Arc<MemoryStore>,
  source: Arc<Source>,
  delay: Duration,
) -> CacheBuilder<u32, String> {
  CacheBuilder::json()
    .key_prefix("test:")
    .store(store)
    .async_loader(slow_loader(source, delay))
}
