mod common;

use common::{cache_over, CountingStore, Source};
use rockscache::{BuildError, CacheBuilder, Consistency, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

#[tokio::test]
async fn test_tag_keeps_value_and_marks_stale() {
  let store = Arc::new(MemoryStore::new());
  let source = Arc::new(Source::default());
  let cache = cache_over(store.clone(), source, Duration::ZERO).build().unwrap();
  cache.fetch(1).await.unwrap();

  let before = store.record("test:1").unwrap();
  cache.tag_as_deleted(1).await.unwrap();
  let after = store.record("test:1").unwrap();

  assert_eq!(after.value, before.value, "Soft delete must not drop the value");
  assert!(after.logical_expiry.unwrap() < before.logical_expiry.unwrap());
  assert!(after.lock_owner.is_none());
  assert!(after.retain_until.is_some());
}

#[tokio::test]
async fn test_tagging_twice_equals_tagging_once() {
  let store = Arc::new(MemoryStore::new());
  let source = Arc::new(Source::default());
  let cache = cache_over(store.clone(), source, Duration::ZERO).build().unwrap();
  cache.fetch_all([1, 2]).await.unwrap();

  cache.tag_all_as_deleted([1, 2]).await.unwrap();
  let once = store.record("test:1").unwrap();
  sleep(Duration::from_millis(5)).await;
  cache.tag_all_as_deleted([1, 2, 2]).await.unwrap();
  let twice = store.record("test:1").unwrap();

  assert_eq!(twice.value, once.value);
  assert_eq!(twice.logical_expiry, once.logical_expiry);
  assert_eq!(twice.lock_owner, once.lock_owner);
  assert_eq!(cache.metrics().keys_tagged, 4);
}

#[tokio::test]
async fn test_tag_is_a_no_op_when_disabled_or_empty() {
  let store = Arc::new(CountingStore::default());
  let source = Arc::new(Source::default());
  let cache = CacheBuilder::<u32, String>::json()
    .store(store.clone())
    .disable_cache_delete(true)
    .async_loader(common::slow_loader(source, Duration::ZERO))
    .build()
    .unwrap();

  cache.tag_all_as_deleted([1, 2, 3]).await.unwrap();
  assert_eq!(store.calls(), 0);

  let enabled = CacheBuilder::<u32, String>::json()
    .store(store.clone())
    .loader(|keys: Vec<u32>| Ok(keys.into_iter().map(|k| (k, k.to_string())).collect()))
    .build()
    .unwrap();
  enabled.tag_all_as_deleted(Vec::new()).await.unwrap();
  assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_tag_is_split_into_batches() {
  let store = Arc::new(CountingStore::default());
  let cache = CacheBuilder::<u32, String>::json()
    .store(store.clone())
    .batch_size(2)
    .loader(|keys: Vec<u32>| Ok(keys.into_iter().map(|k| (k, k.to_string())).collect()))
    .build()
    .unwrap();

  cache.tag_all_as_deleted([1, 2, 3, 4, 5]).await.unwrap();
  assert_eq!(store.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_cannot_write_back_data_older_than_the_tag() {
  common::init_tracing();
  let store = Arc::new(MemoryStore::new());
  let source = Arc::new(Source::default());

  let fast = cache_over(store.clone(), source.clone(), Duration::ZERO)
    .consistency(Consistency::Strong)
    .build()
    .unwrap();
  fast.fetch(9).await.unwrap();
  fast.tag_as_deleted(9).await.unwrap();

  // A reader that snapshots the source, then stalls before writing back.
  let slow_reader = cache_over(store.clone(), source.clone(), Duration::from_millis(200))
    .consistency(Consistency::Strong)
    .build()
    .unwrap();
  let reader = {
    let slow_reader = slow_reader.clone();
    tokio::spawn(async move { slow_reader.fetch(9).await })
  };
  sleep(Duration::from_millis(50)).await;

  // The writer updates the source of truth and invalidates mid-flight.
  source.write();
  fast.tag_as_deleted(9).await.unwrap();

  // The reader saw the source before the write; its own caller gets that.
  assert_eq!(reader.await.unwrap().unwrap().as_deref(), Some("value-9-v0"));
  assert_eq!(slow_reader.metrics().populates_rejected, 1);

  // But the cache was not poisoned: the next strong read reloads.
  assert_eq!(fast.fetch(9).await.unwrap().as_deref(), Some("value-9-v1"));
  assert_eq!(source.loads(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_claim_taken_late_in_retention_still_loads_once() {
  common::init_tracing();
  let source = Arc::new(Source::default());
  let cache = cache_over(
    Arc::new(MemoryStore::new()),
    source.clone(),
    Duration::from_millis(300),
  )
  .lock_duration(Duration::from_secs(5))
  .delete_retention(Duration::from_millis(100))
  .build()
  .unwrap();
  assert_eq!(cache.fetch(4).await.unwrap().as_deref(), Some("value-4-v0"));
  let loads_before = source.loads();

  source.write();
  cache.tag_as_deleted(4).await.unwrap();
  sleep(Duration::from_millis(80)).await;

  // Claims the key near the end of the retention window, refreshing it in the background.
  let started = std::time::Instant::now();
  assert_eq!(cache.fetch(4).await.unwrap().as_deref(), Some("value-4-v0"));
  assert!(started.elapsed() < Duration::from_millis(100));

  // Retention has passed while the refresh is still running.
  sleep(Duration::from_millis(100)).await;
  let strong = cache.with_consistency(Consistency::Strong);
  assert_eq!(strong.fetch(4).await.unwrap().as_deref(), Some("value-4-v1"));

  assert_eq!(source.loads(), loads_before + 1);
}

#[tokio::test]
async fn test_zero_retention_is_rejected() {
  let source = Arc::new(Source::default());
  let result = cache_over(Arc::new(MemoryStore::new()), source, Duration::ZERO)
    .delete_retention(Duration::ZERO)
    .build();

  assert!(matches!(
    result,
    Err(BuildError::ZeroDuration("delete_retention"))
  ));
}
