mod common;

use common::{cache_over, CountingStore, Source};
use pretty_assertions::assert_eq;
use rockscache::{BoxError, CacheBuilder, MemoryStore};

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[tokio::test]
async fn test_round_trip_does_not_reload() {
  common::init_tracing();
  let source = Arc::new(Source::default());
  let cache = cache_over(Arc::new(MemoryStore::new()), source.clone(), Duration::ZERO)
    .build()
    .unwrap();

  let first = cache.fetch(7).await.unwrap();
  let second = cache.fetch(7).await.unwrap();

  assert_eq!(first.as_deref(), Some("value-7-v0"));
  assert_eq!(second, first);
  assert_eq!(source.loads(), 1, "Loader should not be called again");

  let metrics = cache.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, 1);
}

#[tokio::test]
async fn test_result_covers_exactly_what_the_loader_produces() {
  let cache = CacheBuilder::<u32, u32>::json()
    .loader(|keys: Vec<u32>| {
      Ok(keys.into_iter().filter(|k| k % 2 == 0).map(|k| (k, k * 10)).collect())
    })
    .build()
    .unwrap();

  let fetched = cache.fetch_all(1..=6).await.unwrap();

  let keys: BTreeSet<_> = fetched.values.keys().copied().collect();
  assert_eq!(keys, BTreeSet::from([2, 4, 6]));
  assert_eq!(fetched.values[&4], 40);
  assert!(fetched.is_complete());

  // Served from the store the second time, still without odd keys.
  let again = cache.fetch_all(1..=6).await.unwrap();
  assert_eq!(again.values, fetched.values);
}

#[tokio::test]
async fn test_duplicate_keys_are_fetched_once() {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let cache = CacheBuilder::<u32, u32>::json()
    .loader({
      let seen = seen.clone();
      move |keys: Vec<u32>| {
        seen.lock().unwrap().extend(keys.iter().copied());
        Ok(keys.into_iter().map(|k| (k, k)).collect())
      }
    })
    .build()
    .unwrap();

  let fetched = cache.fetch_all([3, 3, 1, 3, 1]).await.unwrap();

  assert_eq!(fetched.len(), 2);
  let mut loaded = seen.lock().unwrap().clone();
  loaded.sort_unstable();
  assert_eq!(loaded, vec![1, 3]);
}

#[tokio::test]
async fn test_batches_are_split_and_merged() {
  let chunks = Arc::new(Mutex::new(Vec::<Vec<String>>::new()));
  let cache = CacheBuilder::<String, String>::json()
    .batch_size(2)
    .loader({
      let chunks = chunks.clone();
      move |keys: Vec<String>| {
        chunks.lock().unwrap().push(keys.clone());
        Ok(keys.into_iter().map(|k| (k.clone(), k.to_uppercase())).collect())
      }
    })
    .build()
    .unwrap();

  let keys = ["a", "b", "c", "d", "e"].map(String::from);
  let fetched = cache.fetch_all(keys.clone()).await.unwrap();

  let chunks = chunks.lock().unwrap().clone();
  let mut sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
  sizes.sort_unstable();
  assert_eq!(sizes, vec![1, 2, 2]);

  let covered: BTreeSet<_> = chunks.into_iter().flatten().collect();
  assert_eq!(covered, keys.iter().cloned().collect::<BTreeSet<_>>());

  let expected: HashMap<String, String> = keys.iter().map(|k| (k.clone(), k.to_uppercase())).collect();
  assert_eq!(fetched.values, expected);
}

#[tokio::test]
async fn test_disabled_cache_read_bypasses_store() {
  let store = Arc::new(CountingStore::default());
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<u32, String>::json()
    .store(store.clone())
    .disable_cache_read(true)
    .loader({
      let calls = calls.clone();
      move |keys: Vec<u32>| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys.into_iter().filter(|k| *k != 2).map(|k| (k, format!("v{k}"))).collect())
      }
    })
    .build()
    .unwrap();

  let fetched = cache.fetch_all([1, 2, 3]).await.unwrap();
  let again = cache.fetch_all([1, 2, 3]).await.unwrap();

  let expected = HashMap::from([(1, "v1".to_string()), (3, "v3".to_string())]);
  assert_eq!(fetched.values, expected);
  assert_eq!(again.values, expected);
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(store.calls(), 0, "No store calls expected when reads are disabled");
}

#[tokio::test]
async fn test_empty_key_set_is_a_no_op() {
  let store = Arc::new(CountingStore::default());
  let cache = CacheBuilder::<u32, String>::json()
    .store(store.clone())
    .loader(|_keys: Vec<u32>| Err::<HashMap<u32, String>, BoxError>("never called".into()))
    .build()
    .unwrap();

  let fetched = cache.fetch_all(Vec::new()).await.unwrap();
  assert!(fetched.is_empty());
  assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_key_prefix_namespaces_store_keys() {
  let store = Arc::new(MemoryStore::new());
  let source = Arc::new(Source::default());
  let cache = cache_over(store.clone(), source, Duration::ZERO)
    .key_prefix("users:")
    .build()
    .unwrap();

  cache.fetch(42).await.unwrap();

  assert!(store.record("users:42").is_some());
  assert!(store.record("42").is_none());
  assert_eq!(cache.key_prefix(), "users:");
}

#[test]
fn test_build_requires_loader_and_runtime() {
  let missing_loader = CacheBuilder::<u32, String>::json().build();
  assert_eq!(missing_loader.unwrap_err(), rockscache::BuildError::MissingLoader);

  // No tokio runtime here and no explicit spawner.
  let no_runtime = CacheBuilder::<u32, String>::json()
    .loader(|keys: Vec<u32>| Ok(keys.into_iter().map(|k| (k, k.to_string())).collect()))
    .build();
  assert_eq!(no_runtime.unwrap_err(), rockscache::BuildError::SpawnerRequired);
}
