//! The per-key fetch and population protocol.
//!
//! A chunk of keys is read with one `get_or_claim` round trip. Every key then
//! falls into one of three groups:
//!
//! - served directly (fresh, negative-cached, or stale under eventual
//!   consistency),
//! - claimed by this call and loaded, either inline or as a detached
//!   background refresh,
//! - held by another actor, in which case the call polls the store on a
//!   jittered backoff until the refresh lands, the claim lapses and can be
//!   taken over, or the wait times out.

use crate::backoff::Backoff;
use crate::entry::{Claim, EntryState};
use crate::error::{Error, Result};
use crate::metrics::bump;
use crate::options::{Consistency, Options};
use crate::shared::CacheShared;
use crate::time;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// The outcome of a fetch: the values that could be produced, plus an error
/// for every key that failed.
///
/// Keys that are absent at the source appear in neither map.
#[derive(Debug)]
pub struct Fetched<K, V> {
  pub values: HashMap<K, V>,
  pub failures: HashMap<K, Error>,
}

impl<K, V> Default for Fetched<K, V> {
  fn default() -> Self {
    Self {
      values: HashMap::new(),
      failures: HashMap::new(),
    }
  }
}

impl<K: Eq + Hash, V> Fetched<K, V> {
  pub(crate) fn failed<I>(keys: I, error: Error) -> Self
  where
    I: IntoIterator<Item = K>,
  {
    Self {
      values: HashMap::new(),
      failures: keys.into_iter().map(|k| (k, error.clone())).collect(),
    }
  }

  /// Absorbs another outcome; its entries win on duplicate keys.
  pub(crate) fn merge(&mut self, other: Fetched<K, V>) {
    self.values.extend(other.values);
    self.failures.extend(other.failures);
  }

  /// Turns a fetch over `requested` keys into an error only when every one
  /// of them failed.
  pub(crate) fn finish(self, requested: usize) -> Result<Self> {
    let all_failed = requested > 0 && self.values.is_empty() && self.failures.len() == requested;
    if all_failed {
      if let Some(err) = self.failures.values().next() {
        return Err(err.clone());
      }
    }
    Ok(self)
  }

  /// The number of keys that produced a value.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }

  pub fn get(&self, key: &K) -> Option<&V> {
    self.values.get(key)
  }
}

/// A key paired with its encoded store key.
type Keyed<K> = (K, String);

fn fresh_expiry(now: u64, options: &Options) -> u64 {
  let adjustment = options.random_expire_adjustment;
  let ttl = if adjustment > 0.0 {
    let shave = rand::rng().random::<f64>() * adjustment;
    options.fresh_ttl.mul_f64(1.0 - shave)
  } else {
    options.fresh_ttl
  };
  time::after(now, ttl.max(Duration::from_millis(1)))
}

/// Fetches one chunk of keys under `options` (whose consistency is already
/// the effective one for this call).
pub(crate) async fn fetch_chunk<K, V>(
  shared: Arc<CacheShared<K, V>>,
  options: Arc<Options>,
  keys: Vec<K>,
) -> Fetched<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  let keyed: Vec<Keyed<K>> = keys
    .into_iter()
    .map(|k| {
      let store_key = shared.store_key(&k);
      (k, store_key)
    })
    .collect();
  let store_keys: Vec<String> = keyed.iter().map(|(_, s)| s.clone()).collect();

  let now = time::now_millis();
  let owner = Uuid::new_v4().to_string();
  let lock_until = time::after(now, options.lock_duration);
  let claims = match shared
    .store
    .get_or_claim(&store_keys, now, lock_until, &owner)
    .await
  {
    Ok(claims) => claims,
    Err(e) => {
      bump(&shared.metrics.store_errors, 1);
      return Fetched::failed(keyed.into_iter().map(|(k, _)| k), Error::store(e));
    }
  };

  let eventual = options.consistency == Consistency::Eventual;
  let mut out = Fetched::default();
  let mut to_load = Vec::new();
  let mut to_refresh = Vec::new();
  let mut to_wait = Vec::new();

  for ((key, store_key), claim) in keyed.into_iter().zip(claims) {
    if claim.claimed {
      let stale = match claim.value() {
        Some(bytes) if eventual => shared.decode(&store_key, bytes).ok(),
        _ => None,
      };
      match stale {
        Some(value) => {
          bump(&shared.metrics.stale_hits, 1);
          out.values.insert(key.clone(), value);
          to_refresh.push((key, store_key));
        }
        None => to_load.push((key, store_key)),
      }
      continue;
    }

    match serve(&shared, eventual, &store_key, &claim, now) {
      Served::Value(Ok(value)) => {
        out.values.insert(key, value);
      }
      Served::Value(Err(e)) => {
        out.failures.insert(key, e);
      }
      Served::Absent => {}
      Served::Wait => to_wait.push((key, store_key)),
    }
  }

  if !to_load.is_empty() || !to_refresh.is_empty() || !to_wait.is_empty() {
    debug!(
      prefix = %shared.key_prefix,
      load = to_load.len(),
      refresh = to_refresh.len(),
      wait = to_wait.len(),
      "fetch chunk needs work"
    );
  }

  if !to_refresh.is_empty() {
    spawn_refresh(Arc::clone(&shared), Arc::clone(&options), owner.clone(), to_refresh);
  }

  let waits = join_all(
    to_wait
      .into_iter()
      .map(|(key, store_key)| wait_for(&shared, &options, key, store_key)),
  );
  let (loaded, waited) = futures_util::join!(load_claimed(&shared, &options, &owner, to_load), waits);

  out.merge(loaded);
  for (key, outcome) in waited {
    match outcome {
      Ok(Some(value)) => {
        out.values.insert(key, value);
      }
      Ok(None) => {}
      Err(e) => {
        out.failures.insert(key, e);
      }
    }
  }
  out
}

enum Served<V> {
  Value(Result<V>),
  Absent,
  Wait,
}

/// Decides what an unclaimed record means for the caller.
fn serve<K, V>(
  shared: &CacheShared<K, V>,
  eventual: bool,
  store_key: &str,
  claim: &Claim,
  now: u64,
) -> Served<V>
where
  K: 'static,
  V: 'static,
{
  match claim.state(now) {
    EntryState::Fresh(bytes) => {
      bump(&shared.metrics.hits, 1);
      Served::Value(shared.decode(store_key, &bytes))
    }
    EntryState::FreshEmpty => {
      bump(&shared.metrics.negative_hits, 1);
      Served::Absent
    }
    EntryState::Locked(Some(bytes)) if eventual => match shared.decode(store_key, &bytes) {
      Ok(value) => {
        bump(&shared.metrics.stale_hits, 1);
        Served::Value(Ok(value))
      }
      Err(_) => Served::Wait,
    },
    // Locked by someone else, or a record that changed between classification
    // and the claim attempt.
    EntryState::Locked(_) | EntryState::Stale(_) | EntryState::Missing => Served::Wait,
  }
}

/// Invokes the loader for keys this call has claimed and writes the results
/// back under the claim.
async fn load_claimed<K, V>(
  shared: &CacheShared<K, V>,
  options: &Options,
  owner: &str,
  claimed: Vec<Keyed<K>>,
) -> Fetched<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  if claimed.is_empty() {
    return Fetched::default();
  }
  bump(&shared.metrics.loader_calls, 1);
  bump(&shared.metrics.misses, claimed.len());

  let keys: Vec<K> = claimed.iter().map(|(k, _)| k.clone()).collect();
  let mut loaded = match shared.loader.load(keys).await {
    Ok(loaded) => loaded,
    Err(e) => {
      bump(&shared.metrics.load_failures, 1);
      warn!(prefix = %shared.key_prefix, keys = claimed.len(), error = %e, "loader failed");
      let store_keys: Vec<String> = claimed.iter().map(|(_, s)| s.clone()).collect();
      release_all(shared, owner, &store_keys).await;
      return Fetched::failed(claimed.into_iter().map(|(k, _)| k), Error::loader(e));
    }
  };

  let now = time::now_millis();
  let mut out = Fetched::default();
  let mut writes = Vec::with_capacity(claimed.len());
  let mut unencodable = Vec::new();
  for (key, store_key) in claimed {
    match loaded.remove(&key) {
      Some(value) => {
        match shared.encode(&store_key, &value) {
          Ok(bytes) => writes.push((store_key, Some(bytes), fresh_expiry(now, options))),
          Err(e) => {
            warn!(key = %store_key, error = %e, "cannot encode loaded value, releasing claim");
            unencodable.push(store_key);
          }
        }
        out.values.insert(key, value);
      }
      None => {
        let expiry = options.empty_ttl.map_or(now, |ttl| time::after(now, ttl));
        writes.push((store_key, None, expiry));
      }
    }
  }

  let (results, ()) = futures_util::join!(
    join_all(writes.iter().map(|(store_key, value, expiry)| {
      shared.store.populate(store_key, owner, value.clone(), *expiry)
    })),
    release_all(shared, owner, &unencodable),
  );
  for ((store_key, _, _), result) in writes.iter().zip(results) {
    match result {
      Ok(true) => {}
      Ok(false) => {
        bump(&shared.metrics.populates_rejected, 1);
        debug!(key = %store_key, "claim revoked while loading, result not cached");
      }
      Err(e) => {
        bump(&shared.metrics.store_errors, 1);
        warn!(key = %store_key, error = %e, "failed to store loaded value");
      }
    }
  }
  out
}

/// Best-effort release of claims whose load produced nothing storable. The
/// records keep their previous values; a claim that cannot be released lapses
/// on its own after the lock duration.
async fn release_all<K, V>(shared: &CacheShared<K, V>, owner: &str, store_keys: &[String])
where
  K: 'static,
  V: 'static,
{
  if store_keys.is_empty() {
    return;
  }
  let now = time::now_millis();
  let results = join_all(
    store_keys
      .iter()
      .map(|store_key| shared.store.release(store_key, owner, now)),
  )
  .await;
  for (store_key, result) in store_keys.iter().zip(results) {
    if let Err(e) = result {
      bump(&shared.metrics.store_errors, 1);
      warn!(key = %store_key, error = %e, "failed to release claim");
    }
  }
}

/// Dispatches a detached reload of claimed keys whose stale values were
/// already returned to the caller.
fn spawn_refresh<K, V>(
  shared: Arc<CacheShared<K, V>>,
  options: Arc<Options>,
  owner: String,
  claimed: Vec<Keyed<K>>,
) where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  bump(&shared.metrics.background_refreshes, 1);
  let spawner = Arc::clone(&shared.spawner);
  spawner.spawn(Box::pin(async move {
    let count = claimed.len();
    let outcome = load_claimed(&shared, &options, &owner, claimed).await;
    trace!(
      prefix = %shared.key_prefix,
      keys = count,
      refreshed = outcome.values.len(),
      "background refresh finished"
    );
  }));
}

/// Polls a key held by another actor until it can be served or taken over.
async fn wait_for<K, V>(
  shared: &CacheShared<K, V>,
  options: &Options,
  key: K,
  store_key: String,
) -> (K, Result<Option<V>>)
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  bump(&shared.metrics.lock_waits, 1);
  let eventual = options.consistency == Consistency::Eventual;
  let mut backoff = Backoff::new(options.lock_sleep, options.max_backoff, options.wait_timeout);

  loop {
    let Some(delay) = backoff.next_delay() else {
      bump(&shared.metrics.wait_timeouts, 1);
      let waited = backoff.elapsed();
      debug!(key = %store_key, ?waited, "gave up waiting for refresh");
      return (key, Err(Error::LoadTimeout { key: store_key, waited }));
    };
    trace!(key = %store_key, ?delay, "waiting for refresh");
    tokio::time::sleep(delay).await;

    let now = time::now_millis();
    let owner = Uuid::new_v4().to_string();
    let lock_until = time::after(now, options.lock_duration);
    let claim = match shared
      .store
      .get_or_claim(std::slice::from_ref(&store_key), now, lock_until, &owner)
      .await
    {
      Ok(mut claims) => claims.pop().unwrap_or_default(),
      Err(e) => {
        bump(&shared.metrics.store_errors, 1);
        return (key, Err(Error::store(e)));
      }
    };

    if claim.claimed {
      // The previous refresher failed or its claim lapsed: load it ourselves.
      let mut loaded = load_claimed(shared, options, &owner, vec![(key.clone(), store_key)]).await;
      let outcome = match loaded.failures.remove(&key) {
        Some(e) => Err(e),
        None => Ok(loaded.values.remove(&key)),
      };
      return (key, outcome);
    }

    match serve(shared, eventual, &store_key, &claim, now) {
      Served::Value(outcome) => return (key, outcome.map(Some)),
      Served::Absent => return (key, Ok(None)),
      Served::Wait => continue,
    }
  }
}
