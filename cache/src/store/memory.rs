use crate::entry::{Claim, EntryRecord};
use crate::error::BoxError;
use crate::store::Store;
use crate::time;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};

use async_trait::async_trait;
use bytes::Bytes;
use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

type Shard = HashMap<String, EntryRecord, ahash::RandomState>;

#[inline]
fn hash_key<K: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

/// An in-process [`Store`] partitioned into independently locked shards.
///
/// Each primitive holds its shard's write lock for the whole per-key step,
/// which gives it the same atomicity a scripted command has on a remote
/// store. Records whose soft-delete retention has passed are dropped lazily
/// when they are next touched.
pub struct MemoryStore {
  shards: Box<[CachePadded<RwLock<Shard>>]>,
  hasher: ahash::RandomState,
}

impl fmt::Debug for MemoryStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryStore {
  /// Creates a store with a shard count derived from the number of CPUs.
  pub fn new() -> Self {
    Self::with_shards(num_cpus::get() * 4)
  }

  /// Creates a store with the given number of shards (rounded up to a power of two).
  pub fn with_shards(num_shards: usize) -> Self {
    let num_shards = num_shards.max(1).next_power_of_two();
    let hasher = ahash::RandomState::new();
    let shards = (0..num_shards)
      .map(|_| CachePadded::new(RwLock::new(HashMap::with_hasher(hasher.clone()))))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    Self { shards, hasher }
  }

  #[inline]
  fn shard(&self, key: &str) -> &RwLock<Shard> {
    let hash = hash_key(&self.hasher, key);
    &self.shards[hash as usize & (self.shards.len() - 1)]
  }

  /// Returns a copy of the record stored under `key`, if any.
  pub fn record(&self, key: &str) -> Option<EntryRecord> {
    let now = time::now_millis();
    self
      .shard(key)
      .read()
      .get(key)
      .filter(|r| !r.is_retired(now))
      .cloned()
  }

  /// The number of records held, including retired ones not yet dropped.
  pub fn len(&self) -> usize {
    self.shards.iter().map(|s| s.read().len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Removes every record.
  pub fn clear(&self) {
    for shard in self.shards.iter() {
      shard.write().clear();
    }
  }

  fn claim_one(&self, key: &str, now: u64, lock_until: u64, owner: &str) -> Claim {
    let mut guard = self.shard(key).write();
    if guard.get(key).is_some_and(|r| r.is_retired(now)) {
      guard.remove(key);
    }

    let observed = guard.get(key).cloned();
    let claimable = observed.as_ref().map_or(true, |r| r.is_claimable(now));
    if claimable {
      let record = guard.entry(key.to_owned()).or_default();
      record.logical_expiry = Some(lock_until);
      record.lock_owner = Some(owner.to_owned());
      // The claimant owns the record's lifetime until it populates or releases.
      record.retain_until = None;
    }

    Claim {
      record: observed,
      claimed: claimable,
    }
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get_or_claim(
    &self,
    keys: &[String],
    now: u64,
    lock_until: u64,
    owner: &str,
  ) -> Result<Vec<Claim>, BoxError> {
    Ok(
      keys
        .iter()
        .map(|key| self.claim_one(key, now, lock_until, owner))
        .collect(),
    )
  }

  async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<EntryRecord>>, BoxError> {
    Ok(keys.iter().map(|key| self.record(key)).collect())
  }

  async fn populate(
    &self,
    key: &str,
    owner: &str,
    value: Option<Bytes>,
    expiry: u64,
  ) -> Result<bool, BoxError> {
    let mut guard = self.shard(key).write();
    match guard.get_mut(key) {
      Some(record) if record.lock_owner.as_deref() == Some(owner) => {
        *record = EntryRecord::populated(value, expiry);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn release(&self, key: &str, owner: &str, now: u64) -> Result<(), BoxError> {
    let mut guard = self.shard(key).write();
    if let Some(record) = guard.get_mut(key) {
      if record.lock_owner.as_deref() == Some(owner) {
        record.lock_owner = None;
        record.logical_expiry = Some(now);
      }
    }
    Ok(())
  }

  async fn tag_deleted(&self, keys: &[String], now: u64, retain_until: u64) -> Result<(), BoxError> {
    for key in keys {
      let mut guard = self.shard(key).write();
      if let Some(record) = guard.get_mut(key.as_str()) {
        // Never move an already-stale expiry forward again.
        let expiry = record.logical_expiry.map_or(now, |e| e.min(now));
        record.logical_expiry = Some(expiry);
        record.lock_owner = None;
        record.retain_until = Some(retain_until);
      }
    }
    Ok(())
  }

  async fn set_entry(&self, key: &str, value: Option<Bytes>, expiry: u64) -> Result<(), BoxError> {
    self
      .shard(key)
      .write()
      .insert(key.to_owned(), EntryRecord::populated(value, expiry));
    Ok(())
  }
}
