//! The store gateway: atomic per-key primitives over a key-value store.
//!
//! Every method of [`Store`] must be atomic per key. Implementations backed
//! by a remote store express each one as a single scripted/conditional
//! command so that no caller ever performs a read-then-write pair.

use crate::entry::{Claim, EntryRecord};
use crate::error::BoxError;

use async_trait::async_trait;
use bytes::Bytes;

pub mod memory;

pub use memory::MemoryStore;

/// Atomic entry-record primitives the cache protocols are built on.
#[async_trait]
pub trait Store: Send + Sync + 'static {
  /// Reads each key's record and, for every record that is missing or stale
  /// and not currently claimed, atomically claims it for `owner` by setting
  /// its logical expiry to `lock_until`. A claim also clears the record's
  /// soft-delete retention, so a claimed record is never dropped under its
  /// claimant.
  ///
  /// The returned claims are in the same order as `keys` and carry the record
  /// as observed before the claim.
  async fn get_or_claim(
    &self,
    keys: &[String],
    now: u64,
    lock_until: u64,
    owner: &str,
  ) -> Result<Vec<Claim>, BoxError>;

  /// Reads records without claiming anything, in the order of `keys`.
  ///
  /// The fetch protocol never needs it; it exists for diagnostics and for
  /// gateways layered over other gateways.
  async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<EntryRecord>>, BoxError>;

  /// Writes `value` with the given expiry and clears the claim, but only if
  /// `owner` still holds it. Returns whether the write was applied.
  async fn populate(
    &self,
    key: &str,
    owner: &str,
    value: Option<Bytes>,
    expiry: u64,
  ) -> Result<bool, BoxError>;

  /// Drops `owner`'s claim on `key`, leaving the record immediately claimable.
  async fn release(&self, key: &str, owner: &str, now: u64) -> Result<(), BoxError>;

  /// Marks each key stale as of `now` without touching its value, clears any
  /// claim, and lets the store drop the record after `retain_until`.
  async fn tag_deleted(&self, keys: &[String], now: u64, retain_until: u64) -> Result<(), BoxError>;

  /// Unconditionally writes a fresh record, bypassing any claim.
  ///
  /// Not used by the cache itself. Meant for warming a store ahead of
  /// traffic and for seeding records in tests.
  async fn set_entry(&self, key: &str, value: Option<Bytes>, expiry: u64) -> Result<(), BoxError>;
}
