use bytes::Bytes;

/// The stored representation of one cached item.
///
/// `logical_expiry` is both the freshness deadline and, while `lock_owner` is
/// set, the deadline of a refresh claim. All fields of a record are written
/// together by a single atomic [`Store`](crate::store::Store) operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRecord {
  /// The encoded payload. `None` if never populated or known to be absent.
  pub value: Option<Bytes>,
  /// Unix milliseconds after which the record is stale (or the claim lapses).
  pub logical_expiry: Option<u64>,
  /// Token of the actor currently refreshing this record.
  pub lock_owner: Option<String>,
  /// Unix milliseconds after which the store may drop the record entirely.
  pub retain_until: Option<u64>,
}

/// The classification of an [`EntryRecord`] at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
  /// No record exists.
  Missing,
  /// A populated value that may be served as-is.
  Fresh(Bytes),
  /// A fresh record remembering that the loader could not produce the key.
  FreshEmpty,
  /// Past its logical expiry and not claimed; anyone may claim it.
  Stale(Option<Bytes>),
  /// Claimed by a refresher whose lock has not lapsed yet.
  Locked(Option<Bytes>),
}

impl EntryRecord {
  /// A populated (or negative-cached) record that is fresh until `expiry`.
  pub fn populated(value: Option<Bytes>, expiry: u64) -> Self {
    Self {
      value,
      logical_expiry: Some(expiry),
      lock_owner: None,
      retain_until: None,
    }
  }

  /// True while a refresh claim is held and has not lapsed.
  #[inline]
  pub fn is_locked(&self, now: u64) -> bool {
    self.lock_owner.is_some() && self.logical_expiry.is_some_and(|e| now < e)
  }

  /// True when the record is missing its claim and past its expiry, i.e. a
  /// conditional claim against it would succeed.
  #[inline]
  pub fn is_claimable(&self, now: u64) -> bool {
    self.logical_expiry.map_or(true, |e| now >= e)
  }

  /// True once the physical retention deadline set by a soft-delete passed.
  /// A record under a live claim is never retired.
  #[inline]
  pub fn is_retired(&self, now: u64) -> bool {
    self.retain_until.is_some_and(|r| now >= r) && !self.is_locked(now)
  }

  pub fn state(&self, now: u64) -> EntryState {
    if self.is_locked(now) {
      return EntryState::Locked(self.value.clone());
    }
    if self.is_claimable(now) {
      return EntryState::Stale(self.value.clone());
    }
    match &self.value {
      Some(value) => EntryState::Fresh(value.clone()),
      None => EntryState::FreshEmpty,
    }
  }
}

/// The outcome of a read-and-maybe-claim round trip for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claim {
  /// The record as it was before any claim was applied.
  pub record: Option<EntryRecord>,
  /// Whether this call won the refresh lock.
  pub claimed: bool,
}

impl Claim {
  pub fn state(&self, now: u64) -> EntryState {
    self
      .record
      .as_ref()
      .map_or(EntryState::Missing, |record| record.state(now))
  }

  /// The (possibly stale) value bytes observed, if any.
  pub fn value(&self) -> Option<&Bytes> {
    self.record.as_ref().and_then(|r| r.value.as_ref())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn populated_record_is_fresh_until_expiry() {
    let record = EntryRecord::populated(Some(Bytes::from_static(b"v")), 1_000);
    assert_eq!(record.state(999), EntryState::Fresh(Bytes::from_static(b"v")));
    assert_eq!(
      record.state(1_000),
      EntryState::Stale(Some(Bytes::from_static(b"v")))
    );
  }

  #[test]
  fn claimed_record_reads_as_locked_not_fresh() {
    let record = EntryRecord {
      value: Some(Bytes::from_static(b"old")),
      logical_expiry: Some(500),
      lock_owner: Some("owner-a".into()),
      retain_until: None,
    };
    assert_eq!(
      record.state(100),
      EntryState::Locked(Some(Bytes::from_static(b"old")))
    );
    assert!(!record.is_claimable(100));
    // A lapsed claim is claimable again.
    assert!(record.is_claimable(500));
  }

  #[test]
  fn live_claim_outlasts_retention() {
    let record = EntryRecord {
      value: Some(Bytes::from_static(b"old")),
      logical_expiry: Some(500),
      lock_owner: Some("owner-a".into()),
      retain_until: Some(100),
    };
    assert!(!record.is_retired(200));
    assert!(record.is_retired(500));
  }

  #[test]
  fn empty_record_is_negative_hit() {
    let record = EntryRecord::populated(None, 10);
    assert_eq!(record.state(5), EntryState::FreshEmpty);
    assert_eq!(record.state(10), EntryState::Stale(None));
  }

  #[test]
  fn missing_claim_has_no_value() {
    let claim = Claim::default();
    assert_eq!(claim.state(0), EntryState::Missing);
    assert!(claim.value().is_none());
  }
}
