use crate::fetch::Fetched;

use std::future::Future;
use std::hash::Hash;

use futures_util::future::join_all;

/// Partitions `items` into consecutive chunks of at most `batch_size`.
///
/// A set smaller than `batch_size` is returned as a single chunk, even when
/// empty. `batch_size` must be non-zero (enforced by `Options::validate`).
pub(crate) fn split<E>(items: Vec<E>, batch_size: usize) -> Vec<Vec<E>> {
  if items.len() < batch_size {
    return vec![items];
  }
  let mut chunks = Vec::with_capacity(items.len().div_ceil(batch_size));
  let mut iter = items.into_iter().peekable();
  while iter.peek().is_some() {
    chunks.push(iter.by_ref().take(batch_size).collect());
  }
  chunks
}

/// Runs `op` once per chunk, concurrently, and merges the per-chunk outcomes.
pub(crate) async fn execute<E, K, V, F, Fut>(items: Vec<E>, batch_size: usize, op: F) -> Fetched<K, V>
where
  K: Eq + Hash,
  F: Fn(Vec<E>) -> Fut,
  Fut: Future<Output = Fetched<K, V>>,
{
  let outcomes = join_all(split(items, batch_size).into_iter().map(op)).await;
  let mut merged = Fetched::default();
  for outcome in outcomes {
    merged.merge(outcome);
  }
  merged
}
