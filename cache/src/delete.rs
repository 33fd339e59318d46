//! Soft-delete: mark entries stale without removing their values.
//!
//! A tagged record keeps serving eventual readers while exactly one reader
//! reloads it, and because tagging clears the refresh claim, a reader that
//! loaded from the source before the write cannot store its result
//! afterwards.

use crate::batch;
use crate::error::{Error, Result};
use crate::metrics::bump;
use crate::options::Options;
use crate::shared::CacheShared;
use crate::time;

use ahash::AHashSet;
use futures_util::future::join_all;
use tracing::{debug, warn};

pub(crate) async fn tag_all<K, V>(
  shared: &CacheShared<K, V>,
  options: &Options,
  keys: Vec<K>,
) -> Result<()>
where
  K: 'static,
  V: 'static,
{
  if options.disable_cache_delete || keys.is_empty() {
    return Ok(());
  }

  let mut seen = AHashSet::with_capacity(keys.len());
  let store_keys: Vec<String> = keys
    .iter()
    .map(|k| shared.store_key(k))
    .filter(|k| seen.insert(k.clone()))
    .collect();
  debug!(prefix = %shared.key_prefix, keys = store_keys.len(), "tagging keys as deleted");

  let now = time::now_millis();
  let retain_until = time::after(now, options.delete_retention);
  let chunks = batch::split(store_keys, options.batch_size);
  let results = join_all(chunks.iter().map(|chunk| {
    shared.store.tag_deleted(chunk, now, retain_until)
  }))
  .await;

  let mut first_error = None;
  for (chunk, result) in chunks.iter().zip(results) {
    match result {
      Ok(()) => bump(&shared.metrics.keys_tagged, chunk.len()),
      Err(e) => {
        bump(&shared.metrics.store_errors, 1);
        warn!(prefix = %shared.key_prefix, keys = chunk.len(), error = %e, "failed to tag keys as deleted");
        first_error.get_or_insert(Error::store(e));
      }
    }
  }
  first_error.map_or(Ok(()), Err)
}
