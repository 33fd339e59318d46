use crate::error::BoxError;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// The result of one loader invocation: the values it could produce.
pub type LoadResult<K, V> = Result<HashMap<K, V>, BoxError>;

/// Holds either a synchronous or an asynchronous batch loader.
///
/// A loader receives a chunk of keys and returns the values it could produce.
/// Keys missing from the returned map are treated as absent at the source.
pub(crate) enum Loader<K, V> {
  Sync(Arc<dyn Fn(Vec<K>) -> LoadResult<K, V> + Send + Sync>),
  Async(Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, LoadResult<K, V>> + Send + Sync>),
}

impl<K, V> Clone for Loader<K, V> {
  fn clone(&self) -> Self {
    match self {
      Loader::Sync(f) => Loader::Sync(f.clone()),
      Loader::Async(f) => Loader::Async(f.clone()),
    }
  }
}

impl<K, V> Loader<K, V>
where
  K: Send + 'static,
  V: Send + 'static,
{
  /// Invokes the loader. Synchronous loaders run on tokio's blocking pool
  /// when a runtime is available so they never stall the async executor.
  pub(crate) async fn load(&self, keys: Vec<K>) -> LoadResult<K, V> {
    match self {
      Loader::Async(f) => f(keys).await,
      Loader::Sync(f) => match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
          let f = f.clone();
          handle
            .spawn_blocking(move || f(keys))
            .await
            .unwrap_or_else(|join_err| Err(Box::new(join_err) as BoxError))
        }
        Err(_) => f(keys),
      },
    }
  }
}
