use std::{future::Future, pin::Pin};

/// A trait for spawning a future onto an asynchronous runtime.
///
/// Background refreshes are handed to the spawner and run detached from the
/// call that triggered them.
pub trait TaskSpawner: Send + Sync + 'static {
  /// Spawns a type-erased future.
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

pub struct TokioSpawner(tokio::runtime::Handle);

impl TokioSpawner {
  /// Creates a spawner for the current Tokio runtime, or `None` outside of one.
  pub fn try_current() -> Option<Self> {
    tokio::runtime::Handle::try_current().ok().map(Self)
  }

  /// Creates a spawner bound to an explicit runtime handle.
  pub fn with_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

impl TaskSpawner for TokioSpawner {
  fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
    self.0.spawn(future);
  }
}
