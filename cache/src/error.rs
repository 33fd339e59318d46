use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A type-erased error produced by a loader or a store implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced per key by fetch and soft-delete operations.
///
/// `Error` is `Clone` because one failure (a loader call or a store round
/// trip) is attributed to every key of the chunk it covered.
#[derive(Debug, Clone, Error)]
pub enum Error {
  /// The loader returned an error for a chunk containing this key.
  #[error("loader failed: {0}")]
  LoaderFailure(Arc<BoxError>),

  /// A strong read waited for another actor's refresh longer than allowed.
  #[error("timed out after {waited:?} waiting for key '{key}' to be refreshed")]
  LoadTimeout { key: String, waited: Duration },

  /// A store gateway call failed.
  #[error("store unavailable: {0}")]
  StoreUnavailable(Arc<BoxError>),

  /// A cached value could not be encoded or decoded.
  #[error("codec error for key '{key}': {message}")]
  Codec { key: String, message: String },
}

impl Error {
  pub(crate) fn loader(err: BoxError) -> Self {
    Error::LoaderFailure(Arc::new(err))
  }

  pub(crate) fn store(err: BoxError) -> Self {
    Error::StoreUnavailable(Arc::new(err))
  }
}

/// A specialized `Result` type for cache operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur when building a cache or parsing its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The batch size must be at least one.
  #[error("batch size cannot be zero")]
  ZeroBatchSize,

  /// A duration option that must be non-zero was zero.
  #[error("option '{0}' must be a non-zero duration")]
  ZeroDuration(&'static str),

  /// The expiry adjustment must lie in `[0, 1)`.
  #[error("random expire adjustment must be in [0, 1), got {0}")]
  InvalidAdjustment(String),

  /// Neither `loader` nor `async_loader` was configured.
  #[error("a loader is required to build a cache")]
  MissingLoader,

  /// No key serializer was configured.
  #[error("a key serializer is required to build a cache")]
  MissingKeySerializer,

  /// No value serializer was configured.
  #[error("a value serializer is required to build a cache")]
  MissingValueSerializer,

  /// No `TaskSpawner` was given and there is no Tokio runtime to fall back on.
  #[error("background refresh requires a task spawner or a running tokio runtime")]
  SpawnerRequired,

  /// The configuration document could not be parsed.
  #[error("failed to parse configuration: {0}")]
  ConfigParse(String),

  /// A configuration value was malformed.
  #[error("invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },
}
