//! A stampede-safe, read-through cache in front of a key-value store.
//!
//! # Features
//! - **One load per key**: concurrent misses on a key are collapsed into a
//!   single loader call by a claim stored alongside the entry itself, so the
//!   guarantee holds across processes sharing the store.
//! - **Soft deletes**: invalidation tags entries stale instead of removing
//!   them, which closes the window in which a slow reader could write data
//!   older than the invalidation back into the cache.
//! - **Strong & eventual reads**: wait (bounded, with jittered backoff) for a
//!   fresh value, or serve the stale one and refresh it in the background.
//! - **Anti-avalanche**: freshness deadlines are randomly shortened so keys
//!   loaded together do not expire together.
//! - **Optional negative caching** for keys the source does not have.
//!
//! ```no_run
//! use rockscache::{CacheBuilder, Consistency};
//! use std::collections::HashMap;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = CacheBuilder::<u64, String>::json()
//!   .key_prefix("user:")
//!   .loader(|ids| Ok(ids.into_iter().map(|id| (id, format!("user-{id}"))).collect::<HashMap<_, _>>()))
//!   .build()?;
//!
//! let users = cache.fetch_all([1, 2, 3]).await?;
//! assert_eq!(users.values.len(), 3);
//!
//! // After writing to the source of truth:
//! cache.tag_all_as_deleted([2]).await?;
//! let fresh = cache.with_consistency(Consistency::Strong).fetch(2).await?;
//! # Ok(())
//! # }
//! ```

// Public modules that form the API
pub mod builder;
pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod options;
pub mod runtime;
pub mod store;

// Internal, crate-only modules
mod backoff;
mod batch;
mod delete;
mod fetch;
mod loader;
mod shared;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use codec::{DisplayKey, JsonValue, KeySerializer, ValueSerializer};
pub use config::OptionsConfig;
pub use entry::{Claim, EntryRecord, EntryState};
pub use error::{BoxError, BuildError, Error, Result};
pub use fetch::Fetched;
pub use handles::Cache;
pub use loader::LoadResult;
pub use metrics::MetricsSnapshot;
pub use options::{Consistency, Options};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use store::{MemoryStore, Store};
