//! Podscript Optimistic Mutations
//!
//! Generic optimistic-update adapter over a keyed query cache: the cache
//! shows the expected result before the remote call resolves and is
//! restored if it fails.
//!
//! - [`QueryCache`]: the cache abstraction (cancel in-flight, get, set, remove)
//! - [`MemoryQueryCache`]: moka-backed implementation with tracked fetches
//! - [`OptimisticMutation`]: single-entry mutation with snapshot rollback
//! - [`bulk_remove`]: parallel removal with per-item rollback
//!
//! # Example
//!
//! ```rust
//! use podscript_optimistic::{MemoryQueryCache, OptimisticMutation, QueryCache};
//!
//! # tokio_test_block_on(async {
//! let cache: MemoryQueryCache<&str, u32> = MemoryQueryCache::new(64);
//! cache.set("counter", 1).await?;
//!
//! let result = OptimisticMutation::new("counter", |n: &u32| n + 1)
//!     .execute(&cache, || async { Err::<(), _>("offline") })
//!     .await;
//!
//! assert!(result.is_err());
//! assert_eq!(cache.get(&"counter").await?, Some(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })
//! # .unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod bulk;
mod cache;
mod error;
mod mutation;

pub use bulk::{bulk_remove, BulkOutcome};
pub use cache::{MemoryQueryCache, QueryCache};
pub use error::{CacheError, FetchError, MutationError};
pub use mutation::OptimisticMutation;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
