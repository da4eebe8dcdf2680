//! Query cache abstraction and its in-memory implementation
//!
//! The cache is keyed by entity identity and supports cancelling an
//! in-flight fetch so a stale response cannot land on top of an optimistic
//! write.

use crate::error::{CacheError, FetchError};
use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable, Aborted};
use moka::future::Cache;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Keyed query cache with fetch cancellation
#[async_trait::async_trait]
pub trait QueryCache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send,
{
    /// Cancel any in-flight fetch for `key`; its result will not be written
    async fn cancel_in_flight(&self, key: &K);

    /// Current cached value
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError>;

    /// Overwrite the cached value
    async fn set(&self, key: K, value: V) -> Result<(), CacheError>;

    /// Drop the cached value
    async fn remove(&self, key: &K) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    abort: AbortHandle,
}

/// In-memory [`QueryCache`] backed by moka
///
/// Clones share the same entries and in-flight table.
#[derive(Clone)]
pub struct MemoryQueryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    values: Cache<K, V>,
    in_flight: Arc<DashMap<K, InFlight>>,
    generation: Arc<AtomicU64>,
}

impl<K, V> MemoryQueryCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            values: Cache::new(max_capacity),
            in_flight: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a tracked fetch for `key` is still running
    #[inline]
    #[must_use]
    pub fn is_fetching(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Run `fetch` as a tracked, cancellable fetch for `key`
    ///
    /// On success the value is written to the cache, unless
    /// [`QueryCache::cancel_in_flight`] was called first or a newer fetch for
    /// the same key replaced this one. Starting a fetch cancels the previous
    /// one for that key.
    ///
    /// # Errors
    /// - [`FetchError::Cancelled`] if cancelled or replaced
    /// - [`FetchError::Failed`] if `fetch` returned an error
    /// - [`FetchError::Panicked`] if the fetch task panicked
    pub async fn fetch_with<F, E>(&self, key: K, fetch: F) -> Result<V, FetchError<E>>
    where
        F: Future<Output = Result<V, E>> + Send + 'static,
        E: Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = self.in_flight.insert(key.clone(), InFlight { generation, abort }) {
            tracing::debug!(?key, "replacing in-flight fetch");
            previous.abort.abort();
        }

        let values = self.values.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let task = tokio::spawn(async move {
            let result = Abortable::new(fetch, registration).await;
            // Only the fetch that still owns the slot may write
            let owned = in_flight
                .remove_if(&key, |_, entry| entry.generation == generation)
                .is_some();
            match result {
                Ok(Ok(value)) if owned => {
                    values.insert(key, value.clone()).await;
                    Ok(value)
                }
                Ok(Ok(_)) | Err(Aborted) => Err(FetchError::Cancelled),
                Ok(Err(err)) => Err(FetchError::Failed(err)),
            }
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "fetch task did not complete");
                Err(FetchError::Panicked)
            }
        }
    }
}

impl<K, V> Debug for MemoryQueryCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryQueryCache")
            .field("entries", &self.values.entry_count())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[async_trait::async_trait]
impl<K, V> QueryCache<K, V> for MemoryQueryCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn cancel_in_flight(&self, key: &K) {
        if let Some((_, entry)) = self.in_flight.remove(key) {
            tracing::debug!(?key, "in-flight fetch cancelled");
            entry.abort.abort();
        }
    }

    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        Ok(self.values.get(key).await)
    }

    async fn set(&self, key: K, value: V) -> Result<(), CacheError> {
        self.values.insert(key, value).await;
        Ok(())
    }

    async fn remove(&self, key: &K) -> Result<(), CacheError> {
        self.values.invalidate(key).await;
        Ok(())
    }
}
