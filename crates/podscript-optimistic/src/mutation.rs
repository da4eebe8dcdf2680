//! Single-entry optimistic mutation
//!
//! Steps, in order:
//! 1. cancel in-flight fetch for the key
//! 2. snapshot the cached value
//! 3. apply the optimistic transform
//! 4. run the remote call
//! 5. on success, optionally merge the response
//! 6. on failure, restore the snapshot

use crate::cache::QueryCache;
use crate::error::MutationError;
use std::fmt::{Debug, Display};
use std::future::Future;

type ApplyFn<V> = Box<dyn FnOnce(&V) -> V + Send>;
type MergeFn<V, T> = Box<dyn FnOnce(&V, &T) -> V + Send>;

/// Builder for one optimistic mutation against a cache entry
pub struct OptimisticMutation<K, V, T> {
    key: K,
    label: &'static str,
    apply: ApplyFn<V>,
    merge: Option<MergeFn<V, T>>,
}

impl<K, V, T> OptimisticMutation<K, V, T>
where
    K: Clone + Debug + Send + Sync,
    V: Send + Sync,
{
    /// Mutation on `key` whose optimistic effect is `apply`
    ///
    /// `apply` runs only if a value is cached; an uncached entry has nothing
    /// to show optimistically.
    #[must_use]
    pub fn new<F>(key: K, apply: F) -> Self
    where
        F: FnOnce(&V) -> V + Send + 'static,
    {
        Self {
            key,
            label: "mutation",
            apply: Box::new(apply),
            merge: None,
        }
    }

    /// Name used in log fields
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// Merge the server response into the cached value on success
    #[must_use]
    pub fn with_merge<F>(mut self, merge: F) -> Self
    where
        F: FnOnce(&V, &T) -> V + Send + 'static,
    {
        self.merge = Some(Box::new(merge));
        self
    }

    /// Run the mutation
    ///
    /// # Errors
    /// - [`MutationError::Remote`] if `remote` fails (cache restored first)
    /// - [`MutationError::Cache`] if the cache cannot be read or written
    pub async fn execute<C, R, Fut, E>(self, cache: &C, remote: R) -> Result<T, MutationError<E>>
    where
        C: QueryCache<K, V> + ?Sized,
        R: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Self {
            key,
            label,
            apply,
            merge,
        } = self;

        cache.cancel_in_flight(&key).await;
        let snapshot = cache.get(&key).await?;
        if let Some(current) = &snapshot {
            cache.set(key.clone(), apply(current)).await?;
            tracing::debug!(?key, label, "optimistic value applied");
        }

        match remote().await {
            Ok(response) => {
                if let Some(merge) = merge {
                    if let Some(current) = cache.get(&key).await? {
                        cache.set(key.clone(), merge(&current, &response)).await?;
                    }
                }
                Ok(response)
            }
            Err(err) => {
                if let Some(previous) = snapshot {
                    cache.set(key.clone(), previous).await?;
                }
                tracing::warn!(?key, label, error = %err, "remote call failed, rolled back");
                Err(MutationError::Remote(err))
            }
        }
    }
}

impl<K: Debug, V, T> Debug for OptimisticMutation<K, V, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticMutation")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("merge", &self.merge.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryQueryCache;

    #[derive(Debug, Clone, PartialEq)]
    struct Doc {
        status: &'static str,
        job: Option<u32>,
    }

    async fn cache_with(doc: Doc) -> MemoryQueryCache<&'static str, Doc> {
        let cache = MemoryQueryCache::new(8);
        cache.set("doc", doc).await.unwrap();
        cache
    }

    #[tokio::test]
    async fn success_keeps_optimistic_value() {
        let cache = cache_with(Doc { status: "idle", job: None }).await;

        let out = OptimisticMutation::new("doc", |d: &Doc| Doc { status: "busy", ..d.clone() })
            .execute(&cache, || async { Ok::<_, String>(5u32) })
            .await
            .unwrap();

        assert_eq!(out, 5);
        assert_eq!(cache.get(&"doc").await.unwrap().unwrap().status, "busy");
    }

    #[tokio::test]
    async fn success_merges_response() {
        let cache = cache_with(Doc { status: "idle", job: None }).await;

        OptimisticMutation::new("doc", |d: &Doc| Doc { status: "busy", ..d.clone() })
            .with_merge(|d: &Doc, job: &u32| Doc { job: Some(*job), ..d.clone() })
            .execute(&cache, || async { Ok::<_, String>(42u32) })
            .await
            .unwrap();

        assert_eq!(cache.get(&"doc").await.unwrap(), Some(Doc { status: "busy", job: Some(42) }));
    }

    #[tokio::test]
    async fn failure_restores_snapshot() {
        let original = Doc { status: "idle", job: None };
        let cache = cache_with(original.clone()).await;

        let err = OptimisticMutation::new("doc", |d: &Doc| Doc { status: "busy", ..d.clone() })
            .with_label("start")
            .execute(&cache, || async { Err::<u32, _>("rejected".to_string()) })
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Remote(ref msg) if msg == "rejected"));
        assert_eq!(cache.get(&"doc").await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn optimistic_value_visible_during_call() {
        let cache = cache_with(Doc { status: "idle", job: None }).await;
        let probe = cache.clone();

        OptimisticMutation::new("doc", |d: &Doc| Doc { status: "busy", ..d.clone() })
            .execute(&cache, || async move {
                let seen = probe.get(&"doc").await.unwrap().unwrap();
                assert_eq!(seen.status, "busy");
                Ok::<_, String>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn uncached_entry_is_left_alone() {
        let cache: MemoryQueryCache<&str, Doc> = MemoryQueryCache::new(8);

        let _ = OptimisticMutation::new("doc", |d: &Doc| d.clone())
            .execute(&cache, || async { Err::<(), _>("x") })
            .await;

        assert_eq!(cache.get(&"doc").await.unwrap(), None);
    }
}
