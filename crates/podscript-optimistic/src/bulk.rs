//! Bulk removal with partial rollback
//!
//! Every item is removed from the cached list at once, the remote calls run
//! in parallel, and only the items whose call failed are put back.

use crate::cache::QueryCache;
use crate::error::MutationError;
use futures::future::join_all;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;

/// Result of a bulk removal
#[derive(Debug)]
pub struct BulkOutcome<Id, E> {
    /// Ids whose remote call succeeded, in request order
    pub removed: Vec<Id>,
    /// Ids whose remote call failed, with the error, in request order
    pub failed: Vec<(Id, E)>,
}

impl<Id, E> BulkOutcome<Id, E> {
    /// Total number of remote calls issued
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.removed.len() + self.failed.len()
    }

    /// Whether every call succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Collapse into the removed ids, or one aggregate error
    ///
    /// # Errors
    /// Returns [`MutationError::PartialFailure`] if any call failed
    pub fn into_result(self) -> Result<Vec<Id>, MutationError<E>> {
        if self.failed.is_empty() {
            Ok(self.removed)
        } else {
            Err(MutationError::partial(self.failed.len(), self.total()))
        }
    }
}

/// Optimistically remove `ids` from the list cached at `key`
///
/// `id_of` extracts an item's id; `remote` deletes one id. Duplicate ids are
/// issued once. A failed item is restored right after its nearest
/// predecessor (in pre-removal order) that is still in the list, or at the
/// front if none is.
///
/// # Errors
/// Returns [`MutationError::Cache`] if the cache cannot be read or written.
/// Remote failures are reported in the outcome, not as an error.
pub async fn bulk_remove<C, K, I, Id, F, R, Fut, E>(
    cache: &C,
    key: &K,
    ids: &[Id],
    id_of: F,
    remote: R,
) -> Result<BulkOutcome<Id, E>, MutationError<E>>
where
    C: QueryCache<K, Vec<I>> + ?Sized,
    K: Clone + Debug + Send + Sync,
    I: Clone + Send + Sync,
    Id: Clone + Eq + Hash + Debug,
    F: Fn(&I) -> Id,
    R: Fn(Id) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut seen = HashSet::new();
    let ids: Vec<Id> = ids.iter().filter(|id| seen.insert((*id).clone())).cloned().collect();
    let targets: HashSet<&Id> = ids.iter().collect();

    cache.cancel_in_flight(key).await;
    let snapshot = cache.get(key).await?;
    if let Some(list) = &snapshot {
        let kept: Vec<I> = list.iter().filter(|item| !targets.contains(&id_of(item))).cloned().collect();
        cache.set(key.clone(), kept).await?;
    }

    let calls = ids.iter().cloned().map(|id| {
        let call = remote(id.clone());
        async move { (id, call.await) }
    });
    let mut outcome = BulkOutcome {
        removed: Vec::new(),
        failed: Vec::new(),
    };
    for (id, result) in join_all(calls).await {
        match result {
            Ok(()) => outcome.removed.push(id),
            Err(err) => {
                tracing::warn!(?key, ?id, error = %err, "bulk item failed");
                outcome.failed.push((id, err));
            }
        }
    }

    if outcome.failed.is_empty() {
        tracing::info!(?key, removed = outcome.removed.len(), "bulk removal complete");
        return Ok(outcome);
    }

    if let Some(before) = &snapshot {
        let failed: HashSet<&Id> = outcome.failed.iter().map(|(id, _)| id).collect();
        let mut current = match cache.get(key).await? {
            Some(list) => list,
            None => before.iter().filter(|item| !targets.contains(&id_of(item))).cloned().collect(),
        };
        restore_failed(&mut current, before, &failed, &id_of);
        cache.set(key.clone(), current).await?;
    }
    tracing::warn!(
        ?key,
        failed = outcome.failed.len(),
        total = outcome.total(),
        "bulk removal partially rolled back"
    );
    Ok(outcome)
}

/// Put failed items back next to their nearest surviving predecessor
fn restore_failed<I, Id, F>(current: &mut Vec<I>, before: &[I], failed: &HashSet<&Id>, id_of: &F)
where
    I: Clone,
    Id: Eq + Hash,
    F: Fn(&I) -> Id,
{
    for (pos, item) in before.iter().enumerate() {
        let id = id_of(item);
        if !failed.contains(&id) || current.iter().any(|c| id_of(c) == id) {
            continue;
        }
        let anchor = before[..pos].iter().rev().find_map(|prev| {
            let prev_id = id_of(prev);
            current.iter().position(|c| id_of(c) == prev_id)
        });
        current.insert(anchor.map_or(0, |at| at + 1), item.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_keeps_original_order() {
        let before = vec![1, 2, 3, 4, 5];
        let mut current = vec![1, 3, 5];
        let failed: HashSet<&i32> = [&2, &4].into_iter().collect();

        restore_failed(&mut current, &before, &failed, &|x: &i32| *x);
        assert_eq!(current, before);
    }

    #[test]
    fn restore_with_no_survivor_goes_to_front() {
        let before = vec![1, 2, 3];
        let mut current = vec![3];
        let failed: HashSet<&i32> = [&1].into_iter().collect();

        restore_failed(&mut current, &before, &failed, &|x: &i32| *x);
        assert_eq!(current, vec![1, 3]);
    }

    #[test]
    fn restore_skips_items_already_present() {
        let before = vec![1, 2];
        let mut current = vec![1, 2];
        let failed: HashSet<&i32> = [&2].into_iter().collect();

        restore_failed(&mut current, &before, &failed, &|x: &i32| *x);
        assert_eq!(current, vec![1, 2]);
    }

    #[test]
    fn outcome_into_result() {
        let ok: BulkOutcome<u8, String> = BulkOutcome {
            removed: vec![1, 2],
            failed: vec![],
        };
        assert_eq!(ok.into_result().unwrap(), vec![1, 2]);

        let partial: BulkOutcome<u8, String> = BulkOutcome {
            removed: vec![1],
            failed: vec![(2, "x".into()), (3, "y".into())],
        };
        assert!(matches!(
            partial.into_result(),
            Err(MutationError::PartialFailure { failed: 2, total: 3 })
        ));
    }
}
