//! Coalescing, bounded-parallelism work queue keyed by path.
//!
//! Mirrors the "AsyncQueue" component of the cache core: at most one job runs
//! per key at a time, every caller that asks for the same key while a job is
//! in flight shares its eventual result, and the live concurrency budget can
//! be nudged up or down without disturbing jobs already running.
//!
//! The single-threaded callback-coalescing queue this is modeled on has no
//! direct Rust analogue, so the mechanism here is a `tokio` encoding instead:
//! a `Mutex<HashMap<K, Shared<...>>>` stands in for the "one pending job per
//! key" table, and a `Semaphore` stands in for the parallelism budget. Each
//! job is spawned onto the runtime (not just polled inline) so that a waiter
//! dropping its handle never cancels the job for everyone else — matching
//! "callers abandoning a snapshot simply drop the callback" in the source.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinError;

/// The future type every queued job is reduced to: boxed, shared, and
/// cloneable so every attached waiter can `.await` the same outcome.
type JobFuture<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A job only stays in `pending` while it is actually in flight: once it
/// resolves, the entry is dropped so a later (non-concurrent) `add` for the
/// same key dispatches a fresh job rather than replaying a stale result
/// forever. The generation counter disambiguates "this job's completion
/// should remove the entry" from "a newer job has already replaced it".
struct PendingJob<V, E> {
    generation: u64,
    future: JobFuture<V, E>,
}

/// A coalescing, bounded-parallelism queue of jobs keyed by `K`.
///
/// `E` must be constructible from a [`JoinError`] because jobs run on spawned
/// tasks: if a task panics, every waiter needs some representation of that
/// failure in its own error type.
pub struct AsyncQueue<K, V, E> {
    pending: Mutex<HashMap<K, PendingJob<V, E>>>,
    semaphore: Arc<Semaphore>,
    next_generation: AtomicU64,
}

impl<K, V, E> AsyncQueue<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    /// Create a queue with a fixed initial parallelism budget.
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(parallelism.max(1))),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Enqueue (or attach to) the job for `key`.
    ///
    /// If a job for `key` is already pending, the returned future resolves to
    /// the same `(Ok|Err)` outcome that job produces — the processor itself
    /// never runs twice for concurrently-coalesced callers. Callers with a
    /// cache of their own should check it before calling `add`; this queue
    /// does not consult any cache, it only coalesces concurrent misses — once
    /// a job finishes, its entry is removed, so a later call for the same key
    /// (after the in-flight job is gone) dispatches a fresh job rather than
    /// replaying the old result forever.
    pub async fn add<F, Fut>(&self, key: K, job: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        // Only the caller that actually inserts a new job (as opposed to
        // attaching to one already in flight) is responsible for retiring
        // it from `pending` once it resolves — attached waiters just await
        // the shared future and leave bookkeeping to the inserter.
        let (shared, generation) = {
            let mut pending = self.pending.lock().await;
            if let Some(existing) = pending.get(&key) {
                (existing.future.clone(), None)
            } else {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let semaphore = self.semaphore.clone();
                let task: BoxFuture<'static, Result<V, E>> = async move {
                    let permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("semaphore is never closed");
                    let result = job().await;
                    drop(permit);
                    result
                }
                .boxed();
                let handle = tokio::spawn(task);
                let flattened: BoxFuture<'static, Result<V, E>> = async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(join_err) => Err(E::from(join_err)),
                    }
                }
                .boxed();
                let shared = flattened.shared();
                pending.insert(key.clone(), PendingJob { generation, future: shared.clone() });
                (shared, Some(generation))
            }
        };

        let result = shared.await;
        if let Some(generation) = generation {
            self.retire(&key, generation).await;
        }
        result
    }

    /// Remove `key`'s entry from `pending` once its job has resolved, but
    /// only if a newer job (higher generation) hasn't already replaced it —
    /// another caller may have raced an `add` for the same key after this
    /// job's result was observed but before retirement ran.
    async fn retire(&self, key: &K, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending.get(key).map(|p| p.generation) == Some(generation) {
            pending.remove(key);
        }
    }

    /// Raise the live parallelism budget by one permit, effective immediately.
    ///
    /// Used by directory-content hashing to avoid self-deadlock: before
    /// awaiting a recursive subdirectory hash under a low default
    /// parallelism (e.g. 2), the caller raises the budget so the recursive
    /// call can actually get a permit.
    pub fn increase_parallelism(&self) {
        self.semaphore.add_permits(1);
    }

    /// Undo a prior [`Self::increase_parallelism`] once the budget is no
    /// longer needed, without blocking callers that still hold permits.
    ///
    /// If a permit is immediately available it is removed right away;
    /// otherwise the removal is deferred to a background task that waits for
    /// one to free up, so this call never blocks the caller.
    pub fn decrease_parallelism(&self) {
        if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
            permit.forget();
        } else {
            let semaphore = self.semaphore.clone();
            tokio::spawn(async move {
                if let Ok(permit) = semaphore.acquire_owned().await {
                    permit.forget();
                }
            });
        }
    }
}
