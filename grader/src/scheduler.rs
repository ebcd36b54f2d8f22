//! Fan-out Scheduler
//!
//! Runs one task per input with an optional bound on how many run at once. Each task owns
//! exactly one output slot, addressed by the input's index, so results come back in input
//! order whatever order tasks finish in. Aggregation happens afterwards, sequentially
//! (see [`crate::summary`]).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use gitlab_client::BuildFacade;
use tokio::sync::Semaphore;
use tracing::{error, info};
use util::RosterEntry;
use util::roster::ResultRow;

use crate::error::UnitError;
use crate::unit::{self, Grading, UnitAudit, UnitResult};

/// How many tasks may run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workers {
    /// For read-mostly listing work.
    Unbounded,
    /// At most this many tasks at a time; zero is treated as one.
    Bounded(usize),
}

impl Workers {
    fn semaphore(self) -> Option<Arc<Semaphore>> {
        match self {
            Workers::Unbounded => None,
            Workers::Bounded(n) => Some(Arc::new(Semaphore::new(n.max(1)))),
        }
    }
}

/// Runs `work` once per item and returns the outputs in input order.
///
/// A task that panics does not affect the others; its slot is filled by `on_panic`
/// with the item it was given.
pub async fn fan_out<T, R, F, Fut, P>(items: &[T], workers: Workers, work: F, on_panic: P) -> Vec<R>
where
    T: Clone + Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    P: Fn(&T) -> R,
{
    let sem = workers.semaphore();
    let mut futs = FuturesUnordered::new();

    for (index, item) in items.iter().cloned().enumerate() {
        let sem = sem.clone();
        let task = work(item);
        let handle = tokio::spawn(async move {
            // The semaphore is never closed, so a failed acquire only means "no bound".
            let _permit = match sem {
                Some(s) => s.acquire_owned().await.ok(),
                None => None,
            };
            task.await
        });
        futs.push(async move { (index, handle.await) });
    }

    let mut slots: Vec<Option<R>> = items.iter().map(|_| None).collect();
    while let Some((index, joined)) = futs.next().await {
        slots[index] = Some(match joined {
            Ok(output) => output,
            Err(e) => {
                error!(index, error = %e, "Task did not complete");
                on_panic(&items[index])
            }
        });
    }

    slots.into_iter().flatten().collect()
}

/// Grades one class.
///
/// With `seeds` (a previous result file for the same class), rows whose score is not
/// `Failed` are reused unchanged and only the rest are graded again. Seeds are matched
/// by username.
pub async fn score_class(
    facade: Arc<dyn BuildFacade>,
    grading: Arc<Grading>,
    roster: &[RosterEntry],
    seeds: Option<&[ResultRow]>,
    workers: Workers,
) -> Vec<UnitResult> {
    let cached: HashMap<&str, &str> = seeds
        .unwrap_or_default()
        .iter()
        .filter(|row| !row.is_failed())
        .map(|row| (row.entry.username.as_str(), row.score.as_str()))
        .collect();

    let mut slots: Vec<Option<UnitResult>> = Vec::with_capacity(roster.len());
    let mut todo = Vec::new();
    for entry in roster {
        match cached.get(entry.username.as_str()) {
            Some(label) => slots.push(Some(UnitResult::cached(entry.clone(), label))),
            None => {
                slots.push(None);
                todo.push(entry.clone());
            }
        }
    }
    if seeds.is_some() {
        info!(
            assignment = %grading.assignment,
            cached = roster.len() - todo.len(),
            retrying = todo.len(),
            "Resuming from previous results"
        );
    }

    let graded = fan_out(
        &todo,
        workers,
        |entry| {
            let facade = Arc::clone(&facade);
            let grading = Arc::clone(&grading);
            async move { unit::process(facade.as_ref(), &grading, entry).await }
        },
        |entry| UnitResult::failed(entry.clone(), &UnitError::Panicked, UnitAudit::default()),
    )
    .await;

    let mut graded = graded.into_iter();
    slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| graded.next()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn preserves_input_order() {
        let items: Vec<u64> = (0..20).collect();
        let out = fan_out(
            &items,
            Workers::Bounded(4),
            |n| async move {
                // Later items finish first.
                tokio::time::sleep(Duration::from_millis(40 - 2 * n)).await;
                n * 10
            },
            |_| u64::MAX,
        )
        .await;
        assert_eq!(out, items.iter().map(|n| n * 10).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bound_limits_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..24).collect();

        let out = fan_out(
            &items,
            Workers::Bounded(3),
            |n| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    n
                }
            },
            |_| usize::MAX,
        )
        .await;

        assert_eq!(out.len(), 24);
        assert!(peak.load(Ordering::SeqCst) <= 3, "peak was {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_task_gets_fallback_without_losing_others() {
        let items = vec![1, 2, 3];
        let out = fan_out(
            &items,
            Workers::Unbounded,
            |n| async move {
                if n == 2 {
                    panic!("boom");
                }
                n
            },
            |n| -n,
        )
        .await;
        assert_eq!(out, vec![1, -2, 3]);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let items: Vec<u8> = Vec::new();
        let out = fan_out(&items, Workers::Bounded(0), |n| async move { n }, |n| *n).await;
        assert!(out.is_empty());
    }
}
