//! Bounded-parallelism execution of async work over a collection.
//!
//! The source is split into `parallelism` interleaved partitions and each
//! partition is processed sequentially by its own spawned worker, so at most
//! `parallelism` bodies run at once. The caller's token is checked before
//! every item. The first failure stops the remaining workers before their
//! next item; items already in flight run to completion and the first
//! failure is returned once every worker has finished.
//!
//! ## Example
//!
//! ```
//! use courier_core::parallel;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let cancel = CancellationToken::new();
//! let lengths = parallel::map(
//!     vec!["alpha", "beta", "gamma"],
//!     |word, _cancel| async move { Ok::<_, String>(word.len()) },
//!     Some(2),
//!     &cancel,
//! )
//! .await
//! .unwrap();
//!
//! // Partition 0 holds "alpha" and "gamma", partition 1 holds "beta".
//! assert_eq!(lengths, vec![5, 5, 4]);
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Error returned by [`for_each`] and [`map`].
#[derive(Debug)]
pub enum ParallelError<E> {
    /// The caller's token was cancelled.
    Cancelled,
    /// A body failed.
    Failed(E),
    /// A worker panicked.
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for ParallelError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Parallel execution cancelled"),
            Self::Failed(e) => write!(f, "{}", e),
            Self::Panicked(msg) => write!(f, "Parallel worker panicked: {}", msg),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ParallelError<E> {}

/// Default parallelism: the number of available CPUs.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Run `body` for every item with at most `parallelism` concurrent bodies.
///
/// `None` or `Some(0)` selects [`default_parallelism`].
pub async fn for_each<I, T, F, Fut, E>(
    source: I,
    body: F,
    parallelism: Option<usize>,
    cancel: &CancellationToken,
) -> Result<(), ParallelError<E>>
where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    map(source, body, parallelism, cancel).await.map(|_| ())
}

/// Run `body` for every item and collect the results.
///
/// Results are concatenated partition by partition, so with a parallelism
/// above one they are not in source order.
pub async fn map<I, T, R, F, Fut, E>(
    source: I,
    body: F,
    parallelism: Option<usize>,
    cancel: &CancellationToken,
) -> Result<Vec<R>, ParallelError<E>>
where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Send + 'static,
{
    let parallelism = parallelism
        .filter(|p| *p > 0)
        .unwrap_or_else(default_parallelism);
    let partitions = partition(source, parallelism);
    let body = Arc::new(body);

    debug!(parallelism, "Starting parallel workers");

    // Cancelled on the first failure; workers check it between items only.
    let stop = cancel.child_token();
    let mut workers = JoinSet::new();
    for (index, items) in partitions.into_iter().enumerate() {
        let body = Arc::clone(&body);
        let cancel = cancel.clone();
        let stop = stop.clone();

        workers.spawn(async move {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                if stop.is_cancelled() {
                    return (index, Err(ParallelError::Cancelled));
                }
                match body(item, cancel.clone()).await {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        stop.cancel();
                        return (index, Err(ParallelError::Failed(e)));
                    }
                }
            }
            (index, Ok(results))
        });
    }

    let mut collected: Vec<Option<Vec<R>>> = (0..parallelism).map(|_| None).collect();
    let mut first_error: Option<ParallelError<E>> = None;
    while let Some(joined) = workers.join_next().await {
        let outcome = match joined {
            Ok((index, Ok(results))) => {
                collected[index] = Some(results);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) if e.is_panic() => ParallelError::Panicked(e.to_string()),
            Err(_) => ParallelError::Cancelled,
        };

        stop.cancel();
        // Workers stopped by a sibling's failure report `Cancelled`; keep the cause.
        first_error = match first_error {
            None => Some(outcome),
            Some(ParallelError::Cancelled) if !matches!(outcome, ParallelError::Cancelled) => {
                Some(outcome)
            }
            kept => kept,
        };
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(collected.into_iter().flatten().flatten().collect()),
    }
}

/// Split items round-robin into exactly `count` partitions.
fn partition<I, T>(source: I, count: usize) -> Vec<Vec<T>>
where
    I: IntoIterator<Item = T>,
{
    let mut partitions: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();
    for (i, item) in source.into_iter().enumerate() {
        partitions[i % count].push(item);
    }
    partitions
}
