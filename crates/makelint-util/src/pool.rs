//! Bounded parallel fan-out over a phase's work items.
//!
//! Each phase of the engine dispatches one independent unit of work per
//! tracked file (hash a file, probe its dependencies, run a tool against
//! it). This follows the same `.par_iter().map(...).collect()` dispatch
//! `konvoy-engine`'s build graph uses to build every dependency in one
//! topological level concurrently — generalized here from "one level of a
//! dependency graph" to "every tracked file in a phase", and run on a
//! dedicated thread pool per call so a configured `njobs` is honored exactly
//! rather than deferring to rayon's process-wide default pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use rayon::ThreadPoolBuilder;

use crate::error::UtilError;

/// Cooperative cancellation shared by every task in a single phase's
/// dispatch.
///
/// Rayon's `.map()` has no notion of early-exiting once a result is in, so a
/// fail-fast stop is approximated the same way the rest of this engine
/// approximates it: a task that decides to stop sets the flag, and every
/// other task checks it before starting its own unit of work instead of
/// being interrupted mid-flight.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once some task has called [`Cancellation::cancel`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request that no further queued task start its unit of work.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Run `task` over every item in `items` on a thread pool bounded to `jobs`
/// concurrent threads, OR-accumulating each task's exit-status-like `i32`
/// return value (0 means every item returned 0). A task already skipped
/// because [`Cancellation::is_cancelled`] was true contributes `0`.
///
/// # Errors
/// Returns an error if the bounded thread pool cannot be built.
pub fn run_bounded<T, F>(
    items: Vec<T>,
    jobs: usize,
    cancellation: &Cancellation,
    task: F,
) -> Result<i32, UtilError>
where
    T: Send,
    F: Fn(T, &Cancellation) -> i32 + Sync + Send,
{
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|source| UtilError::ThreadPool {
            message: source.to_string(),
        })?;

    let status = pool.install(|| {
        items
            .into_par_iter()
            .map(|item| {
                if cancellation.is_cancelled() {
                    0
                } else {
                    task(item, cancellation)
                }
            })
            .reduce(|| 0, |a, b| a | b)
    });

    Ok(status)
}
