//! Bounded-concurrency streaming map.
//!
//! [`ParMap`] applies an I/O-bound transform across a lazy entry stream
//! using a dedicated fixed-size Rayon pool, with an in-flight window of
//! `workers * 4` items. The source iterator is pulled one window at a
//! time, the window is mapped in parallel, and results are handed back in
//! **input order** from a pull-based iterator — the streaming-map
//! discipline. Memory held for in-flight work is bounded by the window,
//! never by the dataset size.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::VecDeque;

/// Upper bound on transform workers, matching the conversion tool's
/// historical `min(32, cpus * 4)` sizing.
pub const DEFAULT_WORKER_CAP: usize = 32;

/// In-flight items per worker.
const WINDOW_PER_WORKER: usize = 4;

/// Worker count for a given cap: `min(cap, cpus * 4)`, at least one.
#[must_use]
pub fn default_workers(cap: usize) -> usize {
    cap.min(num_cpus::get().saturating_mul(4)).max(1)
}

/// Order-preserving parallel map over a lazy source.
///
/// Owns its own [`rayon::ThreadPool`] so the transform never contends with
/// a global pool configured elsewhere in the process.
pub struct ParMap<I, F, O>
where
    I: Iterator,
{
    source: I,
    op: F,
    pool: rayon::ThreadPool,
    window: usize,
    ready: VecDeque<O>,
    exhausted: bool,
}

impl<I, F, O> ParMap<I, F, O>
where
    I: Iterator,
    I::Item: Send,
    O: Send,
    F: Fn(I::Item) -> O + Sync,
{
    /// Build a mapper with `workers` threads (clamped to at least one).
    ///
    /// # Errors
    /// Fails if the thread pool cannot be constructed.
    pub fn new(source: I, workers: usize, op: F) -> Result<Self> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("build transform thread pool")?;
        Ok(Self {
            source,
            op,
            pool,
            window: workers * WINDOW_PER_WORKER,
            ready: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Pull one window from the source and map it in parallel.
    fn refill(&mut self) {
        let chunk: Vec<I::Item> = self.source.by_ref().take(self.window).collect();
        if chunk.is_empty() {
            self.exhausted = true;
            return;
        }
        let op = &self.op;
        let mapped: Vec<O> = self
            .pool
            .install(|| chunk.into_par_iter().map(|item| op(item)).collect());
        self.ready.extend(mapped);
    }
}

impl<I, F, O> Iterator for ParMap<I, F, O>
where
    I: Iterator,
    I::Item: Send,
    O: Send,
    F: Fn(I::Item) -> O + Sync,
{
    type Item = O;

    fn next(&mut self) -> Option<O> {
        while self.ready.is_empty() && !self.exhausted {
            self.refill();
        }
        self.ready.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_input_order() -> Result<()> {
        let mapped: Vec<u64> = ParMap::new(0u64..1000, 8, |x| x * 2)?.collect();
        let expected: Vec<u64> = (0..1000).map(|x| x * 2).collect();
        assert_eq!(mapped, expected);
        Ok(())
    }

    #[test]
    fn handles_empty_source() -> Result<()> {
        let mapped: Vec<u64> = ParMap::new(std::iter::empty::<u64>(), 4, |x| x)?.collect();
        assert!(mapped.is_empty());
        Ok(())
    }

    #[test]
    fn single_worker_still_drains() -> Result<()> {
        let mapped: Vec<usize> = ParMap::new(0..7usize, 1, |x| x + 1)?.collect();
        assert_eq!(mapped, vec![1, 2, 3, 4, 5, 6, 7]);
        Ok(())
    }
}
