//! Flat fork-join loops over index ranges.
//!
//! An [`Executor`] is an explicit handle on where batched work runs: inline on
//! the calling thread, on the global rayon pool, or on a dedicated pool. It is
//! passed to every batched query instead of living in process-wide state, so
//! reconfiguring one executor never affects a query running on another.
//!
//! Every loop blocks the caller until all sub-ranges complete. Output slot `i`
//! is written only by the task owning index `i`, so results do not depend on
//! the partitioning; reductions may differ in the last bits across thread
//! counts because floating-point `join` is not associative.

#![forbid(unsafe_code)]

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use thiserror::Error;

use crate::config::InterpolationConfig;

/// Default minimum number of indices per parallel task.
pub const DEFAULT_GRAIN_SIZE: usize = 64;

/// Errors raised while creating an [`Executor`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// A pool needs at least one worker.
    #[error("Thread count must be positive")]
    ZeroThreads,
    /// rayon refused to build the pool.
    #[error("Failed to build thread pool: {details}")]
    PoolBuild {
        /// Message from rayon.
        details: String,
    },
}

#[derive(Clone, Debug, Default)]
enum Backend {
    Sequential,
    #[default]
    Global,
    Pool(Arc<ThreadPool>),
}

/// Where batched loops run.
///
/// Cloning is cheap; clones of a dedicated-pool executor share the pool.
///
/// # Examples
///
/// ```rust
/// use simplicial_interp::core::parallel::Executor;
///
/// let executor = Executor::with_threads(2).unwrap();
/// let mut squares = vec![0usize; 100];
/// executor.map_chunks(&mut squares, 16, |offset, chunk| {
///     for (k, slot) in chunk.iter_mut().enumerate() {
///         *slot = (offset + k) * (offset + k);
///     }
/// });
/// assert_eq!(squares[9], 81);
///
/// let sum = executor.parallel_reduce(0..100, 8, || 0, |r| r.sum::<usize>(), |a, b| a + b);
/// assert_eq!(sum, 4950);
/// ```
#[derive(Clone, Debug)]
pub struct Executor {
    backend: Backend,
    grain_size: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::global()
    }
}

impl Executor {
    /// Runs everything on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            backend: Backend::Sequential,
            grain_size: DEFAULT_GRAIN_SIZE,
        }
    }

    /// Runs on rayon's global pool.
    #[must_use]
    pub const fn global() -> Self {
        Self {
            backend: Backend::Global,
            grain_size: DEFAULT_GRAIN_SIZE,
        }
    }

    /// Runs on a dedicated pool of `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::ZeroThreads`] for `threads == 0` and
    /// [`ExecutorError::PoolBuild`] if the pool cannot be spawned.
    pub fn with_threads(threads: usize) -> Result<Self, ExecutorError> {
        if threads == 0 {
            return Err(ExecutorError::ZeroThreads);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("simplicial-interp-{i}"))
            .build()
            .map_err(|e| ExecutorError::PoolBuild {
                details: e.to_string(),
            })?;
        tracing::debug!(threads, "built dedicated thread pool");
        Ok(Self {
            backend: Backend::Pool(Arc::new(pool)),
            grain_size: DEFAULT_GRAIN_SIZE,
        })
    }

    /// Executor described by `config.threads` and `config.grain_size`.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::with_threads`].
    pub fn from_config(config: &InterpolationConfig) -> Result<Self, ExecutorError> {
        let executor = match config.threads {
            None => Self::global(),
            Some(threads) => Self::with_threads(threads)?,
        };
        Ok(executor.with_grain_size(config.grain_size))
    }

    /// Replaces the grain size used by callers that do not pick their own.
    #[must_use]
    pub fn with_grain_size(mut self, grain_size: usize) -> Self {
        self.grain_size = grain_size.max(1);
        self
    }

    /// Default minimum number of indices per task.
    #[must_use]
    pub const fn grain_size(&self) -> usize {
        self.grain_size
    }

    /// Returns `false` for [`Executor::sequential`].
    #[must_use]
    pub const fn is_parallel(&self) -> bool {
        !matches!(self.backend, Backend::Sequential)
    }

    /// Number of workers available to a loop.
    #[must_use]
    pub fn threads(&self) -> usize {
        match &self.backend {
            Backend::Sequential => 1,
            Backend::Global => rayon::current_num_threads(),
            Backend::Pool(pool) => pool.current_num_threads(),
        }
    }

    fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        match &self.backend {
            Backend::Pool(pool) => pool.install(op),
            Backend::Sequential | Backend::Global => op(),
        }
    }

    /// Calls `policy` on contiguous sub-ranges covering `range`, each at
    /// least `grain` long except possibly the last.
    pub fn parallel_for<P>(&self, range: Range<usize>, grain: usize, policy: P)
    where
        P: Fn(Range<usize>) + Sync + Send,
    {
        self.parallel_for_if(true, range, grain, policy);
    }

    /// [`Executor::parallel_for`], run inline when `parallel` is `false`.
    pub fn parallel_for_if<P>(&self, parallel: bool, range: Range<usize>, grain: usize, policy: P)
    where
        P: Fn(Range<usize>) + Sync + Send,
    {
        if range.is_empty() {
            return;
        }
        if !parallel || !self.is_parallel() || range.len() <= grain {
            policy(range);
            return;
        }
        let grain = grain.max(1);
        self.install(|| {
            sub_ranges(range, grain)
                .collect::<Vec<_>>()
                .into_par_iter()
                .for_each(&policy);
        });
    }

    /// Splits `out` into chunks of `grain` slots and calls
    /// `policy(offset, chunk)` on each, where `offset` is the index of the
    /// chunk's first slot.
    pub fn map_chunks<T, P>(&self, out: &mut [T], grain: usize, policy: P)
    where
        T: Send,
        P: Fn(usize, &mut [T]) + Sync + Send,
    {
        if out.is_empty() {
            return;
        }
        if !self.is_parallel() || out.len() <= grain {
            policy(0, out);
            return;
        }
        let grain = grain.max(1);
        self.install(|| {
            out.par_chunks_mut(grain)
                .enumerate()
                .for_each(|(c, chunk)| policy(c * grain, chunk));
        });
    }

    /// Maps `f` over `0..len`, keeping the order.
    ///
    /// # Errors
    ///
    /// Returns an error produced by `f` if any index fails. The batch is
    /// abandoned early; with several failing indices, which one is reported
    /// depends on scheduling unless the executor is sequential.
    pub fn try_map<T, E, F>(&self, len: usize, grain: usize, f: F) -> Result<Vec<T>, E>
    where
        T: Send,
        E: Send,
        F: Fn(usize) -> Result<T, E> + Sync + Send,
    {
        if !self.is_parallel() || len <= grain {
            return (0..len).map(f).collect();
        }
        let grain = grain.max(1);
        self.install(|| (0..len).into_par_iter().with_min_len(grain).map(f).collect())
    }

    /// Folds each sub-range with `policy` and combines the partial results
    /// with `join`; `identity()` is the result of an empty range.
    pub fn parallel_reduce<T, I, P, J>(
        &self,
        range: Range<usize>,
        grain: usize,
        identity: I,
        policy: P,
        join: J,
    ) -> T
    where
        T: Send,
        I: Fn() -> T + Sync + Send,
        P: Fn(Range<usize>) -> T + Sync + Send,
        J: Fn(T, T) -> T + Sync + Send,
    {
        self.parallel_reduce_if(true, range, grain, identity, policy, join)
    }

    /// [`Executor::parallel_reduce`], run inline when `parallel` is `false`.
    pub fn parallel_reduce_if<T, I, P, J>(
        &self,
        parallel: bool,
        range: Range<usize>,
        grain: usize,
        identity: I,
        policy: P,
        join: J,
    ) -> T
    where
        T: Send,
        I: Fn() -> T + Sync + Send,
        P: Fn(Range<usize>) -> T + Sync + Send,
        J: Fn(T, T) -> T + Sync + Send,
    {
        if range.is_empty() {
            return identity();
        }
        if !parallel || !self.is_parallel() || range.len() <= grain {
            return policy(range);
        }
        let grain = grain.max(1);
        self.install(|| {
            sub_ranges(range, grain)
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(&policy)
                .reduce(&identity, &join)
        })
    }
}

fn sub_ranges(range: Range<usize>, grain: usize) -> impl Iterator<Item = Range<usize>> {
    let end = range.end;
    range
        .step_by(grain)
        .map(move |start| start..(start + grain).min(end))
}
