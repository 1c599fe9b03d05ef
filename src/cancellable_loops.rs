//! Parallel loops over frames that can be cancelled through an abort flag.
//!
//! The flag is only read here. Whoever raised it is responsible for lowering
//! it again once the cancelled run has returned.

use rayon::prelude::*;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::RwLock;

/// Runs `func` on every item in parallel until `abort_flag` is raised.
///
/// Items that already started when the flag is raised still finish, no new
/// item is started afterwards. Returns `false` if the loop was cancelled.
pub fn par_for_each_cancellable<I, F>(iter: I, abort_flag: &AtomicBool, func: F) -> bool
where
    I: IntoParallelIterator,
    F: Fn(I::Item) + Sync + Send,
    I::Item: Send,
{
    iter.into_par_iter()
        .try_for_each(|item| {
            if abort_flag.load(Relaxed) {
                Err(()) // cancel
            } else {
                func(item);
                Ok(())
            }
        })
        .is_ok()
}

/// Maps every item in parallel, keeping the input order.
///
/// Returns `None` if `abort_flag` was raised before all items were mapped.
pub fn par_map_cancellable<I, F, R>(iter: I, abort_flag: &AtomicBool, func: F) -> Option<Vec<R>>
where
    I: IntoParallelIterator,
    I::Iter: IndexedParallelIterator,
    F: Fn(I::Item) -> R + Sync + Send,
    I::Item: Send,
    R: Send,
{
    iter.into_par_iter()
        .map(|item| {
            if abort_flag.load(Relaxed) {
                None
            } else {
                Some(func(item))
            }
        })
        .collect()
}

/// Counts finished items of a parallel loop into a shared progress value.
pub struct ProgressCounter<'a> {
    done: AtomicUsize,
    total: usize,
    progress: &'a RwLock<Option<f32>>,
}

impl<'a> ProgressCounter<'a> {
    /// Starts counting at 0 of `total` and publishes `Some(0.0)`.
    pub fn new(total: usize, progress: &'a RwLock<Option<f32>>) -> Self {
        if let Ok(mut p) = progress.write() {
            *p = Some(0.0);
        }
        ProgressCounter {
            done: AtomicUsize::new(0),
            total: total.max(1),
            progress,
        }
    }

    /// Marks one more item as finished.
    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Relaxed) + 1;
        if let Ok(mut p) = self.progress.write() {
            let fraction = done as f32 / self.total as f32;
            // ticks may arrive out of order
            if (*p).is_none_or(|current| current < fraction) {
                *p = Some(fraction);
            }
        }
    }

    /// Number of finished items so far.
    pub fn done(&self) -> usize {
        self.done.load(Relaxed)
    }
}

impl Drop for ProgressCounter<'_> {
    fn drop(&mut self) {
        if let Ok(mut p) = self.progress.write() {
            *p = None;
        }
    }
}
