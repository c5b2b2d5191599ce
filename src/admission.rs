//! Admission control for heavyweight jobs.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Gates dispatch of heavyweight jobs against a fixed concurrent limit.
///
/// The counter is atomic: admissions happen on the scheduler task while
/// releases arrive concurrently from executor tasks. A heavyweight job
/// holds a slot from the moment it is admitted (just before the `Waiting`
/// transition) until its terminal bookkeeping releases it.
#[derive(Debug)]
pub struct AdmissionController {
    active: AtomicUsize,
    limit: usize,
}

impl AdmissionController {
    /// Create a controller with the given slot limit. A limit of zero
    /// falls back to the host's available parallelism.
    pub fn new(limit: usize) -> Self {
        let limit = if limit == 0 {
            available_parallelism()
        } else {
            limit
        };
        Self {
            active: AtomicUsize::new(0),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of currently admitted heavyweight jobs.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn has_capacity(&self) -> bool {
        self.active() < self.limit
    }

    /// Claim a slot if one is free. Check and increment are a single
    /// atomic step, so concurrent releases cannot be lost.
    pub fn try_admit(&self) -> bool {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < self.limit).then_some(active + 1)
            })
            .is_ok()
    }

    /// Return a slot. Never drops the counter below zero.
    pub fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                active.checked_sub(1)
            });
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
