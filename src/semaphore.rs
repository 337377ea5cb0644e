//! Admission primitives for the scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// A counting semaphore built on `Mutex` + `Condvar`.
///
/// `acquire` blocks while no permits are left and hands out a [`Permit`]
/// that returns itself on drop, including when the holder unwinds.
pub struct CountingSemaphore {
    available: Mutex<usize>,
    released: Condvar,
}

impl CountingSemaphore {
    pub fn new(permits: usize) -> Self {
        CountingSemaphore {
            available: Mutex::new(permits),
            released: Condvar::new(),
        }
    }

    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        Permit { semaphore: self }
    }

    pub fn available(&self) -> usize {
        *self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut available = self
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.released.notify_one();
    }
}

/// One unit of admitted capacity.
pub struct Permit<'a> {
    semaphore: &'a CountingSemaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Tracks how many tasks are running right now and the highest count seen.
#[derive(Debug, Default)]
pub struct ActivityGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ActivityGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one task as running until the returned guard drops.
    pub fn enter(&self) -> ActivityGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ActivityGuard { gauge: self }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct ActivityGuard<'a> {
    gauge: &'a ActivityGauge,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}
