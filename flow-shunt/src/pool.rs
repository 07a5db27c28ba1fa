//! The worker pool: a fixed number of permits for blocking OS threads.
//!
//! Flow's shunts never run on an async runtime — each one occupies a real
//! OS thread for as long as its underlying file descriptor is open. The
//! pool just caps how many such threads may exist at once and hands back
//! [`FlowError::WorkerPoolExhausted`] once that cap is hit, rather than
//! letting an unbounded number of blocking threads pile up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use flow_core::error::{FlowError, Result};

/// Shared thread budget for shunt workers.
pub struct WorkerPool {
    capacity: usize,
    in_use: AtomicUsize,
}

impl WorkerPool {
    /// Build a pool with `capacity` permits. `None` sizes the pool to
    /// `std::thread::available_parallelism()`, per `FlowConfig::worker_count`.
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Arc<Self> {
        let capacity = capacity.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
        });
        Arc::new(Self {
            capacity,
            in_use: AtomicUsize::new(0),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Spawn `body` on a new OS thread if a permit is available. The permit
    /// is released automatically when `body` returns, regardless of panic.
    ///
    /// # Errors
    /// Returns [`FlowError::WorkerPoolExhausted`] if every permit is taken.
    pub fn spawn<F>(self: &Arc<Self>, name: impl Into<String>, body: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        loop {
            let current = self.in_use.load(Ordering::Acquire);
            if current >= self.capacity {
                return Err(FlowError::WorkerPoolExhausted {
                    capacity: self.capacity,
                });
            }
            if self
                .in_use
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        let pool = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let _guard = ReleaseOnDrop(&pool);
                body();
            })
            .expect("failed to spawn shunt worker thread");
        Ok(handle)
    }
}

struct ReleaseOnDrop<'a>(&'a Arc<WorkerPool>);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn exhausted_pool_rejects_further_spawns() {
        let pool = WorkerPool::new(Some(1));
        let (tx, rx) = mpsc::channel::<()>();
        let _handle = pool
            .spawn("worker-0", move || {
                rx.recv().ok();
            })
            .unwrap();

        assert!(matches!(
            pool.spawn("worker-1", || {}),
            Err(FlowError::WorkerPoolExhausted { capacity: 1 })
        ));

        tx.send(()).unwrap();
    }

    #[test]
    fn permit_released_after_thread_exits() {
        let pool = WorkerPool::new(Some(1));
        let handle = pool.spawn("worker-0", || {}).unwrap();
        handle.join().unwrap();

        // Give the drop guard a moment; join() already guarantees the
        // closure (and thus the guard) ran before returning.
        assert_eq!(pool.in_use(), 0);
        pool.spawn("worker-1", || {}).unwrap().join().unwrap();
    }
}
