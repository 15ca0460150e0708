//! Fixed-capacity worker pool for one tick's fan-out.
//!
//! Workers are scoped threads that pull job indices from a shared cursor and
//! hand results back through their join handles. The pool never touches
//! caller state; the caller merges results after the join point.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    capacity: usize,
}

impl WorkerPool {
    /// A pool running at most `capacity` jobs at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `job` on every item and return results in item order.
    ///
    /// Spawns `min(capacity, items.len())` workers and blocks until all of
    /// them have joined. A job that panics yields `None` in its slot; the
    /// remaining jobs still run.
    pub fn map<T, R, F>(&self, items: &[T], job: F) -> Vec<Option<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let mut slots: Vec<Option<R>> = items.iter().map(|_| None).collect();
        let workers = self.capacity.min(items.len());
        if workers == 0 {
            return slots;
        }

        let cursor = AtomicUsize::new(0);
        let cursor = &cursor;
        let job = &job;

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let i = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(item) = items.get(i) else {
                                break;
                            };
                            let result = catch_unwind(AssertUnwindSafe(|| job(item)));
                            done.push((i, result.ok()));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                if let Ok(done) = handle.join() {
                    for (i, result) in done {
                        slots[i] = result;
                    }
                }
            }
        });

        slots
    }
}
