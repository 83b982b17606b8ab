// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A small fixed-size worker pool used to decouple unbounded-runtime work
//! (user callbacks, per-channel receive loops) from the thread that handed
//! the work off, so a slow job on one pool can never block progress on
//! another quality class's pool.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of `size` worker threads pulling boxed closures off a shared queue.
/// Dropping the pool joins every worker after its current job completes.
pub struct ThreadPool {
    workers: Vec<JoinHandle<()>>,
    sender: Option<Sender<Job>>,
}

impl ThreadPool {
    /// Spawns `size` worker threads named `<label>-<n>`. Panics if `size` is 0.
    pub fn new(size: usize, label: &str) -> Self {
        assert!(size > 0, "thread pool must have at least one worker");
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|n| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("{label}-{n}"))
                    .spawn(move || loop {
                        let job = {
                            let guard = receiver.lock().expect("worker queue poisoned");
                            guard.recv()
                        };
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            workers,
            sender: Some(sender),
        }
    }

    /// Queues `job` for execution by the next free worker.
    ///
    /// Panics if the pool has already been shut down, which only happens
    /// while the pool itself is being dropped.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .as_ref()
            .expect("thread pool sender dropped before pool")
            .send(Box::new(job))
            .expect("worker threads gone while pool still alive");
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn runs_queued_jobs() {
        let pool = ThreadPool::new(4, "test");
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn jobs_run_concurrently_across_workers() {
        let pool = ThreadPool::new(2, "concurrent");
        let barrier = Arc::new(Barrier::new(2));
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            pool.execute(move || {
                barrier.wait();
            });
        }
        drop(pool);
    }

    #[test]
    fn slow_job_does_not_block_other_pool() {
        let slow_pool = ThreadPool::new(1, "slow");
        let fast_pool = ThreadPool::new(1, "fast");
        let fast_done = Arc::new(AtomicUsize::new(0));

        slow_pool.execute(|| thread::sleep(Duration::from_millis(200)));
        let done = Arc::clone(&fast_done);
        fast_pool.execute(move || {
            done.store(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(fast_done.load(Ordering::SeqCst), 1);
    }
}
