//! A tiny fixed-size thread pool fed through a shared injector queue.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_deque::{Injector, Steal};

use crate::errors::*;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    injector: Injector<Job>,
    terminated: Mutex<bool>,
    watcher: Condvar,
}

impl Shared {
    fn main_loop(&self) {
        loop {
            match self.injector.steal() {
                Steal::Success(job) => job(),
                Steal::Retry => continue,
                Steal::Empty => {
                    let mut terminated = self.terminated.lock().unwrap();
                    while self.injector.is_empty() && !*terminated {
                        terminated = self.watcher.wait(terminated).unwrap();
                    }

                    if *terminated && self.injector.is_empty() {
                        return;
                    }
                }
            }
        }
    }
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(num: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            terminated: Mutex::new(false),
            watcher: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(num.max(1));
        for i in 0..num.max(1) {
            let sc = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("bundle-worker-{}", i))
                .spawn(move || sc.main_loop())?;

            threads.push(handle);
        }

        Ok(WorkerPool { shared, threads })
    }

    /// Queues `job`; it will be taken by whatever worker has nothing to do.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.injector.push(Box::new(job));

        // Taking the lock orders this notification after any waiter's check.
        let _guard = self.shared.terminated.lock().unwrap();
        self.shared.watcher.notify_one();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.threads.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut terminated = self.shared.terminated.lock().unwrap();
            *terminated = true;
            self.shared.watcher.notify_all();
        }

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("Bundle worker thread panicked.");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn run_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let pool = WorkerPool::new(3).unwrap();
            assert_eq!(pool.len(), 3);

            for _ in 0..64 {
                let c = counter.clone();
                pool.spawn(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
            }
        }

        // Dropping the pool drains the queue before joining.
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }
}
