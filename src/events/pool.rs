//! Bounded Worker Pool
//!
//! Fixed set of worker threads fed from a bounded crossbeam channel. When the
//! queue is full the job runs on the submitting thread instead.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use crate::errors::handler::{contain, panic_message};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a submitted job was run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a worker
    Queued,
    /// Run on the submitting thread because the queue was full
    CallerRan,
    /// The pool is shut down; the job was dropped
    Rejected,
}

/// Outstanding job counter with a wakeup for `wait_idle`
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn begin(&self) {
        *self.count.lock() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pending: Arc<Pending>,
    capacity: usize,
}

impl WorkerPool {
    /// Start `workers` threads sharing a queue of `capacity` jobs
    pub fn new(name: &str, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded::<Job>(capacity);
        let pending = Arc::new(Pending::default());

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = receiver.clone();
            let pending = Arc::clone(&pending);
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || {
                    for job in receiver.iter() {
                        run_job(job);
                        pending.finish();
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!("Failed to spawn {} worker {}: {}", name, index, e),
            }
        }
        debug!("Started pool '{}' with {} workers, queue capacity {}", name, handles.len(), capacity);

        Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            pending,
            capacity,
        }
    }

    /// Submit a job, running it inline when the queue is full
    pub fn execute<F>(&self, job: F) -> Dispatch
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = match self.sender.lock().as_ref() {
            Some(sender) => sender.clone(),
            None => return Dispatch::Rejected,
        };

        self.pending.begin();
        match sender.try_send(Box::new(job)) {
            Ok(()) => Dispatch::Queued,
            Err(TrySendError::Full(job)) => {
                run_job(job);
                self.pending.finish();
                Dispatch::CallerRan
            }
            Err(TrySendError::Disconnected(_)) => {
                self.pending.finish();
                Dispatch::Rejected
            }
        }
    }

    /// Block until every queued job has finished, or `timeout` elapses.
    /// Returns `true` when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.pending.count.lock();
        while *count > 0 {
            if self.pending.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Jobs submitted but not yet finished
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Close the queue, let workers drain it and join them
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_none() {
            return;
        }
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in handles {
            // A worker shutting down its own pool cannot join itself
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("Worker in pool '{}' terminated abnormally", self.name);
            }
        }
        debug!("Pool '{}' shut down", self.name);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(job: Job) {
    if let Err(payload) = contain(job) {
        error!("Pool job panicked: {}", panic_message(payload.as_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn test_jobs_run_on_workers() {
        let pool = WorkerPool::new("test-pool", 2, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_caller_runs_when_full() {
        let pool = WorkerPool::new("tiny-pool", 1, 1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        // Occupy the only worker
        pool.execute(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        });
        started_rx.recv().unwrap();

        // Fill the queue
        assert_eq!(pool.execute(|| {}), Dispatch::Queued);

        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&ran_on);
        let dispatch = pool.execute(move || {
            *slot.lock() = Some(thread::current().id());
        });

        assert_eq!(dispatch, Dispatch::CallerRan);
        assert_eq!(*ran_on.lock(), Some(caller));

        release_tx.send(()).unwrap();
        assert!(pool.wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new("panic-pool", 1, 4);
        pool.execute(|| panic!("job failure"));

        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        pool.execute(move || {
            flag.store(1, Ordering::SeqCst);
        });

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_after_shutdown() {
        let pool = WorkerPool::new("closed-pool", 1, 4);
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.execute(|| {}), Dispatch::Rejected);
        assert_eq!(pool.pending(), 0);
    }
}
