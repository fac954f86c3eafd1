/// Bounded worker pool
///
/// A fixed set of named threads pulling boxed jobs from a bounded channel:
/// - Submission never blocks; a full queue hands the job back to the caller
/// - Lock-free counters for submitted/completed/panicked jobs
/// - Dropping the pool closes the queue and joins every worker

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::constants::streaming::QUEUE_DEPTH_PER_WORKER;

/// A unit of work for the pool
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub worker_threads: usize,
    /// Maximum jobs waiting for a free worker
    pub queue_capacity: usize,
    /// Prefix for worker thread names
    pub thread_name: String,
    /// Stack size for worker threads (in bytes)
    pub stack_size: Option<usize>,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let cpu_count = num_cpus::get();
        let worker_threads = cpu_count.saturating_sub(1).max(1); // Leave a core for the control loop

        Self {
            worker_threads,
            queue_capacity: worker_threads * QUEUE_DEPTH_PER_WORKER,
            thread_name: "terrain-worker".to_string(),
            stack_size: Some(4 * 1024 * 1024), // Noise + mesh buffers live on the heap; 4MB is plenty
        }
    }
}

/// Lock-free statistics counters
#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    rejected: AtomicU64,
    active: AtomicUsize,
}

/// Snapshot of pool activity
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerPoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub panicked: u64,
    pub rejected: u64,
    pub active: usize,
    pub queued: usize,
}

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    receiver: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<PoolCounters>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> std::io::Result<Self> {
        let worker_threads = config.worker_threads.max(1);
        let (sender, receiver) = bounded::<Job>(config.queue_capacity.max(1));
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(worker_threads);
        for idx in 0..worker_threads {
            let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name, idx));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);
            workers.push(builder.spawn(move || worker_loop(receiver, counters))?);
        }

        log::info!(
            "[WorkerPool] Started {} workers (queue capacity {})",
            worker_threads,
            config.queue_capacity.max(1)
        );

        Ok(Self {
            sender: Some(sender),
            receiver,
            workers,
            counters,
            config,
        })
    }

    /// Queue a job without blocking. Returns the job if the queue is full.
    pub fn try_execute(&self, job: Job) -> Result<(), Job> {
        let Some(sender) = &self.sender else {
            return Err(job);
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(job)
            }
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Jobs accepted but not yet picked up by a worker
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            queued: self.queued(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets every worker fall out of its recv loop
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("[WorkerPool] Worker thread terminated abnormally");
            }
        }
        log::debug!("[WorkerPool] Shut down");
    }
}

fn worker_loop(receiver: Receiver<Job>, counters: Arc<PoolCounters>) {
    while let Ok(job) = receiver.recv() {
        counters.active.fetch_add(1, Ordering::Relaxed);
        // Jobs report their own faults; this only keeps a stray panic from killing the worker
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            log::error!("[WorkerPool] Job panicked on {:?}", thread::current().name());
        }
        counters.active.fetch_sub(1, Ordering::Relaxed);
        counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}
