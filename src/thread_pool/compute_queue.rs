//! Background computations with single-threaded completion delivery
//!
//! Computations run on the worker pool. Each finished computation appends its
//! handler and result to a shared list. `drain` takes that list under the lock,
//! releases the lock, then runs the handlers one after another on the calling
//! thread. Handlers get the consumer's context and the queue itself, so they can
//! submit follow-up work.
//!
//! The worker channel is bounded. Jobs it refuses wait in a backlog on the
//! control thread, so `submit` never blocks. The backlog holds at most one job
//! per outstanding request; its depth is bounded by what the consumer keeps in
//! flight (for the streamer, one height plus one mesh per LOD per chunk).
//! `QueueStats::backlog_peak` records the deepest it has been.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::thread_pool::{Job, WorkerPool, WorkerPoolConfig, WorkerPoolStats};
use crate::error::ComputeError;

/// Completion handler, run on the control loop with the consumer's context
pub type Handler<Ctx> = Box<dyn FnOnce(&mut Ctx, &mut AsyncComputeQueue<Ctx>) + Send>;

struct Completion<Ctx: 'static> {
    label: &'static str,
    deliver: Handler<Ctx>,
}

/// Snapshot of queue activity
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Submitted jobs the pool has not accepted yet
    pub backlog: usize,
    pub backlog_peak: usize,
    pub pool: WorkerPoolStats,
}

pub struct AsyncComputeQueue<Ctx: 'static> {
    pool: WorkerPool,
    backlog: VecDeque<Job>,
    backlog_peak: usize,
    completed: Arc<Mutex<Vec<Completion<Ctx>>>>,
    failed: Arc<AtomicU64>,
    submitted: u64,
    delivered: u64,
}

impl<Ctx: 'static> AsyncComputeQueue<Ctx> {
    pub fn new(config: WorkerPoolConfig) -> std::io::Result<Self> {
        Ok(Self::with_pool(WorkerPool::new(config)?))
    }

    pub fn with_pool(pool: WorkerPool) -> Self {
        Self {
            pool,
            backlog: VecDeque::new(),
            backlog_peak: 0,
            completed: Arc::new(Mutex::new(Vec::new())),
            failed: Arc::new(AtomicU64::new(0)),
            submitted: 0,
            delivered: 0,
        }
    }

    /// Run `computation` off the control loop and deliver its result to
    /// `handler` during a later `drain`. A panic inside the computation is
    /// delivered as `Err(ComputeError::Panicked)`.
    pub fn submit<T, F, H>(&mut self, label: &'static str, computation: F, handler: H)
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        H: FnOnce(&mut Ctx, &mut AsyncComputeQueue<Ctx>, Result<T, ComputeError>) + Send + 'static,
    {
        let completed = Arc::clone(&self.completed);
        let failed = Arc::clone(&self.failed);

        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(computation))
                .map_err(|payload| ComputeError::from_panic(label, payload));
            if let Err(e) = &result {
                failed.fetch_add(1, Ordering::Relaxed);
                log::error!("[AsyncComputeQueue] {}", e);
            }

            let deliver: Handler<Ctx> = Box::new(move |ctx, queue| handler(ctx, queue, result));
            completed.lock().push(Completion { label, deliver });
        });

        self.submitted += 1;
        if !self.backlog.is_empty() {
            self.hold(job);
            return;
        }
        if let Err(job) = self.pool.try_execute(job) {
            log::debug!("[AsyncComputeQueue] Worker queue full, holding '{}' in backlog", label);
            self.hold(job);
        }
    }

    fn hold(&mut self, job: Job) {
        self.backlog.push_back(job);
        self.backlog_peak = self.backlog_peak.max(self.backlog.len());
    }

    /// Deliver every result completed since the last drain, in completion order.
    /// Returns the number of handlers run.
    pub fn drain(&mut self, ctx: &mut Ctx) -> usize {
        self.pump();

        let batch = std::mem::take(&mut *self.completed.lock());
        let count = batch.len();
        for completion in batch {
            log::trace!("[AsyncComputeQueue] Delivering '{}'", completion.label);
            self.delivered += 1;
            (completion.deliver)(ctx, self);
        }

        self.pump();
        count
    }

    /// Move backlogged jobs into the pool until it pushes back.
    /// Returns the number of jobs handed over.
    pub fn pump(&mut self) -> usize {
        let mut moved = 0;
        while let Some(job) = self.backlog.pop_front() {
            match self.pool.try_execute(job) {
                Ok(()) => moved += 1,
                Err(job) => {
                    self.backlog.push_front(job);
                    break;
                }
            }
        }
        moved
    }

    /// Submitted computations whose handlers have not run yet
    pub fn pending(&self) -> u64 {
        self.submitted - self.delivered
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted,
            delivered: self.delivered,
            failed: self.failed.load(Ordering::Relaxed),
            backlog: self.backlog.len(),
            backlog_peak: self.backlog_peak,
            pool: self.pool.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn queue(threads: usize, capacity: usize) -> AsyncComputeQueue<Vec<i32>> {
        AsyncComputeQueue::new(WorkerPoolConfig {
            worker_threads: threads,
            queue_capacity: capacity,
            thread_name: "queue-test".to_string(),
            stack_size: None,
        })
        .expect("Failed to create AsyncComputeQueue for test")
    }

    fn drain_until_idle(queue: &mut AsyncComputeQueue<Vec<i32>>, ctx: &mut Vec<i32>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !queue.is_idle() {
            assert!(Instant::now() < deadline, "queue did not go idle");
            queue.drain(ctx);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_results_delivered_once() {
        let mut queue = queue(2, 16);
        let mut ctx = Vec::new();

        for i in 0..10 {
            queue.submit("square", move || i * i, |ctx: &mut Vec<i32>, _, result| {
                ctx.push(result.expect("computation succeeded"));
            });
        }
        drain_until_idle(&mut queue, &mut ctx);

        ctx.sort();
        assert_eq!(ctx, (0..10).map(|i| i * i).collect::<Vec<_>>());
        assert_eq!(queue.stats().delivered, 10);
        assert_eq!(queue.drain(&mut ctx), 0);
    }

    #[test]
    fn test_handlers_run_on_draining_thread() {
        let mut queue: AsyncComputeQueue<Vec<thread::ThreadId>> = AsyncComputeQueue::new(WorkerPoolConfig {
            worker_threads: 2,
            queue_capacity: 4,
            thread_name: "queue-test".to_string(),
            stack_size: None,
        })
        .expect("queue");
        let mut ctx = Vec::new();
        queue.submit("noop", || (), |ctx: &mut Vec<thread::ThreadId>, _, _| {
            ctx.push(thread::current().id());
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        while !queue.is_idle() {
            assert!(Instant::now() < deadline);
            queue.drain(&mut ctx);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(ctx, vec![thread::current().id()]);
    }

    #[test]
    fn test_handler_can_submit_follow_up() {
        let mut queue = queue(1, 4);
        let mut ctx = Vec::new();

        queue.submit("first", || 1, |ctx: &mut Vec<i32>, queue, result| {
            let value = result.expect("first");
            ctx.push(value);
            queue.submit("second", move || value + 1, |ctx: &mut Vec<i32>, _, result| {
                ctx.push(result.expect("second"));
            });
        });
        drain_until_idle(&mut queue, &mut ctx);

        assert_eq!(ctx, vec![1, 2]);
    }

    #[test]
    fn test_panic_is_delivered_as_error() {
        let mut queue = queue(1, 4);
        let mut ctx = Vec::new();

        queue.submit(
            "explode",
            || -> i32 { panic!("bad input") },
            |ctx: &mut Vec<i32>, _, result| match result {
                Err(ComputeError::Panicked { task, message }) => {
                    assert_eq!(task, "explode");
                    assert!(message.contains("bad input"));
                    ctx.push(-1);
                }
                other => panic!("unexpected result {:?}", other),
            },
        );
        drain_until_idle(&mut queue, &mut ctx);

        assert_eq!(ctx, vec![-1]);
        assert_eq!(queue.stats().failed, 1);
    }

    #[test]
    fn test_backlog_absorbs_back_pressure() {
        let mut queue = queue(1, 1);
        let mut ctx = Vec::new();

        for i in 0..20 {
            queue.submit(
                "slow",
                move || {
                    thread::sleep(Duration::from_millis(1));
                    i
                },
                |ctx: &mut Vec<i32>, _, result| ctx.push(result.expect("slow")),
            );
        }
        let stats = queue.stats();
        assert!(stats.backlog > 0);
        assert!(stats.backlog < 20);
        assert_eq!(stats.backlog_peak, stats.backlog);

        drain_until_idle(&mut queue, &mut ctx);
        assert_eq!(ctx.len(), 20);
        let stats = queue.stats();
        assert_eq!(stats.backlog, 0);
        assert!(stats.backlog_peak > 0 && stats.backlog_peak < 20);
    }
}
