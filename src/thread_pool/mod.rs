// Background execution for height and mesh computations
pub mod compute_queue;
pub mod thread_pool;

pub use compute_queue::{AsyncComputeQueue, Handler, QueueStats};
pub use thread_pool::{Job, WorkerPool, WorkerPoolConfig, WorkerPoolStats};
