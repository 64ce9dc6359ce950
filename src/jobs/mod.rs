//! Job dispatch: a fixed pool of workers draining one FIFO queue.
//!
//! - [`Job`] / [`JobKind`] - what a worker executes
//! - [`Batch`] - per-pixel fan-out of `ExecuteParallel` jobs
//! - [`Scheduler`] / [`Dispatcher`] - the pool and its submission handle
//! - [`WorkerStats`] / [`Progress`] / [`Status`] - observation
//!
//! Only one batch is tracked at a time: submitting a new batch resets the
//! counters even if the previous one is still draining.

mod batch;
mod job;
mod scheduler;
mod stats;

pub use batch::{Batch, ShadeSource};
pub use job::{Job, JobKind, ParallelParams, WorkerId};
pub use scheduler::{Dispatcher, Scheduler};
pub use stats::{Progress, Status, WorkerStats};
