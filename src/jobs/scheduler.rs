//! Fixed worker pool draining one shared FIFO queue.
//!
//! Queue, batch counters, liveness and worker stats sit behind a single
//! mutex. Workers sleep on one condition variable and wake when the pool
//! dies or the head of the queue is claimable by them. Targeted jobs are
//! never taken by another worker, even an idle one, so a wake-up has to be
//! broadcast whenever the head may have changed owner.

use std::collections::VecDeque;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use super::{Batch, Job, JobKind, ParallelParams, Progress, Status, WorkerId, WorkerStats};
use crate::config::Config;
use crate::resources::Resources;
use crate::script::{JobContext, ScriptHost, ShadeEnv};
use crate::util::{Error, Result};

struct State {
    jobs: VecDeque<Arc<Job>>,
    batch_job_count: usize,
    done_job_count: usize,
    alive: bool,
    workers: Vec<WorkerStats>,
    /// Workers parked inside a blocking nested batch.
    nested_waiters: usize,
}

impl State {
    /// Wake predicate for worker `id`.
    fn can_claim(&self, id: WorkerId) -> bool {
        !self.alive || self.jobs.front().is_some_and(|job| job.is_claimable_by(id))
    }

    fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.alive).count()
    }

    /// Live workers free to drain the queue, not counting `caller`.
    fn free_workers_besides_caller(&self) -> usize {
        self.live_workers().saturating_sub(self.nested_waiters + 1)
    }

    fn progress(&self) -> Progress {
        Progress { done: self.done_job_count, expected: self.batch_job_count }
    }
}

struct Inner {
    state: Mutex<State>,
    cv: Condvar,
    host: Arc<dyn ScriptHost>,
    resources: Arc<Resources>,
}

/// Cloneable handle for submitting work and observing the pool.
///
/// Handed to running jobs through [`JobContext`] so scripts can fan out
/// nested batches.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    #[inline]
    pub fn resources(&self) -> &Arc<Resources> {
        &self.inner.resources
    }

    /// Queue one job as a batch of one.
    pub fn submit_single(&self, job: Job) -> Result<()> {
        let targeted = job.target().is_some();
        {
            let mut state = self.inner.state.lock();
            if !state.alive {
                return Err(Error::ShuttingDown);
            }
            state.batch_job_count = 1;
            state.done_job_count = 0;
            state.jobs.push_back(Arc::new(job));
        }

        // A targeted job is only claimable by one worker; notify_one could pick another.
        if targeted {
            self.inner.cv.notify_all();
        } else {
            self.inner.cv.notify_one();
        }
        Ok(())
    }

    /// Queue one `ExecuteParallel` job per pixel. The batch expects exactly
    /// `width * height` completions.
    pub fn submit_batch(&self, batch: Batch) -> Result<()> {
        self.run_batch(batch, false)
    }

    /// Batch issued from inside a running job. The submitter counts as one
    /// extra expected completion, delivered when it returns.
    pub(crate) fn submit_nested_batch(&self, batch: Batch) -> Result<()> {
        self.run_batch(batch, true)
    }

    #[tracing::instrument(skip_all, fields(width = batch.width, height = batch.height, nested = nested))]
    fn run_batch(&self, batch: Batch, nested: bool) -> Result<()> {
        if batch.num_jobs() == 0 {
            return Err(Error::InvalidBatch { width: batch.width, height: batch.height });
        }

        let payload = match batch.source.load() {
            Ok(payload) => payload,
            Err(e) => {
                self.inner.resources.report_error(e.to_string());
                {
                    let mut state = self.inner.state.lock();
                    state.batch_job_count = 0;
                    state.done_job_count = 0;
                }
                self.inner.cv.notify_all();
                return Err(e);
            }
        };

        let submitter = usize::from(nested);
        let mut state = self.inner.state.lock();
        if !state.alive {
            return Err(Error::ShuttingDown);
        }
        // Every other live worker is already parked in a nested wait: nobody would drain this batch.
        if nested && batch.blocking && state.free_workers_besides_caller() == 0 {
            return Err(Error::NestedBatchStarved);
        }

        state.batch_job_count = batch.num_jobs() + submitter;
        state.done_job_count = 0;
        for y in 0..batch.height {
            for x in 0..batch.width {
                let params = ParallelParams::pixel(x, y, batch.width, batch.height, Arc::clone(&payload), batch.image);
                state.jobs.push_back(Arc::new(Job::parallel(params)));
            }
        }
        self.inner.cv.notify_all();
        tracing::debug!(jobs = batch.num_jobs(), "Batch queued");

        if !batch.blocking {
            return Ok(());
        }

        // Registered under the same lock that queued the batch, so a concurrent
        // nested submission always sees this worker as parked.
        if nested {
            state.nested_waiters += 1;
        }
        while state.alive && state.done_job_count + submitter < state.batch_job_count {
            self.inner.cv.wait(&mut state);
        }
        if nested {
            state.nested_waiters -= 1;
        }
        Ok(())
    }

    /// Emergency stop: drop every queued job and zero the counters.
    /// Jobs already claimed still run to completion.
    pub fn abort(&self) {
        let discarded = {
            let mut state = self.inner.state.lock();
            let discarded = state.jobs.len();
            state.jobs.clear();
            state.batch_job_count = 0;
            state.done_job_count = 0;
            discarded
        };
        self.inner.cv.notify_all();
        tracing::warn!(discarded, "Job queue aborted");
    }

    /// Wipe every scripting environment: the host's shared one, then each
    /// live worker's private one through a targeted `Reset` job. Also
    /// clears the resource inventory.
    pub fn reset_environments(&self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        self.inner.host.reset();

        let count = {
            let mut state = self.inner.state.lock();
            if !state.alive {
                return Err(Error::ShuttingDown);
            }
            let live: Vec<WorkerId> = state.workers.iter().filter(|w| w.alive).map(|w| w.id).collect();
            for &id in &live {
                state.jobs.push_back(Arc::new(Job::reset().targeted(id)));
            }
            state.batch_job_count = live.len();
            state.done_job_count = 0;
            live.len()
        };
        self.inner.cv.notify_all();
        self.inner.resources.inventory_clear();

        tracing::info!(workers = count, "Environments reset");
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        let state = self.inner.state.lock();
        state.batch_job_count != state.done_job_count
    }

    pub fn progress(&self) -> Progress {
        self.inner.state.lock().progress()
    }

    pub fn status(&self) -> Status {
        self.progress().status()
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.inner.state.lock().workers.clone()
    }

    pub fn num_workers(&self) -> usize {
        self.inner.state.lock().workers.len()
    }

    pub fn live_workers(&self) -> usize {
        self.inner.state.lock().live_workers()
    }

    pub fn queued_jobs(&self) -> usize {
        self.inner.state.lock().jobs.len()
    }

    /// Block until the current batch is complete or the pool shuts down.
    pub fn wait_idle(&self) {
        self.wait_until(|state| state.done_job_count >= state.batch_job_count);
    }

    fn wait_until(&self, mut done: impl FnMut(&State) -> bool) {
        let mut state = self.inner.state.lock();
        while state.alive && !done(&state) {
            self.inner.cv.wait(&mut state);
        }
    }
}

/// Owns the worker threads. Dropping it shuts the pool down and joins.
pub struct Scheduler {
    dispatcher: Dispatcher,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn `config.worker_count()` workers.
    pub fn new(host: Arc<dyn ScriptHost>, resources: Arc<Resources>, config: &Config) -> Result<Self> {
        Self::with_workers(host, resources, config.worker_count())
    }

    /// Spawn exactly `workers` workers (at least one).
    pub fn with_workers(host: Arc<dyn ScriptHost>, resources: Arc<Resources>, workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                jobs: VecDeque::new(),
                batch_job_count: 0,
                done_job_count: 0,
                alive: true,
                workers: (0..workers).map(WorkerStats::new).collect(),
                nested_waiters: 0,
            }),
            cv: Condvar::new(),
            host,
            resources,
        });

        let mut scheduler = Self {
            dispatcher: Dispatcher { inner },
            handles: Vec::with_capacity(workers),
        };
        for id in 0..workers {
            let dispatcher = scheduler.dispatcher.clone();
            let handle = thread::Builder::new()
                .name(format!("scriptrace-worker-{id}"))
                .spawn(move || worker_loop(id, dispatcher))?;
            scheduler.handles.push(handle);
        }

        tracing::info!(workers, "Worker pool started");
        Ok(scheduler)
    }

    #[inline]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Clear liveness, wake everyone and join. Running jobs finish first;
    /// queued jobs are left unexecuted.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        {
            let mut state = self.dispatcher.inner.state.lock();
            state.alive = false;
        }
        self.dispatcher.inner.cv.notify_all();

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked outside a job");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

impl Deref for Scheduler {
    type Target = Dispatcher;

    fn deref(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker thread body. Jobs run outside the lock.
fn worker_loop(id: WorkerId, dispatcher: Dispatcher) {
    let inner = &dispatcher.inner;
    let mut env = inner.host.new_env();
    tracing::debug!(worker = id, "Worker started");

    loop {
        let job = {
            let mut state = inner.state.lock();
            while !state.can_claim(id) {
                inner.cv.wait(&mut state);
            }
            if !state.alive {
                state.workers[id].alive = false;
                tracing::info!(worker = id, "Worker is bidding farewell");
                return;
            }

            let Some(job) = state.jobs.pop_front() else {
                continue;
            };
            let me = &mut state.workers[id];
            me.current_job = Some(Arc::clone(&job));
            me.idle = false;

            // The new head may belong to a worker that went back to sleep.
            if job.target().is_some() && !state.jobs.is_empty() {
                inner.cv.notify_all();
            }
            job
        };

        if matches!(job.kind(), JobKind::Suicide) {
            let mut state = inner.state.lock();
            let me = &mut state.workers[id];
            me.alive = false;
            me.idle = true;
            me.current_job = None;
            tracing::debug!(worker = id, "Worker drew a suicide job");
            return;
        }

        let ctx = JobContext::new(id, &dispatcher);
        run_job(inner.host.as_ref(), &inner.resources, &job, &mut env, &ctx);

        let mut state = inner.state.lock();
        let me = &mut state.workers[id];
        me.current_job = None;
        me.idle = true;
        me.jobs_done += 1;

        // Clamped so completions racing an abort cannot resurrect a stale batch.
        state.done_job_count = (state.done_job_count + 1).min(state.batch_job_count);
        if state.done_job_count + 1 >= state.batch_job_count || job.target().is_some() {
            inner.cv.notify_all();
        }
    }
}

/// Execute one job. Errors and panics become error-log entries.
fn run_job(host: &dyn ScriptHost, resources: &Resources, job: &Job, env: &mut Box<dyn ShadeEnv>, ctx: &JobContext<'_>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match job.kind() {
        JobKind::Nothing | JobKind::Suicide => Ok(()),
        JobKind::RunScript(path) => host.execute_file(path, ctx),
        JobKind::Execute(code) => host.execute(code, ctx),
        JobKind::ExecuteParallel(params) => env.shade(params, ctx),
        JobKind::Reset => {
            *env = host.new_env();
            Ok(())
        }
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => resources.report_error(e.to_string()),
        Err(payload) => {
            resources.report_error(format!("{} panicked: {}", job.kind().name(), panic_message(payload.as_ref())));
            // Whatever the private environment was doing is suspect now.
            *env = host.new_env();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("Unknown error")
}
