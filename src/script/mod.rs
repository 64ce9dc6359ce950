//! Script execution seam.
//!
//! The scheduler never interprets script text itself. It hands sources and
//! per-pixel parameters to a [`ScriptHost`], which owns one shared
//! environment (for `RunScript` / `Execute` jobs) and mints one private
//! [`ShadeEnv`] per worker (for `ExecuteParallel` jobs).

mod native;

pub use native::{NativeEnv, NativeHost};

use std::path::Path;
use std::sync::Arc;

use crate::jobs::{Batch, Dispatcher, ParallelParams, ShadeSource, WorkerId};
use crate::resources::Resources;
use crate::util::{Error, Handle, Result};

// ============================================================================
// Host Traits
// ============================================================================

/// Executor for script sources. Shared by every worker.
pub trait ScriptHost: Send + Sync {
    /// Run `source` in the shared environment.
    fn execute(&self, source: &str, ctx: &JobContext<'_>) -> Result<()>;

    /// Run a script file in the shared environment.
    fn execute_file(&self, path: &Path, ctx: &JobContext<'_>) -> Result<()> {
        let source = std::fs::read_to_string(path).map_err(|source| Error::ScriptLoad {
            path: path.to_path_buf(),
            source,
        })?;
        self.execute(&source, ctx)
    }

    /// Create a fresh private environment for one worker.
    fn new_env(&self) -> Box<dyn ShadeEnv>;

    /// Wipe the shared environment.
    fn reset(&self) {}
}

/// Private per-worker environment for pixel jobs.
pub trait ShadeEnv: Send {
    /// Shade one pixel. `params.payload` is the batch source.
    fn shade(&mut self, params: &ParallelParams, ctx: &JobContext<'_>) -> Result<()>;
}

// ============================================================================
// Job Context
// ============================================================================

/// What a running job can see: its worker, the resource store and the pool.
pub struct JobContext<'a> {
    worker: WorkerId,
    dispatcher: &'a Dispatcher,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(worker: WorkerId, dispatcher: &'a Dispatcher) -> Self {
        Self { worker, dispatcher }
    }

    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    #[inline]
    pub fn resources(&self) -> &Arc<Resources> {
        self.dispatcher.resources()
    }

    #[inline]
    pub fn dispatcher(&self) -> &Dispatcher {
        self.dispatcher
    }

    /// Fan out a nested `width x height` batch and block until it drains.
    ///
    /// The calling job is counted as one extra expected completion, so the
    /// pool stays busy until this job returns as well. Fails with
    /// [`Error::NestedBatchStarved`] when no other worker is alive.
    pub fn shade(&self, width: u32, height: u32, source: ShadeSource, image: Option<Handle>) -> Result<()> {
        let mut batch = Batch::new(width, height, source).blocking(true);
        batch.image = image;
        self.dispatcher.submit_nested_batch(batch)
    }
}
