//! Job descriptors. Immutable once built; shared as `Arc<Job>` between the
//! queue and the worker that claimed it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::util::Handle;

/// Worker identity, `0..num_workers`.
pub type WorkerId = usize;

/// Per-pixel shading parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelParams {
    /// Pixel-center coordinates normalized to `0..1`.
    pub u: f32,
    pub v: f32,
    pub x: u32,
    pub y: u32,
    /// Tile dimensions.
    pub w: u32,
    pub h: u32,
    /// Shader source or name, shared by every pixel of a batch.
    pub payload: Arc<str>,
    /// Image the shader writes into, if any.
    pub image: Option<Handle>,
}

impl ParallelParams {
    /// Parameters for pixel `(x, y)` of a `w x h` tile, sampled at the pixel center.
    pub fn pixel(x: u32, y: u32, w: u32, h: u32, payload: Arc<str>, image: Option<Handle>) -> Self {
        Self {
            u: (x as f32 + 0.5) / w as f32,
            v: (y as f32 + 0.5) / h as f32,
            x,
            y,
            w,
            h,
            payload,
            image,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    /// No-op.
    Nothing,
    /// Terminates the worker that draws it.
    Suicide,
    /// Run a script file in the shared environment.
    RunScript(PathBuf),
    /// Run an inline snippet in the shared environment.
    Execute(String),
    /// Shade one pixel in the worker's private environment.
    ExecuteParallel(ParallelParams),
    /// Replace the worker's private environment with a fresh one.
    Reset,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nothing => "Nothing",
            Self::Suicide => "Suicide",
            Self::RunScript(_) => "RunScript",
            Self::Execute(_) => "Execute",
            Self::ExecuteParallel(_) => "ExecuteParallel",
            Self::Reset => "Reset",
        }
    }
}

/// A unit of work, optionally bound to one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    kind: JobKind,
    target: Option<WorkerId>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self { kind, target: None }
    }

    pub fn nothing() -> Self {
        Self::new(JobKind::Nothing)
    }

    pub fn suicide() -> Self {
        Self::new(JobKind::Suicide)
    }

    pub fn run_script(path: impl AsRef<Path>) -> Self {
        Self::new(JobKind::RunScript(path.as_ref().to_path_buf()))
    }

    pub fn execute(code: impl Into<String>) -> Self {
        Self::new(JobKind::Execute(code.into()))
    }

    pub fn parallel(params: ParallelParams) -> Self {
        Self::new(JobKind::ExecuteParallel(params))
    }

    pub fn reset() -> Self {
        Self::new(JobKind::Reset)
    }

    /// Bind this job to one worker; nobody else may claim it.
    pub fn targeted(mut self, worker: WorkerId) -> Self {
        self.target = Some(worker);
        self
    }

    #[inline]
    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    #[inline]
    pub fn target(&self) -> Option<WorkerId> {
        self.target
    }

    /// Target as a signed id, `-1` meaning any worker.
    #[inline]
    pub fn target_worker(&self) -> i64 {
        self.target.map_or(-1, |id| id as i64)
    }

    #[inline]
    pub fn is_claimable_by(&self, worker: WorkerId) -> bool {
        self.target.map_or(true, |id| id == worker)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            JobKind::RunScript(path) => write!(f, "RunScript({})", path.display())?,
            JobKind::ExecuteParallel(p) => write!(f, "ExecuteParallel({}, {})", p.x, p.y)?,
            kind => f.write_str(kind.name())?,
        }
        if let Some(id) = self.target {
            write!(f, " @{id}")?;
        }
        Ok(())
    }
}
