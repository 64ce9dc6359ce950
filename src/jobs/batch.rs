//! Per-pixel batch requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::util::{Error, Handle, Result};

/// Where a batch's shader comes from. Files are read once per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShadeSource {
    File(PathBuf),
    Code(String),
}

impl ShadeSource {
    pub(crate) fn load(&self) -> Result<Arc<str>> {
        match self {
            Self::Code(code) => Ok(Arc::from(code.as_str())),
            Self::File(path) => std::fs::read_to_string(path)
                .map(Arc::from)
                .map_err(|source| Error::ScriptLoad { path: path.clone(), source }),
        }
    }
}

/// One `width * height` fan-out of `ExecuteParallel` jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub width: u32,
    pub height: u32,
    pub source: ShadeSource,
    pub image: Option<Handle>,
    /// Block the submitter until every pixel is done.
    pub blocking: bool,
}

impl Batch {
    pub fn new(width: u32, height: u32, source: ShadeSource) -> Self {
        Self { width, height, source, image: None, blocking: false }
    }

    pub fn from_file(width: u32, height: u32, path: impl AsRef<Path>) -> Self {
        Self::new(width, height, ShadeSource::File(path.as_ref().to_path_buf()))
    }

    pub fn from_code(width: u32, height: u32, code: impl Into<String>) -> Self {
        Self::new(width, height, ShadeSource::Code(code.into()))
    }

    pub fn with_image(mut self, image: Handle) -> Self {
        self.image = Some(image);
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    #[inline]
    pub fn num_jobs(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
