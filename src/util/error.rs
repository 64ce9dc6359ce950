//! Error types for scriptrace.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scheduler, store and script-host operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Script or shader source could not be read from disk
    #[error("Cannot load file: {path}")]
    ScriptLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script raised an error while executing
    #[error("{0}")]
    Script(String),

    /// Handle does not name a live resource
    #[error("Nonexistent {kind}: {handle}")]
    UnknownHandle { kind: &'static str, handle: u64 },

    /// Operation refused while a batch is in flight
    #[error("Scheduler is busy")]
    Busy,

    /// Pool is shutting down and accepts no more work
    #[error("Scheduler is shutting down")]
    ShuttingDown,

    /// A blocking batch was submitted from the only live worker
    #[error("Nested batch would never complete: no other live worker")]
    NestedBatchStarved,

    /// Batch with a zero dimension
    #[error("Invalid batch size: {width}x{height}")]
    InvalidBatch { width: u32, height: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config (de)serialization error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a script error from a string.
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }
}

/// Result type alias for scriptrace operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::UnknownHandle { kind: "image", handle: 7 };
        assert_eq!(e.to_string(), "Nonexistent image: 7");

        let e = Error::InvalidBatch { width: 0, height: 3 };
        assert!(e.to_string().contains("0x3"));
    }

    #[test]
    fn test_script_load_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e = Error::ScriptLoad { path: PathBuf::from("shade.lua"), source: io };
        assert!(e.to_string().contains("shade.lua"));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
