//! Observable scheduler state: per-worker stats and batch progress.

use std::fmt;
use std::sync::Arc;

use super::{Job, WorkerId};

/// Snapshot of one worker.
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub id: WorkerId,
    pub alive: bool,
    pub idle: bool,
    /// Job being executed. Owned, so it stays readable after the worker moves on.
    pub current_job: Option<Arc<Job>>,
    pub jobs_done: u64,
}

impl WorkerStats {
    pub(crate) fn new(id: WorkerId) -> Self {
        Self { id, alive: true, idle: true, current_job: None, jobs_done: 0 }
    }
}

/// Batch counters as seen under the scheduler lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub expected: usize,
}

impl Progress {
    pub fn status(&self) -> Status {
        if self.done == self.expected {
            Status::Idle
        } else if self.done > self.expected {
            Status::Unknown
        } else {
            Status::Running { done: self.done, expected: self.expected }
        }
    }

    /// Completed fraction in `0..=1`; 1 when nothing is expected.
    pub fn fraction(&self) -> f32 {
        if self.expected == 0 {
            return 1.0;
        }
        (self.done as f32 / self.expected as f32).min(1.0)
    }
}

/// Coarse state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Running { done: usize, expected: usize },
    /// More completions than expected; counters need repair.
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Status::Idle => f.write_str("Idle"),
            Status::Running { done: 0, expected: 1 } => f.write_str("Running..."),
            Status::Running { done, expected } => {
                write!(f, "Running: {:.1}%...", done as f32 / expected as f32 * 100.0)
            }
            Status::Unknown => f.write_str("Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(Progress { done: 0, expected: 0 }.status(), Status::Idle);
        assert_eq!(Progress { done: 4, expected: 4 }.status(), Status::Idle);
        assert_eq!(Progress { done: 5, expected: 4 }.status(), Status::Unknown);
        assert_eq!(
            Progress { done: 1, expected: 4 }.status(),
            Status::Running { done: 1, expected: 4 }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Progress { done: 0, expected: 1 }.status().to_string(), "Running...");
        assert_eq!(Progress { done: 1, expected: 4 }.status().to_string(), "Running: 25.0%...");
        assert_eq!(Status::Idle.to_string(), "Idle");
    }

    #[test]
    fn test_fraction() {
        assert_eq!(Progress::default().fraction(), 1.0);
        assert_eq!(Progress { done: 1, expected: 2 }.fraction(), 0.5);
    }
}
