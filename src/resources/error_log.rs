//! Bounded log of script errors shown to the user.

/// Default number of retained messages.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 128;

/// Append-only message list with a hard cap. Once full, new messages are
/// dropped and the oldest ones stay.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    entries: Vec<String>,
    capacity: usize,
    dropped: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::new(), capacity, dropped: 0 }
    }

    /// Append a message. Returns `false` if it was empty or the log is full.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if message.is_empty() {
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages rejected because the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_keeps_oldest() {
        let mut log = ErrorLog::new(2);
        assert!(log.push("a"));
        assert!(log.push("b"));
        assert!(!log.push("c"));
        assert_eq!(log.entries(), ["a", "b"]);
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_empty_ignored() {
        let mut log = ErrorLog::default();
        assert!(!log.push(""));
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 128);
    }

    #[test]
    fn test_clear() {
        let mut log = ErrorLog::new(1);
        log.push("x");
        log.push("y");
        log.clear();
        assert_eq!((log.len(), log.dropped()), (0, 0));
    }
}
