//! Shared buffer of rendered chat lines awaiting delivery.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::LogEvent;

/// Ordered queue of rendered lines shared by the log reader and the sender.
///
/// Cloning yields another handle to the same queue. `push` and `drain`
/// take the same lock, so a line is either part of a drain or left for
/// the next one, never both and never neither.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    lines: Arc<Mutex<Vec<String>>>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an already rendered line.
    pub fn push(&self, line: impl Into<String>) {
        self.lock().push(line.into());
    }

    /// Render and append an event.
    pub fn push_event(&self, event: &LogEvent) {
        self.push(event.render());
    }

    /// Remove and return every queued line, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
