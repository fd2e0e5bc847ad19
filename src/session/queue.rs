//! Outstanding retrieval counter

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Number of retrieval commands whose downloads have not finished yet
///
/// Cloning shares the counter. The session only issues the next search once
/// this is back at zero.
#[derive(Clone, Debug, Default)]
pub struct RetrievalQueue {
    outstanding: Arc<AtomicUsize>,
}

impl RetrievalQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the count, e.g. with the number of commands just sent
    pub fn set(&self, count: usize) {
        self.outstanding.store(count, Ordering::SeqCst);
    }

    /// Record one finished retrieval
    ///
    /// Returns the remaining count, or `None` if nothing was outstanding (the
    /// counter stays at zero).
    pub fn decrement(&self) -> Option<usize> {
        self.outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    /// Current count
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.outstanding() == 0
    }
}
