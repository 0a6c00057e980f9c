//! Download events and results.

use std::time::Duration;

/// Progress events emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// A batch was spawned. `index` is 1-based.
    BatchStarted {
        index: usize,
        batches: usize,
        size: usize,
    },
    /// A chapter task began running, before its first attempt
    ChapterStarted { id: u32, name: String },
    /// A chapter attempt failed and will be repeated after `delay`
    ChapterRetrying {
        id: u32,
        attempt: usize,
        delay: Duration,
        error: String,
    },
    /// A chapter was loaded and handed to the saver
    ChapterSaved { id: u32 },
    /// A chapter failed for good
    ChapterFailed {
        id: u32,
        name: String,
        error: String,
    },
    /// Every task of a batch has finished
    BatchCompleted {
        index: usize,
        saved: usize,
        failed: usize,
    },
}

/// Totals of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub saved: usize,
    pub batches: usize,
    /// Extra attempts across all chapters.
    pub retries: usize,
}
