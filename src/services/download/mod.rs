//! Chapter download service.
//!
//! Runs load-then-save for every chapter in contiguous batches. Tasks within
//! a batch run concurrently; a batch starts only after the previous one has
//! fully finished. Emits events for progress tracking and leaves display to
//! the caller.

pub mod retry;
mod types;

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{AcquireError, ChapterTaskError, ConfigError};
use crate::models::Chapter;
use crate::savers::Saver;
use crate::sources::ChapterLoader;

pub use retry::{RetryError, RetryPolicy};
pub use types::{DownloadEvent, DownloadSummary};

/// Outcome of one chapter task.
struct TaskOutcome {
    position: usize,
    chapter: Chapter,
    result: Result<(), RetryError<ChapterTaskError>>,
}

/// Fetches chapters in batches of at most `chunk_size`.
pub struct ChunkedScheduler {
    chunk_size: usize,
    retry: RetryPolicy,
    events: Option<mpsc::UnboundedSender<DownloadEvent>>,
}

impl ChunkedScheduler {
    pub fn new(chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            chunk_size,
            retry: RetryPolicy::default(),
            events: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send progress events to `tx`. A closed receiver is ignored.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<DownloadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Load and save every chapter.
    ///
    /// Stops after the first batch with a failed chapter; the remaining
    /// tasks of that batch are still awaited. The reported failure is the
    /// one with the lowest position in the batch.
    pub async fn run(
        &self,
        chapters: Vec<Chapter>,
        loader: Arc<dyn ChapterLoader>,
        saver: Arc<dyn Saver>,
    ) -> Result<DownloadSummary, AcquireError> {
        let batches = chapters.len().div_ceil(self.chunk_size);
        let retries = Arc::new(AtomicUsize::new(0));
        let mut summary = DownloadSummary::default();

        info!(
            "Downloading {} chapters in {} batch(es) of up to {}",
            chapters.len(),
            batches,
            self.chunk_size
        );

        for (batch_idx, batch) in chapters.chunks(self.chunk_size).enumerate() {
            let index = batch_idx + 1;
            debug!("Starting batch {}/{} ({} chapters)", index, batches, batch.len());
            self.emit(DownloadEvent::BatchStarted {
                index,
                batches,
                size: batch.len(),
            });

            let mut tasks = JoinSet::new();
            for (offset, chapter) in batch.iter().enumerate() {
                let position = batch_idx * self.chunk_size + offset;
                let chapter = chapter.clone();
                let loader = loader.clone();
                let saver = saver.clone();
                let retry = self.retry.clone();
                let events = self.events.clone();
                let retries = retries.clone();

                tasks.spawn(async move {
                    if let Some(tx) = &events {
                        let _ = tx.send(DownloadEvent::ChapterStarted {
                            id: chapter.id,
                            name: chapter.name.clone(),
                        });
                    }
                    let label = format!("Chapter {}", chapter.base_name());
                    let result = retry
                        .run(
                            &label,
                            || async {
                                let loaded = loader.load_chapter(&chapter).await?;
                                saver.save_chapter(loaded).await?;
                                Ok::<(), ChapterTaskError>(())
                            },
                            |attempt, delay, e| {
                                retries.fetch_add(1, Ordering::Relaxed);
                                if let Some(tx) = &events {
                                    let _ = tx.send(DownloadEvent::ChapterRetrying {
                                        id: chapter.id,
                                        attempt,
                                        delay,
                                        error: e.to_string(),
                                    });
                                }
                            },
                        )
                        .await;
                    TaskOutcome {
                        position,
                        chapter,
                        result,
                    }
                });
            }

            let mut saved = 0;
            let mut failures: Vec<TaskOutcome> = Vec::new();
            let mut panic: Option<String> = None;

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => match &outcome.result {
                        Ok(()) => {
                            saved += 1;
                            self.emit(DownloadEvent::ChapterSaved {
                                id: outcome.chapter.id,
                            });
                        }
                        Err(e) => {
                            error!("Chapter {} failed: {}", outcome.chapter.base_name(), e);
                            self.emit(DownloadEvent::ChapterFailed {
                                id: outcome.chapter.id,
                                name: outcome.chapter.name.clone(),
                                error: e.source.to_string(),
                            });
                            failures.push(outcome);
                        }
                    },
                    Err(e) => {
                        let message = if e.is_panic() {
                            panic_message(e.into_panic())
                        } else {
                            e.to_string()
                        };
                        error!("Chapter task panicked: {}", message);
                        panic.get_or_insert(message);
                    }
                }
            }

            self.emit(DownloadEvent::BatchCompleted {
                index,
                saved,
                failed: failures.len() + usize::from(panic.is_some()),
            });
            summary.saved += saved;
            summary.batches += 1;

            if let Some(message) = panic {
                return Err(AcquireError::TaskPanicked(message));
            }
            if let Some(first) = failures.into_iter().min_by_key(|f| f.position) {
                let TaskOutcome {
                    chapter, result, ..
                } = first;
                if let Err(RetryError { attempts, source }) = result {
                    return Err(AcquireError::ChapterFailed {
                        id: chapter.id,
                        name: chapter.name,
                        attempts,
                        source,
                    });
                }
            }
        }

        summary.retries = retries.load(Ordering::Relaxed);
        info!(
            "Saved {} chapters ({} retries)",
            summary.saved, summary.retries
        );
        Ok(summary)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
