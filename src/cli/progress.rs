//! Terminal progress for a download run.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::services::DownloadEvent;

/// Chapter progress bar, or plain lines on stderr when disabled.
pub struct DownloadProgress {
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub fn new(total: usize, show: bool) -> Self {
        let bar = show.then(|| {
            let bar = ProgressBar::new(total as u64);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            {
                bar.set_style(bar_style.progress_chars("█▓░"));
            }
            bar
        });
        Self { bar }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }

    /// Apply one event. Returns true when a chapter was saved.
    pub fn handle(&self, event: DownloadEvent) -> bool {
        match event {
            DownloadEvent::BatchStarted { index, batches, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(format!("batch {}/{}", index, batches));
                }
            }
            DownloadEvent::ChapterStarted { .. } => {}
            DownloadEvent::ChapterRetrying {
                id,
                attempt,
                delay,
                error,
            } => {
                self.println(format!(
                    "{} Chapter {} attempt {} failed: {}. Retrying in {}s",
                    style("↻").yellow(),
                    id,
                    attempt,
                    error,
                    delay.as_secs()
                ));
            }
            DownloadEvent::ChapterSaved { .. } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                return true;
            }
            DownloadEvent::ChapterFailed { id, name, error } => {
                self.println(format!(
                    "{} Chapter {}. {} failed: {}",
                    style("✗").red(),
                    id,
                    name,
                    error
                ));
            }
            DownloadEvent::BatchCompleted { .. } => {}
        }
        false
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Drain `rx` into a progress display until every sender is gone.
/// Resolves to the number of saved chapters seen.
pub fn spawn_progress(
    total: usize,
    show: bool,
    mut rx: mpsc::UnboundedReceiver<DownloadEvent>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let progress = DownloadProgress::new(total, show);
        let mut saved = 0;
        while let Some(event) = rx.recv().await {
            if progress.handle(event) {
                saved += 1;
            }
        }
        progress.finish();
        saved
    })
}
