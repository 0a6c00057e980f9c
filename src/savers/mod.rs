//! Output sinks for loaded chapters.
//!
//! A saver is used inside a scope: [`Saver::enter`] once, any number of
//! [`Saver::save_chapter`] calls (possibly concurrent), then
//! [`Saver::exit`] exactly once. [`run_scoped`] guarantees the exit call.

pub mod epub;
pub mod files;

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{AcquireError, SaverError};
use crate::models::{LoadedChapter, SaverContext};

pub use epub::EpubSaver;
pub use files::FilesSaver;

/// Destination for loaded chapters.
#[async_trait]
pub trait Saver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open the scope. Must be called before any chapter is saved.
    async fn enter(&self) -> Result<(), SaverError>;

    /// Accept one chapter. Saving the same chapter id twice is an error.
    async fn save_chapter(&self, chapter: LoadedChapter) -> Result<(), SaverError>;

    /// Close the scope and write anything still buffered. Later calls do
    /// nothing.
    async fn exit(&self) -> Result<(), SaverError>;
}

/// Where a saver is in its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaverState {
    Unentered = 0,
    Entered = 1,
    Finalized = 2,
}

impl SaverState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SaverState::Unentered,
            1 => SaverState::Entered,
            _ => SaverState::Finalized,
        }
    }
}

/// Lock-free `Unentered -> Entered -> Finalized` state shared by savers.
#[derive(Debug)]
pub struct SaverLifecycle {
    name: &'static str,
    state: AtomicU8,
}

impl SaverLifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(SaverState::Unentered as u8),
        }
    }

    pub fn state(&self) -> SaverState {
        SaverState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn enter(&self) -> Result<(), SaverError> {
        self.state
            .compare_exchange(
                SaverState::Unentered as u8,
                SaverState::Entered as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| SaverError::Reentered(self.name))
    }

    pub fn ensure_entered(&self) -> Result<(), SaverError> {
        match self.state() {
            SaverState::Entered => Ok(()),
            _ => Err(SaverError::NotEntered(self.name)),
        }
    }

    /// Move to `Finalized` and return the state it left.
    pub fn finalize(&self) -> SaverState {
        SaverState::from_u8(
            self.state
                .swap(SaverState::Finalized as u8, Ordering::AcqRel),
        )
    }
}

/// Run `body` between `enter` and `exit`.
///
/// `exit` runs whether or not `body` fails. A body error takes precedence
/// over an exit error; the exit error is then only logged.
pub async fn run_scoped<F, Fut, T>(saver: &dyn Saver, body: F) -> Result<T, AcquireError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AcquireError>>,
{
    saver.enter().await?;
    debug!("Entered {} saver", saver.name());

    let result = body().await;
    let exit = saver.exit().await;

    match (result, exit) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(exit_error)) => {
            error!("{} saver failed to finish: {}", saver.name(), exit_error);
            Err(e)
        }
    }
}

/// Available savers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SaverKind {
    /// One text file per chapter plus its images
    Files,
    /// A single EPUB book
    #[default]
    Epub,
}

impl SaverKind {
    pub fn build(self, context: SaverContext, output_dir: &Path) -> Arc<dyn Saver> {
        match self {
            SaverKind::Files => Arc::new(FilesSaver::new(output_dir)),
            SaverKind::Epub => Arc::new(EpubSaver::new(context, output_dir)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSaver {
        lifecycle: Option<SaverLifecycle>,
        exits: AtomicUsize,
        fail_exit: bool,
    }

    impl CountingSaver {
        fn lifecycle(&self) -> &SaverLifecycle {
            self.lifecycle.as_ref().unwrap()
        }
    }

    #[async_trait]
    impl Saver for CountingSaver {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn enter(&self) -> Result<(), SaverError> {
            self.lifecycle().enter()
        }

        async fn save_chapter(&self, _chapter: LoadedChapter) -> Result<(), SaverError> {
            self.lifecycle().ensure_entered()
        }

        async fn exit(&self) -> Result<(), SaverError> {
            self.lifecycle().finalize();
            self.exits.fetch_add(1, Ordering::SeqCst);
            if self.fail_exit {
                return Err(SaverError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }
    }

    fn saver(fail_exit: bool) -> CountingSaver {
        CountingSaver {
            lifecycle: Some(SaverLifecycle::new("counting")),
            fail_exit,
            ..Default::default()
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = SaverLifecycle::new("test");
        assert!(matches!(
            lifecycle.ensure_entered(),
            Err(SaverError::NotEntered("test"))
        ));
        lifecycle.enter().unwrap();
        assert!(lifecycle.ensure_entered().is_ok());
        assert!(matches!(lifecycle.enter(), Err(SaverError::Reentered(_))));
        assert_eq!(lifecycle.finalize(), SaverState::Entered);
        assert_eq!(lifecycle.finalize(), SaverState::Finalized);
        assert!(lifecycle.ensure_entered().is_err());
    }

    #[tokio::test]
    async fn test_run_scoped_exits_on_success() {
        let saver = saver(false);
        let value = run_scoped(&saver, || async { Ok(5) }).await.unwrap();
        assert_eq!(value, 5);
        assert_eq!(saver.exits.load(Ordering::SeqCst), 1);
        assert_eq!(saver.lifecycle().state(), SaverState::Finalized);
    }

    #[tokio::test]
    async fn test_run_scoped_exits_on_failure() {
        let saver = saver(false);
        let result: Result<(), _> = run_scoped(&saver, || async {
            Err(AcquireError::TaskPanicked("boom".into()))
        })
        .await;
        assert!(matches!(result, Err(AcquireError::TaskPanicked(_))));
        assert_eq!(saver.exits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_scoped_body_error_wins_over_exit_error() {
        let saver = saver(true);
        let result: Result<(), _> = run_scoped(&saver, || async {
            Err(AcquireError::TaskPanicked("boom".into()))
        })
        .await;
        assert!(matches!(result, Err(AcquireError::TaskPanicked(_))));
    }

    #[tokio::test]
    async fn test_run_scoped_reports_exit_error() {
        let saver = saver(true);
        let result = run_scoped(&saver, || async { Ok(()) }).await;
        assert!(matches!(result, Err(AcquireError::Saver(SaverError::Io(_)))));
    }

    #[test]
    fn test_saver_kind_default_is_epub() {
        assert_eq!(SaverKind::default(), SaverKind::Epub);
    }
}
