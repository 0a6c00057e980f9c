//! Error types for the acquisition pipeline.
//!
//! Every error knows whether repeating the operation that produced it can
//! succeed; see [`Retryable`].

use std::path::PathBuf;

use thiserror::Error;

/// Classifies an error as transient (worth another attempt) or terminal.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// HTTP statuses that usually clear up on their own.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429) || (500..=599).contains(&status)
}

/// Errors raised while reading a book or a chapter from a source site.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No loader registered for {0}")]
    UnknownSource(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse page: {detail}. URL: {url}")]
    Parsing { detail: String, url: String },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected JSON shape: {0}")]
    JsonSchema(String),

    #[error("Captcha page returned for {0}")]
    Captcha(String),

    #[error("Chapter is not publicly readable: {0}")]
    AccessRestricted(String),

    #[error("Chapter has no text: {0}")]
    EmptyContent(String),

    #[error("Invalid selector {0}")]
    Selector(String),
}

impl SourceError {
    pub fn parsing(detail: impl Into<String>, url: impl ToString) -> Self {
        SourceError::Parsing {
            detail: detail.into(),
            url: url.to_string(),
        }
    }
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        match self {
            SourceError::Http(e) => match e.status() {
                Some(status) => is_transient_status(status.as_u16()),
                // timeouts, refused connections, truncated bodies
                None => !e.is_builder(),
            },
            SourceError::Status { status, .. } => is_transient_status(*status),
            SourceError::Parsing { .. }
            | SourceError::Json(_)
            | SourceError::JsonSchema(_)
            | SourceError::Captcha(_) => true,
            SourceError::UnknownSource(_)
            | SourceError::AccessRestricted(_)
            | SourceError::EmptyContent(_)
            | SourceError::Selector(_) => false,
        }
    }
}

/// Errors raised by an output sink.
#[derive(Debug, Error)]
pub enum SaverError {
    #[error("{0} saver used outside of its enter/exit scope")]
    NotEntered(&'static str),

    #[error("{0} saver was already entered")]
    Reentered(&'static str),

    #[error("Chapter {0} was already saved")]
    DuplicateChapter(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EPUB container error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Retryable for SaverError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Failure of one load-then-save unit for a single chapter.
#[derive(Debug, Error)]
pub enum ChapterTaskError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Saver(#[from] SaverError),
}

impl Retryable for ChapterTaskError {
    fn is_retryable(&self) -> bool {
        match self {
            ChapterTaskError::Source(e) => e.is_retryable(),
            ChapterTaskError::Saver(e) => e.is_retryable(),
        }
    }
}

/// Errors raised while narrowing the chapter list.
#[derive(Debug, Error)]
pub enum TrimError {
    #[error("fzf is not installed: {0}")]
    PickerMissing(#[from] which::Error),

    #[error("Failed to run fzf: {0}")]
    Picker(#[from] std::io::Error),

    #[error("Selection cancelled")]
    Cancelled,

    #[error("Selected chapter not found: {0}")]
    UnknownSelection(String),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Top-level failure of an acquisition run.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Chapter {id} ({name}) failed after {attempts} attempt(s): {source}")]
    ChapterFailed {
        id: u32,
        name: String,
        attempts: usize,
        source: ChapterTaskError,
    },

    #[error("Chapter task panicked: {0}")]
    TaskPanicked(String),

    #[error("{0} exists and is not a directory")]
    DirectoryConflict(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Saver(#[from] SaverError),

    #[error(transparent)]
    Trim(#[from] TrimError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
