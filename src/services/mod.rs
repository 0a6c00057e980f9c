//! Service layer for the acquisition pipeline.
//!
//! Services hold the scheduling logic and report progress through events,
//! so the CLI (or anything else) can drive them.

pub mod download;

pub use download::{ChunkedScheduler, DownloadEvent, DownloadSummary, RetryPolicy};
