//! ranobe - serialized-book acquisition.
//!
//! Reads a book's main page from a supported site, downloads its chapters
//! in rate-limited concurrent batches with retries, and writes them out as
//! an EPUB book or as plain files.

pub mod cli;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod rate_limiter;
pub mod savers;
pub mod services;
pub mod sources;
pub mod trim;
pub mod utils;
