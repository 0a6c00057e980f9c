//! Shared utility functions.
//!
//! - `html`: XHTML escaping for generated e-book pages
//! - `filename`: safe output file names
//! - `directory`: output directory preparation

mod directory;
mod filename;
mod html;

pub use directory::prepare_working_directory;
pub use filename::{book_file_stem, sanitize_filename, truncate_bytes};
pub use html::xml_escape;
