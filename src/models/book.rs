//! Book-level data: what a main page yields and what a saver is given.

use super::{Chapter, LoadedImage};

pub const DEFAULT_LANGUAGE: &str = "ru";
pub const DEFAULT_AUTHOR: &str = "Unknown author";

/// Everything read from a book's main page.
#[derive(Debug, Clone)]
pub struct MainPageInfo {
    pub title: String,
    pub chapters: Vec<Chapter>,
    pub covers: Vec<LoadedImage>,
}

/// Book metadata handed to a saver when it is built.
#[derive(Debug, Clone)]
pub struct SaverContext {
    pub title: String,
    pub language: String,
    pub author: String,
    pub covers: Vec<LoadedImage>,
}

impl SaverContext {
    pub fn new(title: impl Into<String>, covers: Vec<LoadedImage>) -> Self {
        Self {
            title: title.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            covers,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }
}
