//! Chapter references and fetched chapter content.

use url::Url;

use super::LoadedImage;
use crate::error::SourceError;

/// A chapter as listed on a book's main page.
///
/// `id` is the 1-based position in reading order assigned by the main-page
/// loader. It survives trimming unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: u32,
    pub name: String,
    pub url: Url,
}

impl Chapter {
    pub fn new(id: u32, name: impl Into<String>, url: Url) -> Self {
        Self {
            id,
            name: name.into(),
            url,
        }
    }

    /// Name used for output files and table-of-contents entries.
    pub fn base_name(&self) -> String {
        format!("{}. {}", self.id, self.name)
    }
}

/// Fully fetched chapter, ready to be handed to a saver.
#[derive(Debug, Clone)]
pub struct LoadedChapter {
    chapter: Chapter,
    title: String,
    paragraphs: Vec<String>,
    images: Vec<LoadedImage>,
}

impl LoadedChapter {
    /// Build a loaded chapter. A chapter without any text is rejected.
    pub fn new(
        chapter: &Chapter,
        title: impl Into<String>,
        paragraphs: Vec<String>,
        images: Vec<LoadedImage>,
    ) -> Result<Self, SourceError> {
        if paragraphs.is_empty() {
            return Err(SourceError::EmptyContent(chapter.url.to_string()));
        }
        Ok(Self {
            chapter: chapter.clone(),
            title: title.into(),
            paragraphs,
            images,
        })
    }

    pub fn id(&self) -> u32 {
        self.chapter.id
    }

    pub fn name(&self) -> &str {
        &self.chapter.name
    }

    pub fn url(&self) -> &Url {
        &self.chapter.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn images(&self) -> &[LoadedImage] {
        &self.images
    }

    pub fn base_name(&self) -> String {
        self.chapter.base_name()
    }
}
