//! Plain-file saver: a text file per chapter plus its images.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Saver, SaverLifecycle};
use crate::error::SaverError;
use crate::models::LoadedChapter;
use crate::utils::{sanitize_filename, truncate_bytes};

/// Longest chapter stem shared by text and image files, in bytes.
const MAX_STEM_BYTES: usize = 200;
/// Longest image extension kept, in bytes, dot included.
const MAX_EXTENSION_BYTES: usize = 16;

/// Writes each chapter as soon as it arrives.
pub struct FilesSaver {
    output_dir: PathBuf,
    lifecycle: SaverLifecycle,
    saved: Mutex<HashSet<u32>>,
}

impl FilesSaver {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            lifecycle: SaverLifecycle::new("files"),
            saved: Mutex::new(HashSet::new()),
        }
    }

    fn text_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{}.txt", stem))
    }

    fn image_path(&self, stem: &str, index: usize, extension: &str) -> PathBuf {
        let extension = truncate_bytes(extension, MAX_EXTENSION_BYTES);
        self.output_dir
            .join(format!("{}_{}{}", stem, index, extension))
    }
}

fn chapter_stem(chapter: &LoadedChapter) -> String {
    let stem = sanitize_filename(&chapter.base_name());
    truncate_bytes(&stem, MAX_STEM_BYTES).to_string()
}

/// Title, a blank line, then one paragraph per line.
pub fn render_text(chapter: &LoadedChapter) -> String {
    let mut text = String::new();
    text.push_str(chapter.title());
    text.push_str("\n\n");
    for paragraph in chapter.paragraphs() {
        text.push_str(paragraph);
        text.push('\n');
    }
    text
}

#[async_trait]
impl Saver for FilesSaver {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn enter(&self) -> Result<(), SaverError> {
        self.lifecycle.enter()
    }

    async fn save_chapter(&self, chapter: LoadedChapter) -> Result<(), SaverError> {
        self.lifecycle.ensure_entered()?;
        if !self.saved.lock().await.insert(chapter.id()) {
            return Err(SaverError::DuplicateChapter(chapter.id()));
        }

        let stem = chapter_stem(&chapter);
        let text_path = self.text_path(&stem);
        debug!("Writing {}", text_path.display());
        tokio::fs::write(&text_path, render_text(&chapter)).await?;

        for (index, image) in chapter.images().iter().enumerate() {
            let path = self.image_path(&stem, index + 1, &image.extension());
            debug!("Writing image {}", path.display());
            tokio::fs::write(&path, &image.data).await?;
        }
        Ok(())
    }

    async fn exit(&self) -> Result<(), SaverError> {
        self.lifecycle.finalize();
        debug!("Files saver finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, LoadedImage};
    use url::Url;

    fn loaded(id: u32, images: Vec<LoadedImage>) -> LoadedChapter {
        named(id, &format!("Chapter {}", id), images)
    }

    fn named(id: u32, name: &str, images: Vec<LoadedImage>) -> LoadedChapter {
        let chapter = Chapter::new(
            id,
            name,
            Url::parse(&format!("https://site.example/{}", id)).unwrap(),
        );
        LoadedChapter::new(&chapter, "Title", vec!["One".into(), "Two".into()], images).unwrap()
    }

    #[tokio::test]
    async fn test_writes_text_and_images() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = FilesSaver::new(tmp.path());
        saver.enter().await.unwrap();

        let image = LoadedImage::new(Url::parse("https://site.example/a.png").unwrap(), vec![1, 2, 3]);
        saver.save_chapter(loaded(3, vec![image])).await.unwrap();
        saver.exit().await.unwrap();

        let text = std::fs::read_to_string(tmp.path().join("3. Chapter 3.txt")).unwrap();
        assert_eq!(text, "Title\n\nOne\nTwo\n");
        let image = std::fs::read(tmp.path().join("3. Chapter 3_1.png")).unwrap();
        assert_eq!(image, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_long_names_fit_file_system_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = FilesSaver::new(tmp.path());
        saver.enter().await.unwrap();

        let image = LoadedImage::new(Url::parse("https://site.example/a.png").unwrap(), vec![7]);
        saver
            .save_chapter(named(1, &"Г".repeat(140), vec![image]))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| name.len() <= 255));
        let text = names.iter().find(|n| n.ends_with(".txt")).unwrap();
        let image = names.iter().find(|n| n.ends_with("_1.png")).unwrap();
        assert_eq!(text.trim_end_matches(".txt"), image.trim_end_matches("_1.png"));
    }

    #[tokio::test]
    async fn test_rejects_duplicate_chapter() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = FilesSaver::new(tmp.path());
        saver.enter().await.unwrap();
        saver.save_chapter(loaded(1, Vec::new())).await.unwrap();
        let err = saver.save_chapter(loaded(1, Vec::new())).await.unwrap_err();
        assert!(matches!(err, SaverError::DuplicateChapter(1)));
    }

    #[tokio::test]
    async fn test_requires_enter() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = FilesSaver::new(tmp.path());
        let err = saver.save_chapter(loaded(1, Vec::new())).await.unwrap_err();
        assert!(matches!(err, SaverError::NotEntered("files")));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_saves_after_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = FilesSaver::new(tmp.path());
        saver.enter().await.unwrap();
        saver.exit().await.unwrap();
        assert!(saver.save_chapter(loaded(1, Vec::new())).await.is_err());
    }
}
