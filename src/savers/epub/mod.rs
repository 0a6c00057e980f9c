//! Single-file EPUB saver.
//!
//! Chapters arrive out of order from concurrent tasks; they are buffered by
//! id and the book is written once, on [`Saver::exit`].

mod package;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Saver, SaverLifecycle, SaverState};
use crate::error::SaverError;
use crate::models::{LoadedChapter, SaverContext};
use crate::utils::book_file_stem;

pub use package::{write_epub, EpubBook, NAV_CSS};

pub struct EpubSaver {
    context: SaverContext,
    output_dir: PathBuf,
    lifecycle: SaverLifecycle,
    chapters: Mutex<BTreeMap<u32, LoadedChapter>>,
}

impl EpubSaver {
    pub fn new(context: SaverContext, output_dir: &Path) -> Self {
        Self {
            context,
            output_dir: output_dir.to_path_buf(),
            lifecycle: SaverLifecycle::new("epub"),
            chapters: Mutex::new(BTreeMap::new()),
        }
    }

    /// Where the book is written on exit.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.epub", book_file_stem(&self.context.title)))
    }
}

#[async_trait]
impl Saver for EpubSaver {
    fn name(&self) -> &'static str {
        "epub"
    }

    async fn enter(&self) -> Result<(), SaverError> {
        self.lifecycle.enter()
    }

    async fn save_chapter(&self, chapter: LoadedChapter) -> Result<(), SaverError> {
        self.lifecycle.ensure_entered()?;
        let mut chapters = self.chapters.lock().await;
        if chapters.contains_key(&chapter.id()) {
            return Err(SaverError::DuplicateChapter(chapter.id()));
        }
        debug!("Buffered chapter {}", chapter.id());
        chapters.insert(chapter.id(), chapter);
        Ok(())
    }

    async fn exit(&self) -> Result<(), SaverError> {
        if self.lifecycle.finalize() != SaverState::Entered {
            return Ok(());
        }

        let chapters: Vec<LoadedChapter> = std::mem::take(&mut *self.chapters.lock().await)
            .into_values()
            .collect();
        let path = self.output_path();
        if chapters.is_empty() {
            warn!("No chapters were saved; not writing {}", path.display());
            return Ok(());
        }
        let context = self.context.clone();
        let count = chapters.len();

        let written = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), SaverError> {
            let book = EpubBook {
                identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
                title: &context.title,
                language: &context.language,
                author: &context.author,
                modified: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                covers: &context.covers,
                chapters,
            };
            let file = File::create(&written)?;
            write_epub(&book, BufWriter::new(file))
        })
        .await
        .map_err(|e| SaverError::Io(std::io::Error::other(e)))??;

        info!("Wrote {} chapters to {}", count, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, LoadedImage};
    use std::io::Read;
    use url::Url;

    fn loaded(id: u32) -> LoadedChapter {
        let chapter = Chapter::new(
            id,
            format!("Chapter {}", id),
            Url::parse(&format!("https://site.example/{}", id)).unwrap(),
        );
        LoadedChapter::new(&chapter, format!("Title {}", id), vec!["text".into()], Vec::new())
            .unwrap()
    }

    fn context() -> SaverContext {
        let cover = LoadedImage::new(Url::parse("https://site.example/c.jpg").unwrap(), vec![1]);
        SaverContext::new("My: Book?", vec![cover]).with_author("Author")
    }

    #[tokio::test]
    async fn test_writes_chapters_in_id_order() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = EpubSaver::new(context(), tmp.path());
        saver.enter().await.unwrap();
        for id in [3, 1, 2] {
            saver.save_chapter(loaded(id)).await.unwrap();
        }
        saver.exit().await.unwrap();

        let path = saver.output_path();
        assert!(path.exists());
        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut opf = String::new();
        archive
            .by_name("OEBPS/content.opf")
            .unwrap()
            .read_to_string(&mut opf)
            .unwrap();
        let positions: Vec<usize> = [1, 2, 3]
            .iter()
            .map(|id| opf.find(&format!("idref=\"chapter-{}\"", id)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(opf.contains("<dc:creator id=\"creator\">Author</dc:creator>"));
        assert!(opf.contains("<dc:language>ru</dc:language>"));
    }

    #[tokio::test]
    async fn test_rejects_duplicate_chapter() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = EpubSaver::new(context(), tmp.path());
        saver.enter().await.unwrap();
        saver.save_chapter(loaded(1)).await.unwrap();
        let err = saver.save_chapter(loaded(1)).await.unwrap_err();
        assert!(matches!(err, SaverError::DuplicateChapter(1)));
    }

    #[tokio::test]
    async fn test_exit_without_enter_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = EpubSaver::new(context(), tmp.path());
        saver.exit().await.unwrap();
        assert!(!saver.output_path().exists());
    }

    #[tokio::test]
    async fn test_exit_with_no_chapters_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = EpubSaver::new(context(), tmp.path());
        saver.enter().await.unwrap();
        saver.exit().await.unwrap();
        assert!(!saver.output_path().exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_second_exit_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let saver = EpubSaver::new(context(), tmp.path());
        saver.enter().await.unwrap();
        saver.save_chapter(loaded(1)).await.unwrap();
        saver.exit().await.unwrap();
        std::fs::remove_file(saver.output_path()).unwrap();
        saver.exit().await.unwrap();
        assert!(!saver.output_path().exists());
    }
}
