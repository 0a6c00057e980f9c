//! End-to-end pipeline tests
//!
//! Drives main page loading, trimming, the chunked scheduler and the EPUB
//! saver against in-memory loaders, then reads the produced book back.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use ranobe::error::{AcquireError, SourceError};
use ranobe::models::{Chapter, LoadedChapter, LoadedImage, MainPageInfo, SaverContext};
use ranobe::savers::{run_scoped, EpubSaver, Saver};
use ranobe::services::{ChunkedScheduler, DownloadSummary};
use ranobe::sources::{ChapterLoader, MainPageLoader};
use ranobe::trim::{trim, TrimBounds};

/// A book of `count` chapters; chapters listed in `broken` have no text.
struct FakeBook {
    count: u32,
    broken: Vec<u32>,
}

struct FakeChapters {
    broken: Vec<u32>,
}

#[async_trait]
impl MainPageLoader for FakeBook {
    async fn load(&self) -> Result<MainPageInfo, SourceError> {
        let chapters = (1..=self.count)
            .map(|id| {
                Chapter::new(
                    id,
                    format!("Глава {}", id),
                    Url::parse(&format!("https://book.example/chapter/{}", id)).unwrap(),
                )
            })
            .collect();
        let cover = LoadedImage::new(
            Url::parse("https://book.example/cover.jpg").unwrap(),
            vec![0xff, 0xd8, 0xff],
        );
        Ok(MainPageInfo {
            title: "Test Book".to_string(),
            chapters,
            covers: vec![cover],
        })
    }

    fn chapter_loader(&self) -> Arc<dyn ChapterLoader> {
        Arc::new(FakeChapters {
            broken: self.broken.clone(),
        })
    }
}

#[async_trait]
impl ChapterLoader for FakeChapters {
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError> {
        // earlier chapters finish last
        tokio::time::sleep(Duration::from_millis(u64::from(50 - chapter.id.min(50)))).await;
        let paragraphs = if self.broken.contains(&chapter.id) {
            Vec::new()
        } else {
            vec![format!("Text of chapter {}", chapter.id)]
        };
        LoadedChapter::new(chapter, chapter.name.clone(), paragraphs, Vec::new())
    }
}

async fn download(
    book: &FakeBook,
    bounds: TrimBounds,
    chunk_size: usize,
    dir: &Path,
) -> (Result<DownloadSummary, AcquireError>, Arc<EpubSaver>) {
    let info = book.load().await.unwrap();
    let chapters = trim(info.chapters, bounds);
    let saver = Arc::new(EpubSaver::new(SaverContext::new(info.title, info.covers), dir));
    let scheduler = ChunkedScheduler::new(chunk_size).unwrap();
    let loader = book.chapter_loader();

    let shared: Arc<dyn Saver> = saver.clone();
    let result = run_scoped(&*shared, || scheduler.run(chapters, loader, shared.clone())).await;
    (result, saver)
}

fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut out = String::new();
    entry.read_to_string(&mut out).unwrap();
    out
}

fn spine_ids(opf: &str) -> Vec<u32> {
    opf.lines()
        .filter_map(|line| line.trim().strip_prefix("<itemref idref=\"chapter-"))
        .filter_map(|rest| rest.split('"').next())
        .map(|id| id.parse().unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_book_is_saved_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let book = FakeBook {
        count: 7,
        broken: Vec::new(),
    };

    let (result, saver) = download(&book, TrimBounds::default(), 3, tmp.path()).await;
    let summary = result.unwrap();
    assert_eq!(summary.saved, 7);
    assert_eq!(summary.batches, 3);

    let path = saver.output_path();
    assert_eq!(path.file_name().unwrap(), "Test_Book.epub");
    let opf = read_entry(&path, "OEBPS/content.opf");
    assert_eq!(spine_ids(&opf), vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(opf.contains("<dc:title>Test Book</dc:title>"));

    let chapter = read_entry(&path, "OEBPS/chapters/5.xhtml");
    assert!(chapter.contains("<p>Text of chapter 5</p>"));
}

#[tokio::test]
async fn test_trimmed_range_keeps_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let book = FakeBook {
        count: 3,
        broken: Vec::new(),
    };

    let (result, saver) = download(&book, TrimBounds::new(Some(2), Some(3)), 40, tmp.path()).await;
    assert_eq!(result.unwrap().saved, 2);

    let opf = read_entry(&saver.output_path(), "OEBPS/content.opf");
    assert_eq!(spine_ids(&opf), vec![2, 3]);
    let nav = read_entry(&saver.output_path(), "OEBPS/nav.xhtml");
    assert!(nav.contains("2. Глава 2"));
    assert!(!nav.contains("1. Глава 1"));
}

#[tokio::test]
async fn test_failed_chapter_aborts_but_keeps_partial_book() {
    let tmp = tempfile::tempdir().unwrap();
    let book = FakeBook {
        count: 6,
        broken: vec![3],
    };

    let (result, saver) = download(&book, TrimBounds::default(), 2, tmp.path()).await;
    match result {
        Err(AcquireError::ChapterFailed { id, attempts, .. }) => {
            assert_eq!(id, 3);
            assert_eq!(attempts, 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // the batch holding chapter 3 drains, later batches never start
    let opf = read_entry(&saver.output_path(), "OEBPS/content.opf");
    assert_eq!(spine_ids(&opf), vec![1, 2, 4]);
}
