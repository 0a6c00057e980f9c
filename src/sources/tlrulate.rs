//! tl.rulate.ru loader.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, error, warn};
use url::Url;

use super::parsing::{
    find, find_required, require_attr, require_text, resolve_link, select_all, text_of,
};
use super::{ChapterLoader, MainPageLoader, SourceContext};
use crate::error::SourceError;
use crate::models::{Chapter, LoadedChapter, MainPageInfo};

/// Main-page data for one book.
#[derive(Debug, PartialEq)]
pub struct TlRulateMainPage {
    pub title: String,
    pub cover_urls: Vec<Url>,
    /// Readable chapters as (name, url), in page order.
    pub chapters: Vec<(String, Url)>,
}

/// Chapter page data.
#[derive(Debug, PartialEq)]
pub struct TlRulateChapterPage {
    pub title: String,
    pub paragraphs: Vec<String>,
    pub image_urls: Vec<Url>,
}

pub fn parse_main_page(html: &str, page_url: &Url, domain: &Url) -> Result<TlRulateMainPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let header = find_required(root, ".book-header", "book-header container missing", page_url)?;
    let title_tag = find_required(header, "h1", "book title tag missing", page_url)?;
    let title = require_text(title_tag, "book title is empty", page_url)?;
    debug!("Book title: {}", title);

    let mut cover_urls = Vec::new();
    match find(root, ".images")? {
        Some(container) => {
            for img in select_all(container, "img")? {
                let src = require_attr(img, "src", "cover image src missing", page_url)?;
                cover_urls.push(resolve_link(domain, src, page_url)?);
            }
        }
        None => error!("Cover images not found on {}", page_url),
    }

    let rows = select_all(root, ".chapter_row")?;
    if rows.is_empty() {
        warn!("Chapter list is empty on {}", page_url);
    }

    let mut chapters = Vec::new();
    for row in rows {
        let disabled = find(row, "span.disabled")?.is_some();
        let has_read_button = find(row, "a.btn")?.is_some();
        if disabled || !has_read_button {
            continue;
        }
        let link = find_required(row, "a", "chapter row anchor missing", page_url)?;
        let href = require_attr(link, "href", "chapter link href missing", page_url)?;
        let name = require_text(link, "chapter link title empty", page_url)?;
        chapters.push((name, resolve_link(domain, href, page_url)?));
    }

    Ok(TlRulateMainPage {
        title,
        cover_urls,
        chapters,
    })
}

pub fn parse_chapter_page(html: &str, page_url: &Url, domain: &Url) -> Result<TlRulateChapterPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let container = find_required(root, "#text-container", "text-container not found", page_url)?;
    let title_tag = find_required(container, "h1", "title tag missing inside text-container", page_url)?;
    let title = require_text(title_tag, "chapter title is empty", page_url)?;
    let content = find_required(container, ".content-text", "content-text container missing", page_url)?;

    let paragraphs = select_all(content, "p")?.into_iter().map(text_of).collect();

    let mut seen = HashSet::new();
    let mut image_urls = Vec::new();
    for img in select_all(content, "img")? {
        let src = require_attr(img, "src", "image without src in chapter text", page_url)?;
        let url = resolve_link(domain, src, page_url)?;
        if seen.insert(url.clone()) {
            image_urls.push(url);
        }
    }

    Ok(TlRulateChapterPage {
        title,
        paragraphs,
        image_urls,
    })
}

pub struct TlRulateLoader {
    ctx: SourceContext,
}

impl TlRulateLoader {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MainPageLoader for TlRulateLoader {
    async fn load(&self) -> Result<MainPageInfo, SourceError> {
        let html = self.ctx.client.get_text(&self.ctx.url).await?;
        let page = parse_main_page(&html, &self.ctx.url, &self.ctx.domain)?;

        let covers = self.ctx.images.fetch_all(page.cover_urls).await;
        debug!("Loaded {} covers", covers.len());

        let chapters = page
            .chapters
            .into_iter()
            .zip(1u32..)
            .map(|((name, url), id)| Chapter::new(id, name, url))
            .collect();

        Ok(MainPageInfo {
            title: page.title,
            chapters,
            covers,
        })
    }

    fn chapter_loader(&self) -> Arc<dyn ChapterLoader> {
        Arc::new(TlRulateChapterLoader {
            ctx: self.ctx.clone(),
        })
    }
}

pub struct TlRulateChapterLoader {
    ctx: SourceContext,
}

#[async_trait]
impl ChapterLoader for TlRulateChapterLoader {
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError> {
        let html = self.ctx.client.get_text(&chapter.url).await?;
        let page = parse_chapter_page(&html, &chapter.url, &self.ctx.domain)?;
        let images = self.ctx.images.fetch_all(page.image_urls).await;
        LoadedChapter::new(chapter, page.title, page.paragraphs, images)
    }
}
