//! ranobes.net loader.
//!
//! The book page links to a paginated chapter index. Index pages list the
//! newest chapters first, so pages and entries are both walked in reverse.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info};
use url::Url;

use super::parsing::{
    find, find_required, require_attr, require_text, resolve_link, select_all, text_of,
};
use super::{ChapterLoader, MainPageLoader, SourceContext};
use crate::error::SourceError;
use crate::models::{Chapter, LoadedChapter, MainPageInfo};

static TRAILING_PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)(/?)$").expect("valid regex"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

#[derive(Debug, PartialEq)]
pub struct RanobesMainPage {
    pub title: String,
    pub chapter_index_url: Url,
    pub cover_url: Url,
}

#[derive(Debug, PartialEq)]
pub struct RanobesChapterPage {
    pub title: String,
    pub paragraphs: Vec<String>,
}

pub fn parse_main_page(html: &str, page_url: &Url, domain: &Url) -> Result<RanobesMainPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title_tag = find_required(root, "h1.title", "title tag missing", page_url)?;
    let title = require_text(title_tag, "empty title", page_url)?;

    let foot = find_required(root, "div.r-fullstory-chapters-foot", "chapter block not found", page_url)?;
    let links = select_all(foot, "a")?;
    let index_link = links
        .get(1)
        .ok_or_else(|| SourceError::parsing("chapter page link not found", page_url))?;
    let href = require_attr(*index_link, "href", "chapter page href missing", page_url)?;
    let chapter_index_url = resolve_link(domain, href, page_url)?;

    let poster = find_required(root, "div.r-fullstory-poster", "cover container missing", page_url)?;
    let img = find_required(poster, "img", "cover image missing", page_url)?;
    let src = require_attr(img, "src", "cover image src missing", page_url)?;
    let cover_url = resolve_link(domain, src, page_url)?;

    Ok(RanobesMainPage {
        title,
        chapter_index_url,
        cover_url,
    })
}

/// URLs of every chapter index page, first page first.
pub fn parse_pagination(html: &str, page_url: &Url, domain: &Url) -> Result<Vec<Url>, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let pages = find_required(root, "div.pages", "pages container missing", page_url)?;
    let mut last: Option<(u32, &str)> = None;
    for anchor in select_all(pages, "a")? {
        let number: u32 = text_of(anchor).trim().parse().map_err(|_| {
            SourceError::parsing("cannot convert pagination number to int", page_url)
        })?;
        let href = require_attr(anchor, "href", "pagination link without href", page_url)?;
        if last.map_or(true, |(max, _)| number > max) {
            last = Some((number, href));
        }
    }

    let (max_page, href) =
        last.ok_or_else(|| SourceError::parsing("pagination list is empty", page_url))?;
    info!("Detected {} chapter index pages", max_page);

    (1..=max_page)
        .map(|n| {
            let link = TRAILING_PAGE_NUMBER.replace(href, format!("/{}${{2}}", n).as_str());
            resolve_link(domain, &link, page_url)
        })
        .collect()
}

/// (title, url) of every chapter on one index page, in page order.
pub fn parse_chapter_list(html: &str, page_url: &Url, domain: &Url) -> Result<Vec<(String, Url)>, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let container = find_required(root, "div#dle-content", "chapter list container missing", page_url)?;
    let mut entries = Vec::new();
    for line in select_all(container, "div.cat_line")? {
        let link = find_required(line, "a", "chapter line missing anchor", page_url)?;
        let href = require_attr(link, "href", "chapter link missing href", page_url)?;
        let title = require_attr(link, "title", "chapter link missing title", page_url)?;
        entries.push((title.to_string(), resolve_link(domain, href, page_url)?));
    }
    Ok(entries)
}

pub fn parse_chapter_page(html: &str, page_url: &Url) -> Result<RanobesChapterPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let container = find_required(root, "div#dle-content", "chapter content container missing", page_url)?;
    let title_tag = find_required(container, "h1", "chapter title not found", page_url)?;
    let title = require_text(title_tag, "chapter title is empty", page_url)?;

    let mut paragraphs: Vec<String> = select_all(container, "p")?
        .into_iter()
        .map(text_of)
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        let article = find(container, "div#arrticle")?
            .ok_or_else(|| SourceError::EmptyContent(page_url.to_string()))?;
        let text = article.text().collect::<Vec<_>>().join("\n");
        paragraphs = BLANK_LINES
            .replace_all(&text, "\n")
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
    }

    Ok(RanobesChapterPage { title, paragraphs })
}

pub struct RanobesLoader {
    ctx: SourceContext,
}

impl RanobesLoader {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    async fn collect_chapters(&self, pages: Vec<Url>) -> Result<Vec<Chapter>, SourceError> {
        let mut chapters = Vec::new();
        for page in pages.iter().rev() {
            let html = self.ctx.client.get_text(page).await?;
            let entries = parse_chapter_list(&html, page, &self.ctx.domain)?;
            debug!("{} chapters on {}", entries.len(), page);
            for (title, url) in entries.into_iter().rev() {
                let id = chapters.len() as u32 + 1;
                chapters.push(Chapter::new(id, title, url));
            }
        }
        Ok(chapters)
    }
}

#[async_trait]
impl MainPageLoader for RanobesLoader {
    async fn load(&self) -> Result<MainPageInfo, SourceError> {
        let html = self.ctx.client.get_text(&self.ctx.url).await?;
        let main = parse_main_page(&html, &self.ctx.url, &self.ctx.domain)?;

        let cover = self.ctx.images.fetch(main.cover_url).await;

        let index_html = self.ctx.client.get_text(&main.chapter_index_url).await?;
        let pages = parse_pagination(&index_html, &main.chapter_index_url, &self.ctx.domain)?;
        let chapters = self.collect_chapters(pages).await?;

        Ok(MainPageInfo {
            title: main.title,
            chapters,
            covers: cover.into_iter().collect(),
        })
    }

    fn chapter_loader(&self) -> Arc<dyn ChapterLoader> {
        Arc::new(RanobesChapterLoader {
            ctx: self.ctx.clone(),
        })
    }
}

pub struct RanobesChapterLoader {
    ctx: SourceContext,
}

#[async_trait]
impl ChapterLoader for RanobesChapterLoader {
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError> {
        debug!("Loading chapter {}", chapter.url);
        let html = self.ctx.client.get_text(&chapter.url).await?;
        let page = parse_chapter_page(&html, &chapter.url)?;
        LoadedChapter::new(chapter, page.title, page.paragraphs, Vec::new())
    }
}
