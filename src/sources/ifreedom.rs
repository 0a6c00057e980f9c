//! ifreedom.su loader.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use tracing::{error, info};
use url::Url;

use super::parsing::{find, find_required, require_attr, require_text, resolve_link, select_all, text_of};
use super::{ChapterLoader, MainPageLoader, SourceContext};
use crate::error::SourceError;
use crate::models::{Chapter, LoadedChapter, MainPageInfo};

/// Subscription-only chapters link here instead of to the chapter.
const VIP_MARKER: &str = "/podpiska/";
/// Paid chapters link to the wallet page.
const PAID_MARKER: &str = "/koshelek/";

#[derive(Debug, PartialEq)]
pub struct IfreedomMainPage {
    pub title: String,
    pub cover_url: Url,
    /// Free chapters as (name, url), oldest first.
    pub chapters: Vec<(String, Url)>,
    pub skipped_vip: usize,
    pub skipped_paid: usize,
}

#[derive(Debug, PartialEq)]
pub struct IfreedomChapterPage {
    pub title: String,
    pub paragraphs: Vec<String>,
}

pub fn parse_main_page(html: &str, page_url: &Url, domain: &Url) -> Result<IfreedomMainPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let info = find_required(root, "div.book-info", "book-info container missing", page_url)?;
    let title_tag = find_required(info, "h1", "book title tag missing", page_url)?;
    let title = require_text(title_tag, "book title is empty", page_url)?;

    let cover_block = find_required(
        root,
        "div.book-img, div.block-book-slide-img",
        "cover container missing",
        page_url,
    )?;
    let img = find_required(cover_block, "img", "cover image missing", page_url)?;
    let src = require_attr(img, "src", "cover image src missing", page_url)?;
    let cover_url = resolve_link(domain, src, page_url)?;

    let tabs = find_required(root, "div.tab-content", "tab-content container missing", page_url)?;
    let mut chapters = Vec::new();
    let mut skipped_vip = 0;
    let mut skipped_paid = 0;
    for line in select_all(tabs, "div.chapterinfo")?.into_iter().rev() {
        let link = find_required(line, "a", "chapter line missing anchor", page_url)?;
        let href = require_attr(link, "href", "chapter link missing href", page_url)?;
        if href.contains(VIP_MARKER) {
            skipped_vip += 1;
            continue;
        }
        if href.contains(PAID_MARKER) {
            skipped_paid += 1;
            continue;
        }
        let name = text_of(link).trim().to_string();
        chapters.push((name, resolve_link(domain, href, page_url)?));
    }

    Ok(IfreedomMainPage {
        title,
        cover_url,
        chapters,
        skipped_vip,
        skipped_paid,
    })
}

pub fn parse_chapter_page(html: &str, page_url: &Url) -> Result<IfreedomChapterPage, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    if find(root, "form.wpcf7-form")?.is_some() {
        error!("Captcha page returned for {}", page_url);
        return Err(SourceError::Captcha(page_url.to_string()));
    }

    let block = find_required(root, "div.block", "title block missing", page_url)?;
    let title_tag = find_required(block, "h1", "chapter title missing", page_url)?;
    let title = require_text(title_tag, "chapter title is empty", page_url)?;

    let container = find_required(root, "div.chapter-content", "chapter-content missing", page_url)?;
    if find(container, "div.single-notice")?.is_some() {
        return Err(SourceError::AccessRestricted(page_url.to_string()));
    }

    let paragraphs: Vec<String> = select_all(container, "p")?
        .into_iter()
        .map(text_of)
        .filter(|text| !text.trim().is_empty())
        .collect();
    if paragraphs.is_empty() {
        return Err(SourceError::EmptyContent(page_url.to_string()));
    }

    Ok(IfreedomChapterPage { title, paragraphs })
}

pub struct IfreedomLoader {
    ctx: SourceContext,
}

impl IfreedomLoader {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MainPageLoader for IfreedomLoader {
    async fn load(&self) -> Result<MainPageInfo, SourceError> {
        let html = self.ctx.client.get_text(&self.ctx.url).await?;
        let page = parse_main_page(&html, &self.ctx.url, &self.ctx.domain)?;
        if page.skipped_vip + page.skipped_paid > 0 {
            info!(
                "Skipped {} subscription and {} paid chapters",
                page.skipped_vip, page.skipped_paid
            );
        }

        let cover = self.ctx.images.fetch(page.cover_url).await;
        let chapters = page
            .chapters
            .into_iter()
            .zip(1u32..)
            .map(|((name, url), id)| Chapter::new(id, name, url))
            .collect();

        Ok(MainPageInfo {
            title: page.title,
            chapters,
            covers: cover.into_iter().collect(),
        })
    }

    fn chapter_loader(&self) -> Arc<dyn ChapterLoader> {
        Arc::new(IfreedomChapterLoader {
            ctx: self.ctx.clone(),
        })
    }
}

pub struct IfreedomChapterLoader {
    ctx: SourceContext,
}

#[async_trait]
impl ChapterLoader for IfreedomChapterLoader {
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError> {
        let html = self.ctx.client.get_text(&chapter.url).await?;
        let page = parse_chapter_page(&html, &chapter.url)?;
        LoadedChapter::new(chapter, page.title, page.paragraphs, Vec::new())
    }
}
