//! renovels.org loader.
//!
//! The book page embeds its metadata as JSON in a `__RQ_R` script. The
//! chapter list and chapter bodies come from the site's JSON API.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::future::try_join_all;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::parsing::{fragment_paragraphs, select_all, text_of};
use super::{ChapterLoader, MainPageLoader, SourceContext};
use crate::error::SourceError;
use crate::http_client::parse_json;
use crate::models::{Chapter, LoadedChapter, MainPageInfo};

pub const CHAPTERS_API: &str = "https://api.renovels.org/api/v2/titles/chapters/";

/// Chapters per API page.
const PAGE_SIZE: u32 = 20;

static PUSH_PAYLOAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\.push\((\{.*?\})\)").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct ScriptData {
    queries: Vec<Query>,
}

#[derive(Debug, Deserialize)]
struct Query {
    state: QueryState,
}

#[derive(Debug, Deserialize)]
struct QueryState {
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    json: TitleContent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleContent {
    pub main_name: String,
    pub cover: Cover,
    pub count_chapters: u32,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cover {
    pub high: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Branch {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct ChaptersPage {
    results: Vec<ChapterShort>,
}

#[derive(Debug, Deserialize)]
struct ChapterShort {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ChapterResponse {
    #[serde(default)]
    name: String,
    content: String,
}

/// Extract the title metadata embedded in the book page.
pub fn parse_main_page(html: &str, page_url: &Url) -> Result<TitleContent, SourceError> {
    let payload = {
        let document = Html::parse_document(html);
        let script = select_all(document.root_element(), "script")?
            .into_iter()
            .map(text_of)
            .find(|text| text.contains("__RQ_R"))
            .ok_or_else(|| SourceError::parsing("script not found", page_url))?;
        PUSH_PAYLOAD
            .captures(&script)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SourceError::parsing("can't find JSON payload in script", page_url))?
    };

    let data: ScriptData = parse_json(&payload, page_url)?;
    let content = data
        .queries
        .into_iter()
        .next()
        .map(|q| q.state.data.json)
        .ok_or_else(|| SourceError::JsonSchema(format!("queries is empty. URL: {}", page_url)))?;
    if content.branches.is_empty() {
        return Err(SourceError::JsonSchema(format!(
            "branches is empty. URL: {}",
            page_url
        )));
    }
    Ok(content)
}

/// API pages listing every chapter of a branch.
pub fn chapter_list_urls(branch_id: u64, count_chapters: u32) -> Result<Vec<Url>, url::ParseError> {
    let base = Url::parse(CHAPTERS_API)?;
    Ok((1..=count_chapters / PAGE_SIZE + 1)
        .map(|page| {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("branch_id", &branch_id.to_string())
                .append_pair("ordering", "index")
                .append_pair("count", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            url
        })
        .collect())
}

/// Number chapters by position; the name is the position itself.
pub fn chapters_from_ids(ids: &[u64]) -> Result<Vec<Chapter>, url::ParseError> {
    let base = Url::parse(CHAPTERS_API)?;
    ids.iter()
        .zip(1u32..)
        .map(|(chapter_id, id)| Ok(Chapter::new(id, id.to_string(), base.join(&chapter_id.to_string())?)))
        .collect()
}

fn api_error(e: url::ParseError) -> SourceError {
    SourceError::parsing(format!("invalid API url: {}", e), CHAPTERS_API)
}

pub struct RenovelsLoader {
    ctx: SourceContext,
}

impl RenovelsLoader {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    async fn collect_chapter_ids(&self, branch_id: u64, count_chapters: u32) -> Result<Vec<u64>, SourceError> {
        let urls = chapter_list_urls(branch_id, count_chapters).map_err(api_error)?;
        debug!("Fetching {} chapter list pages", urls.len());
        let pages: Vec<ChaptersPage> =
            try_join_all(urls.iter().map(|url| self.ctx.client.get_json(url))).await?;
        Ok(pages
            .into_iter()
            .flat_map(|page| page.results)
            .map(|chapter| chapter.id)
            .collect())
    }
}

#[async_trait]
impl MainPageLoader for RenovelsLoader {
    async fn load(&self) -> Result<MainPageInfo, SourceError> {
        let html = self.ctx.client.get_text(&self.ctx.url).await?;
        let content = parse_main_page(&html, &self.ctx.url)?;

        let covers = match self.ctx.domain.join(&content.cover.high) {
            Ok(url) => self.ctx.images.fetch(url).await.into_iter().collect(),
            Err(e) => {
                debug!("Bad cover path {}: {}", content.cover.high, e);
                Vec::new()
            }
        };

        let branch_id = content.branches[0].id;
        let ids = self
            .collect_chapter_ids(branch_id, content.count_chapters)
            .await?;

        Ok(MainPageInfo {
            title: content.main_name,
            chapters: chapters_from_ids(&ids).map_err(api_error)?,
            covers,
        })
    }

    fn chapter_loader(&self) -> Arc<dyn ChapterLoader> {
        Arc::new(RenovelsChapterLoader {
            ctx: self.ctx.clone(),
        })
    }
}

pub struct RenovelsChapterLoader {
    ctx: SourceContext,
}

#[async_trait]
impl ChapterLoader for RenovelsChapterLoader {
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError> {
        let response: ChapterResponse = self.ctx.client.get_json(&chapter.url).await?;
        debug!("Got {}", chapter.base_name());
        let paragraphs = fragment_paragraphs(&response.content)?;
        let title = if response.name.trim().is_empty() {
            chapter.name.clone()
        } else {
            response.name
        };
        LoadedChapter::new(chapter, title, paragraphs, Vec::new())
    }
}
