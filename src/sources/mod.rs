//! Source sites and the loaders that read books from them.
//!
//! A book URL is matched against a closed table of supported sites. Each
//! site provides a [`MainPageLoader`] for the book page and a
//! [`ChapterLoader`] for individual chapters. HTML is parsed synchronously
//! into plain data before any further request is awaited.

pub mod ifreedom;
pub mod image;
pub mod parsing;
pub mod ranobes;
pub mod renovels;
pub mod tlrulate;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::SessionSettings;
use crate::error::{AcquireError, SourceError};
use crate::http_client::HttpClient;
use crate::models::{Chapter, LoadedChapter, MainPageInfo};
use crate::rate_limiter::RateLimiter;

pub use image::ImageFetcher;

/// Reads a book's main page.
#[async_trait]
pub trait MainPageLoader: Send + Sync {
    /// Load the title, covers and the full chapter list.
    ///
    /// Chapters come back in reading order with ids `1..=N`. Each cover URL
    /// is fetched once; covers that fail to download are left out.
    async fn load(&self) -> Result<MainPageInfo, SourceError>;

    /// Loader for this book's chapters.
    fn chapter_loader(&self) -> Arc<dyn ChapterLoader>;
}

/// Reads a single chapter.
#[async_trait]
pub trait ChapterLoader: Send + Sync {
    /// Fetch a chapter's text and images. Image failures are dropped; a
    /// chapter without text is an error.
    async fn load_chapter(&self, chapter: &Chapter) -> Result<LoadedChapter, SourceError>;
}

/// Supported source sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    TlRulate,
    Renovels,
    Ranobes,
    Ifreedom,
}

impl Site {
    pub const ALL: [Site; 4] = [Site::TlRulate, Site::Renovels, Site::Ranobes, Site::Ifreedom];

    pub fn hosts(self) -> &'static [&'static str] {
        match self {
            Site::TlRulate => &["tl.rulate.ru"],
            Site::Renovels => &["renovels.org"],
            Site::Ranobes => &["ranobes.net", "ranobes.com"],
            Site::Ifreedom => &["ifreedom.su"],
        }
    }

    pub fn from_url(url: &Url) -> Option<Site> {
        let host = url.host_str()?;
        let host = host.strip_prefix("www.").unwrap_or(host);
        Site::ALL
            .into_iter()
            .find(|site| site.hosts().contains(&host))
    }

    fn loader(self, ctx: SourceContext) -> Box<dyn MainPageLoader> {
        match self {
            Site::TlRulate => Box::new(tlrulate::TlRulateLoader::new(ctx)),
            Site::Renovels => Box::new(renovels::RenovelsLoader::new(ctx)),
            Site::Ranobes => Box::new(ranobes::RanobesLoader::new(ctx)),
            Site::Ifreedom => Box::new(ifreedom::IfreedomLoader::new(ctx)),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hosts()[0])
    }
}

/// What every loader of one book shares.
#[derive(Clone)]
pub struct SourceContext {
    pub client: HttpClient,
    pub images: ImageFetcher,
    /// The book's main page.
    pub url: Url,
    /// Root of the book's site, used to resolve relative links.
    pub domain: Url,
}

impl SourceContext {
    pub fn new(client: HttpClient, images: ImageFetcher, url: Url) -> Self {
        let domain = domain_of(&url);
        Self {
            client,
            images,
            url,
            domain,
        }
    }
}

/// Picks the loader for a book URL.
pub struct SiteResolver {
    session: SessionSettings,
    rate_limiter: RateLimiter,
}

impl SiteResolver {
    pub fn new(session: SessionSettings, rate_limiter: RateLimiter) -> Self {
        Self {
            session,
            rate_limiter,
        }
    }

    /// Return the main-page loader for `url`. Sends no requests.
    pub fn resolve(&self, url: &Url) -> Result<Box<dyn MainPageLoader>, AcquireError> {
        let site = Site::from_url(url).ok_or_else(|| {
            SourceError::UnknownSource(url.host_str().unwrap_or(url.as_str()).to_string())
        })?;
        debug!("Resolved {} to {}", url, site);

        let client = HttpClient::new(&self.session, self.rate_limiter.clone(), url)?;
        let images = ImageFetcher::new(client.clone(), self.session.image_timeout());
        Ok(site.loader(SourceContext::new(client, images, url.clone())))
    }
}

/// Scheme, host and port of `url` with an empty path.
pub fn domain_of(url: &Url) -> Url {
    let mut domain = url.clone();
    domain.set_path("/");
    domain.set_query(None);
    domain.set_fragment(None);
    domain
}

/// Make a link absolute. Absolute links pass through unchanged; relative
/// ones are resolved against `domain`.
pub fn normalize_url(domain: &Url, link: &str) -> Result<Url, url::ParseError> {
    domain.join(link.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_site_lookup() {
        assert_eq!(
            Site::from_url(&url("https://tl.rulate.ru/book/123")),
            Some(Site::TlRulate)
        );
        assert_eq!(
            Site::from_url(&url("https://renovels.org/novel/abc")),
            Some(Site::Renovels)
        );
        assert_eq!(
            Site::from_url(&url("https://www.ranobes.net/novels/1-x.html")),
            Some(Site::Ranobes)
        );
        assert_eq!(
            Site::from_url(&url("https://ifreedom.su/ranobe/x/")),
            Some(Site::Ifreedom)
        );
        assert_eq!(Site::from_url(&url("https://example.com/book")), None);
    }

    #[test]
    fn test_resolve_unknown_host() {
        let resolver = SiteResolver::new(SessionSettings::default(), RateLimiter::new());
        let err = resolver
            .resolve(&url("https://example.com/book"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AcquireError::Source(SourceError::UnknownSource(ref host)) if host == "example.com"
        ));
    }

    #[test]
    fn test_resolve_known_host() {
        let resolver = SiteResolver::new(SessionSettings::default(), RateLimiter::new());
        assert!(resolver.resolve(&url("https://tl.rulate.ru/book/1")).is_ok());
    }

    #[test]
    fn test_normalize_relative_url() {
        let domain = url("https://site.example");
        assert_eq!(
            normalize_url(&domain, "/img/1.png").unwrap().as_str(),
            "https://site.example/img/1.png"
        );
    }

    #[test]
    fn test_normalize_absolute_url_unchanged() {
        let domain = url("https://site.example");
        assert_eq!(
            normalize_url(&domain, "https://cdn.example/a.jpg").unwrap().as_str(),
            "https://cdn.example/a.jpg"
        );
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(
            domain_of(&url("https://tl.rulate.ru/book/1?x=2#c")).as_str(),
            "https://tl.rulate.ru/"
        );
    }
}
