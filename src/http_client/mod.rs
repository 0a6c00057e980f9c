//! Rate-limited HTTP client shared by all loaders.
//!
//! Every request takes a permit from the shared [`RateLimiter`] before it is
//! sent, including image and API requests.

#[cfg(test)]
pub(crate) mod stub_server;
mod user_agent;

pub use user_agent::UserAgent;

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::SessionSettings;
use crate::error::{ConfigError, SourceError};
use crate::rate_limiter::RateLimiter;

/// HTTP client with cookies, default headers and a shared rate limiter.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a client for one book. Session cookies are scoped to the
    /// book's site and its subdomains.
    pub fn new(
        session: &SessionSettings,
        rate_limiter: RateLimiter,
        site_url: &Url,
    ) -> Result<Self, ConfigError> {
        let user_agent = UserAgent::from_setting(session.user_agent.as_deref()).header_value();

        let jar = Arc::new(Jar::default());
        if let Some(domain) = cookie_domain(site_url) {
            for (name, value) in &session.cookies {
                jar.add_cookie_str(
                    &format!("{}={}; Domain={}; Path=/", name, value, domain),
                    site_url,
                );
            }
        }

        let client = Client::builder()
            .user_agent(&user_agent)
            .default_headers(build_headers(session)?)
            .cookie_provider(jar)
            .timeout(session.timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Make a GET request. Non-2xx statuses are returned as errors.
    pub async fn get(
        &self,
        url: &Url,
        timeout: Option<Duration>,
    ) -> Result<Response, SourceError> {
        self.rate_limiter.acquire().await;

        let mut request = self.client.get(url.clone());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("GET {} -> {}", url, status.as_u16());

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiter.report_rate_limit(url.as_str()).await;
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &Url) -> Result<String, SourceError> {
        Ok(self.get(url, None).await?.text().await?)
    }

    /// Get raw bytes, optionally with a shorter timeout than the session's.
    pub async fn get_bytes(
        &self,
        url: &Url,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SourceError> {
        let response = self.get(url, timeout).await?;
        if let Some(content_type) = response.headers().get(reqwest::header::CONTENT_TYPE) {
            debug!("{} is {:?}", url, content_type);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Get and deserialize a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, SourceError> {
        let text = self.get_text(url).await?;
        parse_json(&text, url)
    }
}

/// Deserialize JSON, telling malformed payloads apart from unexpected shapes.
pub fn parse_json<T: DeserializeOwned>(text: &str, url: &Url) -> Result<T, SourceError> {
    serde_json::from_str(text).map_err(|e| match e.classify() {
        serde_json::error::Category::Data => {
            SourceError::JsonSchema(format!("{}. URL: {}", e, url))
        }
        _ => SourceError::Json(e),
    })
}

fn build_headers(session: &SessionSettings) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &session.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                field: "session.headers",
                reason: format!("{}: {}", name, e),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
            field: "session.headers",
            reason: format!("{}: {}", name, e),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Cookie domain covering the site and its API subdomains.
fn cookie_domain(url: &Url) -> Option<&str> {
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host))
}
