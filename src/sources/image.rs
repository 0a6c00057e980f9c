//! Best-effort image downloads.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};
use url::Url;

use crate::http_client::HttpClient;
use crate::models::LoadedImage;

/// Downloads images, turning every failure into an absent image.
#[derive(Clone)]
pub struct ImageFetcher {
    client: HttpClient,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Fetch one image. Failures are logged and yield `None`.
    pub async fn fetch(&self, url: Url) -> Option<LoadedImage> {
        match self.client.get_bytes(&url, Some(self.timeout)).await {
            Ok(data) => {
                debug!("Loaded image {} ({} bytes)", url, data.len());
                Some(LoadedImage::new(url, data))
            }
            Err(e) => {
                warn!("Failed to load image {}: {}", url, e);
                None
            }
        }
    }

    /// Fetch images concurrently, keeping the successful ones in input order.
    pub async fn fetch_all(&self, urls: Vec<Url>) -> Vec<LoadedImage> {
        let total = urls.len();
        let images: Vec<LoadedImage> = join_all(urls.into_iter().map(|url| self.fetch(url)))
            .await
            .into_iter()
            .flatten()
            .collect();
        if images.len() < total {
            debug!("Loaded {} of {} images", images.len(), total);
        }
        images
    }
}
