//! Image references and downloaded image data.

use url::Url;

/// An image referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Image {
    pub url: Url,
}

impl Image {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Percent-decoded last path segment of the URL, `image` when the
    /// path is empty.
    pub fn name(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned())
            .unwrap_or_else(|| "image".to_string())
    }

    /// Suffix of [`Image::name`] including the dot. Empty when there is
    /// none or when it holds anything but ASCII letters and digits.
    pub fn extension(&self) -> String {
        let name = self.name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && name[idx + 1..].bytes().all(|b| b.is_ascii_alphanumeric()) => {
                name[idx..].to_string()
            }
            _ => String::new(),
        }
    }
}

/// An image whose bytes were downloaded successfully.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub image: Image,
    pub data: Vec<u8>,
}

impl LoadedImage {
    pub fn new(url: Url, data: Vec<u8>) -> Self {
        Self {
            image: Image::new(url),
            data,
        }
    }

    pub fn url(&self) -> &Url {
        &self.image.url
    }

    pub fn name(&self) -> String {
        self.image.name()
    }

    pub fn extension(&self) -> String {
        self.image.extension()
    }

    /// Media type guessed from the file extension.
    pub fn media_type(&self) -> String {
        mime_guess::from_path(self.name())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
