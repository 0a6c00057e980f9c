//! Which `User-Agent` a session sends.

use crate::config::USER_AGENT;

/// Browser strings rotated through when impersonating.
const BROWSERS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:144.0) Gecko/20100101 Firefox/144.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:144.0) Gecko/20100101 Firefox/144.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.6 Safari/605.1.15",
];

/// The `session.user_agent` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgent {
    /// Built-in desktop Firefox string
    Default,
    /// A browser string picked per session (`impersonate`)
    Impersonate,
    Custom(String),
}

impl UserAgent {
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => UserAgent::Default,
            Some(v) if v.eq_ignore_ascii_case("impersonate") => UserAgent::Impersonate,
            Some(v) => UserAgent::Custom(v.to_string()),
        }
    }

    /// Header value to send for this session.
    pub fn header_value(&self) -> String {
        match self {
            UserAgent::Default => USER_AGENT.to_string(),
            UserAgent::Impersonate => {
                let seed = chrono::Utc::now().timestamp_subsec_nanos() as usize;
                BROWSERS[seed % BROWSERS.len()].to_string()
            }
            UserAgent::Custom(value) => value.clone(),
        }
    }
}
