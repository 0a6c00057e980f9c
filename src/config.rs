//! Configuration for a ranobe run.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! command-line flags (which clap may fill from `RANOBE_*` variables).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rate_limiter::{RateLimitConfig, DEFAULT_MAX_RATE};
use crate::savers::SaverKind;

/// Browser user agent sent by default.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:144.0) Gecko/20100101 Firefox/144.0";

/// Lets adult-marked books on tl.rulate.ru be read without logging in.
pub const MATURE_COOKIE: &str = "c3a2ed4b199a1a15f5a5483504c7a75a7030dc4bi%3A1%3B";

pub const DEFAULT_CHUNK_SIZE: usize = 40;

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
    ])
}

fn default_cookies() -> BTreeMap<String, String> {
    BTreeMap::from([("mature".to_string(), MATURE_COOKIE.to_string())])
}

/// HTTP session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Whole-request timeout for pages and API calls, in seconds.
    pub timeout_secs: f64,
    /// Timeout for a single image download, in seconds.
    pub image_timeout_secs: f64,
    /// `None` for the built-in browser agent, `"impersonate"` for a random one.
    pub user_agent: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Cookies sent to the book's site and its subdomains.
    pub cookies: BTreeMap<String, String>,
}

impl SessionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.image_timeout_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15.0,
            image_timeout_secs: 3.0,
            user_agent: None,
            headers: default_headers(),
            cookies: default_cookies(),
        }
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterSettings {
    pub max_rate: u32,
    pub period_secs: f64,
}

impl LimiterSettings {
    pub fn to_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_rate: self.max_rate,
            time_period: Duration::from_secs_f64(self.period_secs),
        }
    }
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            max_rate: DEFAULT_MAX_RATE,
            period_secs: 10.0,
        }
    }
}

/// Settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub working_directory: PathBuf,
    pub chunk_size: usize,
    pub saver: SaverKind,
    pub language: String,
    pub author: String,
    pub show_progress: bool,
    pub limiter: LimiterSettings,
    pub session: SessionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            working_directory: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            saver: SaverKind::default(),
            language: crate::models::DEFAULT_LANGUAGE.to_string(),
            author: crate::models::DEFAULT_AUTHOR.to_string(),
            show_progress: true,
            limiter: LimiterSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

/// Values given explicitly on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub working_directory: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub saver: Option<SaverKind>,
    pub language: Option<String>,
    pub author: Option<String>,
    pub max_rate: Option<u32>,
    pub period_secs: Option<f64>,
    pub timeout_secs: Option<f64>,
    pub user_agent: Option<String>,
    pub no_progress: bool,
}

impl Settings {
    /// Load settings from a TOML file, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply command-line values on top of these settings and validate.
    pub fn merge(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if let Some(dir) = overrides.working_directory {
            self.working_directory = dir;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(saver) = overrides.saver {
            self.saver = saver;
        }
        if let Some(language) = overrides.language {
            self.language = language;
        }
        if let Some(author) = overrides.author {
            self.author = author;
        }
        if let Some(max_rate) = overrides.max_rate {
            self.limiter.max_rate = max_rate;
        }
        if let Some(period) = overrides.period_secs {
            self.limiter.period_secs = period;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.session.timeout_secs = timeout;
        }
        if overrides.user_agent.is_some() {
            self.session.user_agent = overrides.user_agent;
        }
        if overrides.no_progress {
            self.show_progress = false;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.limiter.max_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_rate",
                reason: "must be at least 1".to_string(),
            });
        }
        positive("period_time", self.limiter.period_secs)?;
        positive("timeout", self.session.timeout_secs)?;
        positive("image_timeout", self.session.image_timeout_secs)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be a positive number of seconds, got {}", value),
        })
    }
}
