//! Command-line interface.
//!
//! Parses arguments, assembles [`Settings`] and drives one acquisition run:
//! resolve the site, read the main page, trim, then download every chapter
//! into the selected saver.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use console::style;
use tokio::sync::mpsc;
use tracing::info;
use url::Url;

use crate::config::{Overrides, Settings};
use crate::models::SaverContext;
use crate::rate_limiter::RateLimiter;
use crate::savers::{run_scoped, SaverKind};
use crate::services::ChunkedScheduler;
use crate::sources::SiteResolver;
use crate::trim::{interactive_bounds, trim, FzfPicker, TrimBounds};
use crate::utils::prepare_working_directory;

use progress::spawn_progress;

#[derive(Parser, Debug)]
#[command(name = "ranobe")]
#[command(about = "Download a web novel from a ranobe site into an EPUB or plain files")]
#[command(version)]
pub struct Cli {
    /// Book page URL
    pub url: Url,

    /// Chapters downloaded concurrently per batch
    #[arg(short, long, env = "RANOBE_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// First chapter to download (1-based position)
    #[arg(short, long, env = "RANOBE_FROM")]
    from: Option<usize>,

    /// Last chapter to download (1-based position, inclusive)
    #[arg(short, long, env = "RANOBE_TO")]
    to: Option<usize>,

    /// Choose the first and last chapter with fzf
    #[arg(short, long, conflicts_with_all = ["from", "to"])]
    interactive: bool,

    /// Output directory (created if missing)
    #[arg(short, long, env = "RANOBE_WORKING_DIRECTORY")]
    working_directory: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, env = "RANOBE_SAVER")]
    saver: Option<SaverKind>,

    /// Requests allowed per period
    #[arg(short = 'r', long, env = "RANOBE_MAX_RATE")]
    max_rate: Option<u32>,

    /// Rate limit period in seconds
    #[arg(short = 'p', long, env = "RANOBE_PERIOD_TIME")]
    period_time: Option<f64>,

    /// Request timeout in seconds
    #[arg(long, env = "RANOBE_TIMEOUT")]
    timeout: Option<f64>,

    /// User agent: a literal string, or "impersonate" for a random browser
    #[arg(long, env = "RANOBE_USER_AGENT")]
    user_agent: Option<String>,

    /// TOML config file
    #[arg(long, env = "RANOBE_CONFIG")]
    config: Option<PathBuf>,

    /// Book language written to the EPUB metadata
    #[arg(long, env = "RANOBE_LANGUAGE")]
    language: Option<String>,

    /// Book author written to the EPUB metadata
    #[arg(long, env = "RANOBE_AUTHOR")]
    author: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            working_directory: self.working_directory.clone(),
            chunk_size: self.chunk_size,
            saver: self.saver,
            language: self.language.clone(),
            author: self.author.clone(),
            max_rate: self.max_rate,
            period_secs: self.period_time,
            timeout_secs: self.timeout,
            user_agent: self.user_agent.clone(),
            no_progress: self.no_progress,
        }
    }
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .merge(cli.overrides())
        .context("Invalid configuration")?;

    acquire(&cli, settings).await
}

async fn acquire(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    prepare_working_directory(&settings.working_directory)?;

    let rate_limiter = RateLimiter::with_config(settings.limiter.to_config());
    let resolver = SiteResolver::new(settings.session.clone(), rate_limiter.clone());
    let loader = resolver.resolve(&cli.url)?;

    println!("{} Loading {}", style("→").cyan(), cli.url);
    let book = loader
        .load()
        .await
        .with_context(|| format!("Failed to load {}", cli.url))?;
    println!(
        "{} {} ({} chapters, {} covers)",
        style("✓").green(),
        style(&book.title).bold(),
        book.chapters.len(),
        book.covers.len()
    );

    let bounds = if cli.interactive {
        let listed = book.chapters.clone();
        tokio::task::spawn_blocking(move || interactive_bounds(&listed, &FzfPicker))
            .await
            .context("Chapter picker failed")??
    } else {
        TrimBounds::new(cli.from, cli.to)
    };
    let chapters = trim(book.chapters, bounds);
    if chapters.is_empty() {
        println!("{} Nothing to download", style("!").yellow());
        return Ok(());
    }

    let context = SaverContext::new(book.title.clone(), book.covers)
        .with_language(settings.language.clone())
        .with_author(settings.author.clone());
    let saver = settings.saver.build(context, &settings.working_directory);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let progress = spawn_progress(chapters.len(), settings.show_progress, event_rx);
    let scheduler = ChunkedScheduler::new(settings.chunk_size)?.with_events(event_tx);

    println!(
        "{} Downloading {} chapters into {} ({})",
        style("→").cyan(),
        chapters.len(),
        settings.working_directory.display(),
        saver.name()
    );

    let chapter_loader = loader.chapter_loader();
    let result = run_scoped(&*saver, || {
        scheduler.run(chapters, chapter_loader, Arc::clone(&saver))
    })
    .await;

    // closes the event channel
    drop(scheduler);
    if let Err(e) = progress.await {
        tracing::warn!("Progress task failed: {}", e);
    }

    let stats = rate_limiter.stats().await;
    info!(
        "Rate limiter granted {} requests, {} waits",
        stats.granted, stats.waits
    );

    let summary = result.context("Download aborted")?;
    println!(
        "{} Saved {} chapters of {}",
        style("✓").green(),
        summary.saved,
        book.title
    );
    if summary.retries > 0 {
        println!("  {} {} retried attempts", style("→").dim(), summary.retries);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "ranobe",
            "https://tl.rulate.ru/book/1",
            "-c",
            "10",
            "-f",
            "2",
            "-t",
            "5",
            "-s",
            "files",
            "-r",
            "5",
            "-p",
            "2.5",
            "--no-progress",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.chunk_size, Some(10));
        assert_eq!(overrides.saver, Some(SaverKind::Files));
        assert_eq!(overrides.max_rate, Some(5));
        assert_eq!(overrides.period_secs, Some(2.5));
        assert!(overrides.no_progress);
        assert_eq!((cli.from, cli.to), (Some(2), Some(5)));
    }

    #[test]
    fn test_defaults_come_from_settings() {
        let cli = Cli::try_parse_from(["ranobe", "https://ranobes.net/novels/1-book.html"]).unwrap();
        let settings = Settings::default().merge(cli.overrides()).unwrap();
        assert_eq!(settings.chunk_size, 40);
        assert_eq!(settings.saver, SaverKind::Epub);
        assert_eq!(settings.limiter.max_rate, 20);
        assert!(settings.show_progress);
    }

    #[test]
    fn test_interactive_conflicts_with_bounds() {
        let result = Cli::try_parse_from(["ranobe", "https://ifreedom.su/ranobe/x/", "-i", "-f", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(Cli::try_parse_from(["ranobe", "not a url"]).is_err());
    }
}
