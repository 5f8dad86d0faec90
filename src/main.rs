use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quji_rss::config::Config;
use quji_rss::feed::{self, PageFetcher, RSS_CONTENT_TYPE};

/// Get the default config file path (~/.config/quji-rss/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("quji-rss")
        .join("config.toml"))
}

/// Write `content` to `path` via a temp file and rename, so a reader
/// polling the output never sees a half-written feed.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Randomized temp filename so concurrent runs don't collide
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write temporary file '{}'", temp_path.display())
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "quji-rss",
    about = "Republish a paginated article listing API as an RSS 2.0 feed"
)]
struct Args {
    /// Config file (defaults to ~/.config/quji-rss/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk every page and print the RSS document
    Generate {
        /// Write the feed to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Stop after N pages
        #[arg(long, value_name = "N", conflicts_with = "no_page_cap")]
        max_pages: Option<NonZeroU32>,

        /// Walk until the upstream returns an empty page, however long that takes
        #[arg(long)]
        no_page_cap: bool,

        /// Seconds to wait between pages
        #[arg(long, value_name = "SECS")]
        delay: Option<u64>,
    },
    /// Print one upstream page as raw JSON
    FetchPage {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn build_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match args.command {
        Command::Generate {
            output,
            max_pages,
            no_page_cap,
            delay,
        } => {
            if no_page_cap {
                config.max_pages = None;
            } else if max_pages.is_some() {
                config.max_pages = max_pages;
            }
            if let Some(secs) = delay {
                config.page_delay_secs = secs;
            }

            let client = build_client(&config)?;
            let xml = feed::generate_feed(&client, &config)
                .await
                .context("Feed generation failed")?;

            match output {
                Some(path) => {
                    write_atomic(&path, xml.as_bytes())?;
                    tracing::info!(path = %path.display(), content_type = RSS_CONTENT_TYPE, "Wrote feed");
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(xml.as_bytes())?;
                    stdout.write_all(b"\n")?;
                    stdout.flush()?;
                }
            }
        }
        Command::FetchPage { page } => {
            let client = build_client(&config)?;
            let fetcher = PageFetcher::new(client, &config)?;
            let value = fetcher
                .fetch_raw(page)
                .await
                .with_context(|| format!("Failed to fetch page {}", page))?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
