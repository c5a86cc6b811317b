//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use anime_downloader_core::resolver::DEFAULT_BASE_URL;
use anime_downloader_core::{DEFAULT_NAMING_SCHEME, NamingScheme, RetryPolicy, Selection};
use clap::Parser;

const PROXY_EPILOG: &str = "\
The site limits how many episodes one IP address may fetch per day.
Requests honour HTTP_PROXY, HTTPS_PROXY and ALL_PROXY, so the limit can be
sidestepped by routing through a proxy, e.g.

    HTTP_PROXY=http://127.0.0.1:8118 anime-downloader -d Mushishi

Exit codes: 0 success, 1 anime not found, 2 link decoder outdated,
3 configuration error, 4 an episode failed, 130 cancelled.";

/// Search and download episodes from AnimeHeaven.
///
/// Without `--download` the given name is searched and each match is printed
/// with its episode count. Downloads are resumable: interrupted episodes pick
/// up where they stopped on the next run.
#[derive(Parser, Debug)]
#[command(name = "anime-downloader")]
#[command(author, version, about, after_help = PROXY_EPILOG)]
pub struct Args {
    /// Anime name (words are joined with spaces)
    #[arg(value_name = "ANIME")]
    pub anime: Vec<String>,

    /// Download the anime instead of only searching for it
    #[arg(short, long)]
    pub download: bool,

    /// Destination directory for downloaded episodes
    #[arg(short = 'D', long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,

    /// File name template over {name} and {episode}
    #[arg(short, long, value_name = "SCHEME", default_value = DEFAULT_NAMING_SCHEME)]
    pub naming_scheme: NamingScheme,

    /// Episodes to fetch, e.g. "1,2,7-9", "latest", "55-latest", "latest-5"
    #[arg(short, long, value_name = "SELECTION")]
    pub episodes: Option<Selection>,

    /// Batch spec: JSON array of {"name", "dest_dir", "episodes"?, "naming_scheme"?} (implies --download)
    #[arg(short, long, value_name = "FILE", conflicts_with = "anime")]
    pub config: Option<PathBuf>,

    /// Decode a saved watch page and print the media URL
    #[arg(long, value_name = "PAGE_FILE", conflicts_with_all = ["config", "download"])]
    pub test: Option<PathBuf>,

    /// Anime downloaded concurrently (1-16)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub jobs: u8,

    /// Comma-separated seconds to wait before each attempt
    #[arg(long, value_name = "SECS", default_value = "0,60,15,10,5")]
    pub retry_waits: RetryPolicy,

    /// Site root, for mirrors
    #[arg(long, value_name = "URL", env = "ANIME_DL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Read timeout for search, info and watch pages in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub page_timeout: u64,

    /// Read timeout for media streams in seconds
    #[arg(long, value_name = "SECS", default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub media_timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// The positional words as one anime name, or `None` when absent.
    #[must_use]
    pub fn anime_name(&self) -> Option<String> {
        let name = self
            .anime
            .iter()
            .map(|word| word.trim())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }

    /// Whether episodes should be downloaded rather than listed.
    #[must_use]
    pub fn wants_download(&self) -> bool {
        self.download || self.config.is_some()
    }

    /// Default log level: quiet wins over verbose.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
