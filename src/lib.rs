//! Anime Downloader Core Library
//!
//! This library acquires video episodes from a single streaming site that
//! hides its media URLs and throttles scripted access.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`selection`] - Episode selection expressions (`"1,2,7-9"`, `"latest-5"`)
//! - [`naming`] - File name templates over `{name}` and `{episode}`
//! - [`resolver`] - Watch page fetching and link deobfuscation
//! - [`download`] - Locked, resumable, retrying episode acquisition
//! - [`catalog`] - Anime search and episode counts
//! - [`batch`] - JSON batch spec loading
//! - [`http_client`] - Shared HTTP client policy

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod catalog;
pub mod download;
pub mod http_client;
pub mod naming;
pub mod resolver;
pub mod selection;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use batch::{AnimeJob, BatchError, load_batch, parse_batch};
pub use catalog::{AnimeCatalog, AnimeInfo, CatalogError};
pub use download::{
    AcquireError, DownloadError, DownloadObserver, DownloadState, EpisodeDownloader, EpisodeUnit,
    HttpClient, NoopObserver, RetryPolicy,
};
pub use naming::{DEFAULT_NAMING_SCHEME, NamingError, NamingScheme};
pub use resolver::{
    AnimeHeavenResolver, EpisodeResolver, ParseFailure, ResolveError, ResolveOutcome, ResolvedUrl,
    SiteConfig, decode_watch_page,
};
pub use selection::{RangeTerm, Selection, SelectionError};
