//! Episode link resolution.
//!
//! The watch page of an episode hides the real media URL behind a chain of
//! reversible transformations. This module fetches that page and reduces it
//! to a fetchable URL, or reports that the site is throttling us, or that the
//! page no longer matches any known shape.
//!
//! # Architecture
//!
//! - [`EpisodeResolver`] - Async trait the orchestrator calls once per attempt
//! - [`AnimeHeavenResolver`] - HTTP implementation for the upstream site
//! - [`decode_watch_page`] - Pure decode pipeline over a captured page body
//! - [`SiteConfig`] - Immutable site endpoints, cipher key and markers
//! - [`Rc4`] - The legacy stream cipher protecting links
//!
//! # Example
//!
//! ```no_run
//! use anime_downloader_core::resolver::{AnimeHeavenResolver, EpisodeResolver, SiteConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = AnimeHeavenResolver::new(SiteConfig::default())?;
//! let outcome = resolver.resolve("Mushishi", 3).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod animeheaven;
mod decode;
mod error;
mod rc4;
mod site;

pub use animeheaven::AnimeHeavenResolver;
pub use decode::{CipherLink, LinkScheme, decode_watch_page, detect_link_scheme, unescape_js};
pub use error::{ParseFailure, ResolveError};
pub use rc4::{Rc4, rc4_apply};
pub use site::{
    BROWSER_USER_AGENT, DEFAULT_BASE_URL, DEFAULT_CIPHER_KEY, DEFAULT_RATE_LIMIT_MARKER,
    SiteConfig,
};

use async_trait::async_trait;

/// Which decode branch produced a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Escaped, optionally substituted, base64 encoded RC4 ciphertext.
    Cipher,
    /// Plain URL embedded directly in the anchor.
    Raw,
}

/// A media URL recovered from a watch page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// Absolute http(s) URL of the media file.
    pub url: String,
    /// The branch that produced it.
    pub kind: LinkKind,
}

impl ResolvedUrl {
    /// Creates a resolved URL.
    pub fn new(url: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

/// Result of resolving one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The media URL was recovered.
    Resolved(ResolvedUrl),
    /// The site answered with its abuse-protection page. Retry after backoff.
    RateLimited,
    /// The page does not match any known obfuscation shape. Not retryable.
    ParseFailed(ParseFailure),
}

/// Turns `(anime, episode)` into a [`ResolveOutcome`].
///
/// Implementations own nothing beyond a single call's inputs and outputs, so
/// one instance is shared by every download unit.
///
/// This trait uses `async_trait` so the orchestrator can hold an
/// `Arc<dyn EpisodeResolver>` and tests can substitute scripted resolvers.
#[async_trait]
pub trait EpisodeResolver: Send + Sync {
    /// Returns the resolver's name for logging.
    fn name(&self) -> &str;

    /// Resolves one episode.
    ///
    /// Transport failures are `Err`; a fetched page always becomes an
    /// outcome.
    async fn resolve(&self, anime: &str, episode: u32) -> Result<ResolveOutcome, ResolveError>;
}
