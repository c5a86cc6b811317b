//! Anime lookup: search by free text and episode counts.
//!
//! The selector needs the total number of episodes before it can expand
//! `latest`-relative terms; this module gets it from the site's search and
//! info pages.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::http_client::{HttpTimeouts, build_http_client};
use crate::resolver::{ResolveError, SiteConfig};

/// Minimum similarity for a name to be offered as a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.5;

/// Maximum number of suggestions carried by [`CatalogError::NotFound`].
const MAX_SUGGESTIONS: usize = 3;

/// One anime as listed by the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeInfo {
    /// Exact name as the site spells it; watch URLs need this spelling.
    pub name: String,
    /// Number of released episodes.
    pub episodes: u32,
}

/// Errors from catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport failure fetching a catalog page.
    #[error(transparent)]
    Http(#[from] ResolveError),

    /// The page was fetched but did not have the expected structure.
    #[error("unexpected page structure at {url}: {reason}\n  Suggestion: the site layout may have changed")]
    Parse {
        /// The page URL.
        url: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// No anime matched the query.
    #[error("{}", not_found_message(.query, .suggestions))]
    NotFound {
        /// The name that was looked up.
        query: String,
        /// Closest names from the search results.
        suggestions: Vec<String>,
    },
}

fn not_found_message(query: &str, suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        format!("anime '{query}' not found")
    } else {
        format!(
            "anime '{query}' not found\n  Suggestion: did you mean {}?",
            suggestions
                .iter()
                .map(|s| format!("'{s}'"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl CatalogError {
    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(query: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::NotFound {
            query: query.into(),
            suggestions,
        }
    }
}

/// Client for the site's search and info pages.
pub struct AnimeCatalog {
    client: Client,
    site: SiteConfig,
}

impl std::fmt::Debug for AnimeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimeCatalog")
            .field("base_url", &self.site.base_url)
            .finish_non_exhaustive()
    }
}

impl AnimeCatalog {
    /// Creates a catalog client with page timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] if HTTP client construction fails.
    pub fn new(site: SiteConfig) -> Result<Self, CatalogError> {
        let client = build_http_client(&site.user_agent, HttpTimeouts::page())
            .map_err(|source| ResolveError::Client { source })?;
        Ok(Self { client, site })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client, site: SiteConfig) -> Self {
        Self { client, site }
    }

    /// Searches the site for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] on transport failure and
    /// [`CatalogError::Parse`] when a result card is malformed.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<AnimeInfo>, CatalogError> {
        let url = self
            .site
            .search_url(query)
            .map_err(|source| ResolveError::invalid_site_url(&self.site.base_url, source))?;
        let body = self.fetch_page(&url).await?;
        let results = parse_search_results(&body)
            .map_err(|reason| CatalogError::parse(url.as_str(), reason))?;
        debug!(count = results.len(), "search results parsed");
        Ok(results)
    }

    /// Reads the episode count from the info page of an exactly-named anime.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Http`] on transport failure and
    /// [`CatalogError::Parse`] when the page has no episode count.
    #[tracing::instrument(skip(self))]
    pub async fn info_strict(&self, name: &str) -> Result<AnimeInfo, CatalogError> {
        let url = self
            .site
            .info_url(name)
            .map_err(|source| ResolveError::invalid_site_url(&self.site.base_url, source))?;
        let body = self.fetch_page(&url).await?;
        let episodes = parse_info_episode_count(&body)
            .map_err(|reason| CatalogError::parse(url.as_str(), reason))?;
        Ok(AnimeInfo {
            name: name.to_string(),
            episodes,
        })
    }

    /// Looks `name` up through search.
    ///
    /// A single search result is taken as the answer; otherwise the result
    /// whose name matches case-insensitively wins.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] with the closest names when nothing
    /// matches, plus the errors of [`AnimeCatalog::search`].
    #[tracing::instrument(skip(self))]
    pub async fn info(&self, name: &str) -> Result<AnimeInfo, CatalogError> {
        let results = self.search(name).await?;
        match pick_match(name, &results) {
            Some(found) => {
                info!(name = %found.name, episodes = found.episodes, "anime found");
                Ok(found.clone())
            }
            None => {
                let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
                Err(CatalogError::not_found(
                    name,
                    closest_names(name, &names, MAX_SUGGESTIONS),
                ))
            }
        }
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::http_status(url.as_str(), status.as_u16()).into());
        }

        response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(url.as_str(), e).into())
    }
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{css}': {e}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn parse_count(text: &str) -> Result<u32, String> {
    text.parse::<u32>()
        .map_err(|_| format!("episode count '{text}' is not a number"))
}

/// Parses the result cards of a search page.
///
/// # Errors
///
/// Returns a description of the first malformed card.
pub fn parse_search_results(html: &str) -> Result<Vec<AnimeInfo>, String> {
    let document = Html::parse_document(html);
    let card_selector = selector(".iepcon")?;
    let name_selector = selector(".cona")?;
    let count_selector = selector(".iepst2, .iepst2r")?;

    document
        .select(&card_selector)
        .map(|card| {
            let name = card
                .select(&name_selector)
                .next()
                .map(element_text)
                .ok_or_else(|| "result card without a name".to_string())?;
            let count = card
                .select(&count_selector)
                .next()
                .map(element_text)
                .ok_or_else(|| format!("result '{name}' without an episode count"))?;
            Ok(AnimeInfo {
                episodes: parse_count(&count)?,
                name,
            })
        })
        .collect()
}

/// Reads the episode count from an info page.
///
/// The count is the element right after the `div.textd` labelled
/// `Episodes:`.
///
/// # Errors
///
/// Returns a description of what was missing.
pub fn parse_info_episode_count(html: &str) -> Result<u32, String> {
    let document = Html::parse_document(html);
    let label_selector = selector("div.textd")?;

    let label = document
        .select(&label_selector)
        .find(|div| element_text(*div) == "Episodes:")
        .ok_or_else(|| "no 'Episodes:' label".to_string())?;

    let value = label
        .next_siblings()
        .find_map(ElementRef::wrap)
        .map(element_text)
        .ok_or_else(|| "no value after 'Episodes:' label".to_string())?;

    parse_count(&value)
}

/// Picks the result for `query`: the only result, or a case-insensitive
/// name match.
#[must_use]
pub fn pick_match<'a>(query: &str, results: &'a [AnimeInfo]) -> Option<&'a AnimeInfo> {
    if let [only] = results {
        return Some(only);
    }
    let wanted = query.to_lowercase();
    results.iter().find(|r| r.name.to_lowercase() == wanted)
}

/// Returns up to `limit` candidate names most similar to `query`.
#[must_use]
pub fn closest_names(query: &str, candidates: &[&str], limit: usize) -> Vec<String> {
    let wanted = query.to_lowercase();
    let mut scored: Vec<(f64, &str)> = candidates
        .iter()
        .map(|name| (strsim::normalized_levenshtein(&wanted, &name.to_lowercase()), *name))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, name)| name.to_string())
        .collect()
}
