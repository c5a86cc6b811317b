//! HTTP resolver for the upstream site's watch pages.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{COOKIE, REFERER};
use tracing::{debug, warn};

use crate::http_client::{HttpTimeouts, build_http_client};

use super::{EpisodeResolver, ResolveError, ResolveOutcome, SiteConfig, decode_watch_page};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Fetches a watch page and runs it through [`decode_watch_page`].
pub struct AnimeHeavenResolver {
    client: Client,
    site: SiteConfig,
}

impl AnimeHeavenResolver {
    /// Creates a resolver with page timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if HTTP client construction fails.
    pub fn new(site: SiteConfig) -> Result<Self, ResolveError> {
        Self::with_timeouts(site, HttpTimeouts::page())
    }

    /// Creates a resolver with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Client`] if HTTP client construction fails.
    #[tracing::instrument(skip_all, fields(base_url = %site.base_url))]
    pub fn with_timeouts(site: SiteConfig, timeouts: HttpTimeouts) -> Result<Self, ResolveError> {
        let client = build_http_client(&site.user_agent, timeouts)
            .map_err(|source| ResolveError::Client { source })?;
        Ok(Self { client, site })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client, site: SiteConfig) -> Self {
        Self { client, site }
    }

    /// The site this resolver talks to.
    #[must_use]
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }
}

impl std::fmt::Debug for AnimeHeavenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimeHeavenResolver")
            .field("base_url", &self.site.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EpisodeResolver for AnimeHeavenResolver {
    fn name(&self) -> &'static str {
        "animeheaven"
    }

    #[tracing::instrument(skip(self), fields(resolver = "animeheaven"))]
    async fn resolve(&self, anime: &str, episode: u32) -> Result<ResolveOutcome, ResolveError> {
        let url = self
            .site
            .watch_url(anime, episode)
            .map_err(|source| ResolveError::invalid_site_url(&self.site.base_url, source))?;

        debug!(watch_url = %url, "fetching watch page");

        let response = self
            .client
            .get(url.clone())
            .header(COOKIE, self.site.watch_cookie_header())
            .header(REFERER, self.site.base_url.as_str())
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if status.as_u16() == HTTP_TOO_MANY_REQUESTS {
            warn!(status = status.as_u16(), "watch page throttled");
            return Ok(ResolveOutcome::RateLimited);
        }
        if !status.is_success() {
            debug!(status = status.as_u16(), "watch page returned error status");
            return Err(ResolveError::http_status(url.as_str(), status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(url.as_str(), e))?;

        let outcome = decode_watch_page(&body, &self.site);
        match &outcome {
            ResolveOutcome::Resolved(resolved) => {
                debug!(media_url = %resolved.url, kind = ?resolved.kind, "resolved media URL");
            }
            ResolveOutcome::RateLimited => warn!("abuse protection page received"),
            ResolveOutcome::ParseFailed(failure) => {
                warn!(reason = %failure, body_len = body.len(), "watch page did not decode");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::{LinkKind, ParseFailure};
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const RAW_PAGE: &str = "<html><a class='an' href='http://cdn.example/ep3.mp4'>dl</a></html>";

    fn resolver_for(uri: String) -> AnimeHeavenResolver {
        AnimeHeavenResolver::with_timeouts(
            SiteConfig::with_base_url(uri),
            HttpTimeouts::from_secs(5, 5),
        )
        .unwrap()
    }

    #[test]
    fn test_resolver_name() {
        let resolver = AnimeHeavenResolver::new(SiteConfig::default()).unwrap();
        assert_eq!(resolver.name(), "animeheaven");
    }

    #[tokio::test]
    async fn test_resolve_sends_query_and_cookies() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/watch.php"))
            .and(query_param("a", "Mushishi"))
            .and(query_param("e", "3"))
            .and(header("cookie", "popfired=2; _popfired=1; pp=c"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RAW_PAGE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let resolver = resolver_for(mock_server.uri());
        let outcome = resolver.resolve("Mushishi", 3).await.unwrap();
        match outcome {
            ResolveOutcome::Resolved(resolved) => {
                assert_eq!(resolved.url, "http://cdn.example/ep3.mp4");
                assert_eq!(resolved.kind, LinkKind::Raw);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_marker_page_is_rate_limited() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/watch.php"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<h2>Abuse protection</h2> try again later"),
            )
            .mount(&mock_server)
            .await;

        let outcome = resolver_for(mock_server.uri())
            .resolve("Mushishi", 1)
            .await
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_resolve_429_is_rate_limited() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/watch.php"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let outcome = resolver_for(mock_server.uri())
            .resolve("Mushishi", 1)
            .await
            .unwrap();
        assert_eq!(outcome, ResolveOutcome::RateLimited);
    }

    #[tokio::test]
    async fn test_resolve_server_error_is_transport_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/watch.php"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let err = resolver_for(mock_server.uri())
            .resolve("Mushishi", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_resolve_unknown_markup_is_parse_failed() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };

        Mock::given(method("GET"))
            .and(path("/watch.php"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>redesigned</html>"))
            .mount(&mock_server)
            .await;

        let outcome = resolver_for(mock_server.uri())
            .resolve("Mushishi", 1)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::ParseFailed(ParseFailure::AnchorNotFound)
        );
    }

    #[tokio::test]
    async fn test_resolve_bad_base_url() {
        let resolver = AnimeHeavenResolver::new(SiteConfig::with_base_url("::nope::")).unwrap();
        let err = resolver.resolve("x", 1).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidSiteUrl { .. }));
    }
}
