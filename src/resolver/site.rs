//! Immutable description of the upstream site.
//!
//! Every URL template, the cipher key and the rate-limit marker phrases live
//! here so tests can point a resolver at a mock server with
//! [`SiteConfig::with_base_url`].

use url::Url;

/// Default upstream origin.
pub const DEFAULT_BASE_URL: &str = "http://animeheaven.eu";

/// Key of the stream cipher protecting download links.
pub const DEFAULT_CIPHER_KEY: &str = "kert";

/// Phrase the site shows instead of the watch page when throttling.
pub const DEFAULT_RATE_LIMIT_MARKER: &str = "abuse protection";

/// The site rejects non-browser agents on some endpoints.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/68.0.3440.106 Safari/537.36";

/// Site endpoints, cipher parameters and request decorations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Origin all paths are joined onto.
    pub base_url: String,
    /// Anime info page, queried with `a=<name>`.
    pub info_path: String,
    /// Search page, queried with `q=<query>`.
    pub search_path: String,
    /// Episode watch page, queried with `a=<name>&e=<episode>`.
    pub watch_path: String,
    /// Key for decrypting cipher links.
    pub cipher_key: String,
    /// Case-insensitive phrases marking a throttled response body.
    pub rate_limit_markers: Vec<String>,
    /// Cookies sent with watch page requests to suppress pop-up interstitials.
    pub watch_cookies: Vec<(String, String)>,
    /// User-Agent for every request.
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            info_path: "/i.php".to_string(),
            search_path: "/search.php".to_string(),
            watch_path: "/watch.php".to_string(),
            cipher_key: DEFAULT_CIPHER_KEY.to_string(),
            rate_limit_markers: vec![DEFAULT_RATE_LIMIT_MARKER.to_string()],
            watch_cookies: vec![
                ("popfired".to_string(), "2".to_string()),
                ("_popfired".to_string(), "1".to_string()),
                ("pp".to_string(), "c".to_string()),
            ],
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl SiteConfig {
    /// Returns the default configuration re-rooted at `base_url`.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds the watch page URL for one episode.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the base URL is malformed.
    pub fn watch_url(&self, anime: &str, episode: u32) -> Result<Url, url::ParseError> {
        let episode = episode.to_string();
        self.endpoint(&self.watch_path, &[("a", anime), ("e", episode.as_str())])
    }

    /// Builds the search URL for a free-text query.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the base URL is malformed.
    pub fn search_url(&self, query: &str) -> Result<Url, url::ParseError> {
        self.endpoint(&self.search_path, &[("q", query)])
    }

    /// Builds the info page URL for an exact anime name.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the base URL is malformed.
    pub fn info_url(&self, anime: &str) -> Result<Url, url::ParseError> {
        self.endpoint(&self.info_path, &[("a", anime)])
    }

    /// Returns the `Cookie` header value for watch page requests.
    #[must_use]
    pub fn watch_cookie_header(&self) -> String {
        self.watch_cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Returns true if `body` carries one of the rate-limit marker phrases.
    #[must_use]
    pub fn is_rate_limited(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        self.rate_limit_markers
            .iter()
            .any(|marker| lowered.contains(&marker.to_lowercase()))
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, url::ParseError> {
        let base = Url::parse(&self.base_url)?;
        let mut url = base.join(path)?;
        url.query_pairs_mut().clear().extend_pairs(params);
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url_encodes_name_and_episode() {
        let site = SiteConfig::default();
        let url = site.watch_url("Steins;Gate 0", 12).unwrap();
        assert_eq!(url.path(), "/watch.php");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "Steins;Gate 0".to_string()),
                ("e".to_string(), "12".to_string()),
            ]
        );
    }

    #[test]
    fn test_with_base_url_reroots_endpoints() {
        let site = SiteConfig::with_base_url("http://127.0.0.1:4000");
        let url = site.search_url("mushi").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4000/search.php?q=mushi");
        assert_eq!(site.cipher_key, DEFAULT_CIPHER_KEY);
    }

    #[test]
    fn test_info_url() {
        let site = SiteConfig::default();
        let url = site.info_url("Mushishi").unwrap();
        assert_eq!(url.as_str(), "http://animeheaven.eu/i.php?a=Mushishi");
    }

    #[test]
    fn test_watch_cookie_header() {
        assert_eq!(
            SiteConfig::default().watch_cookie_header(),
            "popfired=2; _popfired=1; pp=c"
        );
    }

    #[test]
    fn test_rate_limit_marker_is_case_insensitive() {
        let site = SiteConfig::default();
        assert!(site.is_rate_limited("<h1>Abuse Protection</h1> please wait"));
        assert!(!site.is_rate_limited("<h1>Episode 3</h1>"));
    }

    #[test]
    fn test_malformed_base_url_is_an_error() {
        let site = SiteConfig::with_base_url("not a url");
        assert!(site.watch_url("x", 1).is_err());
    }
}
