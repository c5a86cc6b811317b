//! Integration tests for anime lookup against a mock site.

mod support;
use support::socket_guard::start_mock_server_or_skip;

use anime_downloader_core::catalog::{AnimeCatalog, AnimeInfo, CatalogError};
use anime_downloader_core::http_client::{HttpTimeouts, build_http_client};
use anime_downloader_core::resolver::{BROWSER_USER_AGENT, ResolveError, SiteConfig};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PAGE: &str = r#"
    <html><body>
      <div class="iepcon">
        <a href="i.php?a=Mushishi"><div class="cona">Mushishi</div></a>
        <div class="iepst2">26</div>
      </div>
      <div class="iepcon">
        <a href="i.php?a=Mushishi%20Zoku%20Shou"><div class="cona">Mushishi Zoku Shou</div></a>
        <div class="iepst2r">10</div>
      </div>
    </body></html>
"#;

fn catalog_for(server: &MockServer) -> AnimeCatalog {
    let client = build_http_client(BROWSER_USER_AGENT, HttpTimeouts::from_secs(5, 5)).unwrap();
    AnimeCatalog::with_client(client, SiteConfig::with_base_url(server.uri()))
}

async fn serve_search(server: &MockServer, query: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_lists_every_card() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve_search(&server, "mushi shi", SEARCH_PAGE).await;

    let results = catalog_for(&server).search("mushi shi").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].name, "Mushishi Zoku Shou");
    assert_eq!(results[1].episodes, 10);
}

#[tokio::test]
async fn test_info_picks_exact_name_among_results() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve_search(&server, "MUSHISHI", SEARCH_PAGE).await;

    let info = catalog_for(&server).info("MUSHISHI").await.unwrap();

    assert_eq!(
        info,
        AnimeInfo {
            name: "Mushishi".to_string(),
            episodes: 26
        }
    );
}

#[tokio::test]
async fn test_info_not_found_suggests_close_names() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    serve_search(&server, "Mushishy", SEARCH_PAGE).await;

    let err = catalog_for(&server).info("Mushishy").await.unwrap_err();

    match err {
        CatalogError::NotFound { query, suggestions } => {
            assert_eq!(query, "Mushishy");
            assert_eq!(suggestions.first().map(String::as_str), Some("Mushishi"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_info_strict_reads_episode_count() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/i.php"))
        .and(query_param("a", "Mushishi Zoku Shou"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="textd">Episodes:</div><div class="textc">10</div>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let info = catalog_for(&server)
        .info_strict("Mushishi Zoku Shou")
        .await
        .unwrap();

    assert_eq!(info.episodes, 10);
}

#[tokio::test]
async fn test_server_error_surfaces_as_http_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = catalog_for(&server).search("Mushishi").await.unwrap_err();

    assert!(
        matches!(
            err,
            CatalogError::Http(ResolveError::HttpStatus { status: 502, .. })
        ),
        "unexpected error: {err:?}"
    );
}
