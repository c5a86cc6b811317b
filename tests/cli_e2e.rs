//! End-to-end CLI tests for the anime-downloader binary.

#![allow(deprecated)]

mod support;
use support::socket_guard::start_mock_server_or_skip;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PAGE: &str = r#"
    <div class="iepcon"><div class="cona">Mushishi</div><div class="iepst2">3</div></div>
"#;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("anime-downloader").unwrap();
    cmd.env_remove("ANIME_DL_BASE_URL").env_remove("RUST_LOG");
    cmd
}

async fn mount_site(server: &MockServer, media_status: u16) {
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/watch.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<a class='an' href='{}/media/ep.mp4'>Download</a>",
            server.uri()
        )))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/ep.mp4"))
        .respond_with(ResponseTemplate::new(media_status).set_body_bytes(b"EPISODE".to_vec()))
        .mount(server)
        .await;
}

#[test]
fn test_help_documents_proxy_variables() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("HTTP_PROXY"))
        .stdout(predicate::str::contains("--episodes"));
}

#[test]
fn test_version_exits_zero() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_bad_selection_is_a_config_error() {
    cmd()
        .args(["-d", "-e", "7-x", "Mushishi"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("7-x"));
}

#[test]
fn test_bad_naming_scheme_is_a_config_error() {
    cmd()
        .args(["-d", "-n", "{title}", "Mushishi"])
        .assert()
        .code(3);
}

#[test]
fn test_missing_batch_spec_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    cmd()
        .arg("-c")
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_invalid_batch_entry_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let spec = dir.path().join("batch.json");
    std::fs::write(
        &spec,
        r#"[{"name": "Mushishi", "dest_dir": "/tmp", "episodes": "latest-x"}]"#,
    )
    .unwrap();

    cmd().arg("-c").arg(&spec).assert().code(3);
}

#[test]
fn test_no_anime_name_is_a_config_error() {
    cmd().arg("-d").assert().code(3);
}

#[test]
fn test_page_test_prints_decoded_url() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("watch.html");
    std::fs::write(
        &page,
        "<html><a class='an' href='http://cdn.example/Mushishi-1.mp4'>dl</a></html>",
    )
    .unwrap();

    cmd()
        .arg("--test")
        .arg(&page)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://cdn.example/Mushishi-1.mp4"));
}

#[test]
fn test_page_test_undecodable_page_exits_two() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("watch.html");
    std::fs::write(&page, "<html>nothing here</html>").unwrap();

    cmd().arg("--test").arg(&page).assert().code(2);
}

#[tokio::test]
async fn test_search_prints_names_and_counts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .and(query_param("q", "Mushi shi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    cmd()
        .args(["--base-url", &server.uri(), "Mushi", "shi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mushishi\n  - Episodes: 3"));
}

#[tokio::test]
async fn test_download_writes_selected_episodes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_site(&server, 200).await;
    let dir = TempDir::new().unwrap();

    cmd()
        .args(["-q", "-d", "-e", "latest-2", "--base-url", &server.uri(), "-D"])
        .arg(dir.path())
        .arg("Mushishi")
        .assert()
        .success();

    assert!(!dir.path().join("Mushishi - 001.mp4").exists());
    assert_eq!(
        std::fs::read(dir.path().join("Mushishi - 002.mp4")).unwrap(),
        b"EPISODE"
    );
    assert!(dir.path().join("Mushishi - 003.mp4").exists());
}

#[tokio::test]
async fn test_download_of_unknown_anime_exits_one() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    cmd()
        .args(["-d", "--base-url", &server.uri(), "-D"])
        .arg(dir.path())
        .arg("Naruto")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[tokio::test]
async fn test_failed_episode_exits_four_and_stops_the_anime() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_site(&server, 500).await;
    let dir = TempDir::new().unwrap();

    cmd()
        .args(["-q", "-d", "--retry-waits", "0", "--base-url", &server.uri(), "-D"])
        .arg(dir.path())
        .arg("Mushishi")
        .assert()
        .code(4);

    let watch_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/watch.php")
        .count();
    assert_eq!(watch_requests, 1, "later episodes must not be requested");
}

#[tokio::test]
async fn test_batch_spec_downloads_each_record() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_site(&server, 200).await;
    let dir = TempDir::new().unwrap();
    let spec = dir.path().join("batch.json");
    let dest = dir.path().join("out");
    std::fs::write(
        &spec,
        format!(
            r#"[{{"name": "Mushishi", "dest_dir": "{}", "episodes": "1",
                 "naming_scheme": "{{name}}_{{episode}}"}}]"#,
            dest.display()
        ),
    )
    .unwrap();

    cmd()
        .args(["-q", "--base-url", &server.uri(), "-c"])
        .arg(&spec)
        .assert()
        .success();

    assert!(dest.join("Mushishi_1.mp4").exists());
}
