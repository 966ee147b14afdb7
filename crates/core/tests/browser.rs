//! Real-browser integration tests.
//!
//! These drive a local headless Chromium and are skipped by default:
//! run with `cargo test -p restock-rs -- --ignored`.

use std::net::SocketAddr;
use std::sync::Arc;

use restock::{BrowserError, BrowserOpts, BrowserSession, ProfileDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use url::Url;

// Served as UTF-8 bytes under a windows-1252 declaration: the engine decodes
// it to mojibake, and extraction is expected to recover the original text.
const STATUS_TEXT: &str = "\u{201c}In stock \u{e9}";

fn fixture_body() -> Vec<u8> {
    format!(
        "<!doctype html><html><head><title>fixture</title></head>\
         <body><div id=\"status\">{STATUS_TEXT}</div></body></html>"
    )
    .into_bytes()
}

fn http_response(status_line: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {status_line}\r\n\
         Content-Type: text/html; charset=windows-1252\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

async fn spawn_fixture_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let Ok(n) = stream.read(&mut buf).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let response = match path.as_str() {
                    "/ok" => http_response("200 OK", &fixture_body()),
                    _ => http_response("404 Not Found", b"<html><body>gone</body></html>"),
                };
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (addr, server)
}

fn headless_session() -> BrowserSession {
    let profile = Arc::new(ProfileDir::create().unwrap());
    BrowserSession::new(BrowserOpts::new().headless(true), profile)
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn start_twice_keeps_single_context() {
    let mut session = headless_session();

    session.start().await.unwrap();
    let baseline = session.open_pages().await.unwrap();

    session.new_tab(None).await.unwrap();
    assert_eq!(session.open_pages().await.unwrap(), baseline + 1);

    // Restart tears the old context (and its tab) down before relaunching.
    session.start().await.unwrap();
    assert_eq!(session.open_pages().await.unwrap(), baseline);
    assert!(session.active_tab().is_none());

    session.dispose().await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn extraction_before_navigation_is_not_ready() {
    let mut session = headless_session();
    session.start().await.unwrap();

    let tab = session.new_tab(None).await.unwrap();
    let err = tab.inner_text("#status").await.unwrap_err();
    assert!(matches!(err, BrowserError::NotReady));

    session.dispose().await;
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn recovers_utf8_from_misdeclared_charset() {
    let (addr, server) = spawn_fixture_server().await;
    let mut session = headless_session();
    session.start().await.unwrap();

    let url = Url::parse(&format!("http://{addr}/ok")).unwrap();
    let tab = session.new_tab(Some(&url)).await.unwrap();

    let meta = tab.charset_meta().expect("charset metadata");
    assert_eq!(meta.charset, "windows-1252");
    assert_eq!(meta.mime, "text/html");
    assert_eq!(meta.content_length, fixture_body().len() as u64);

    assert_eq!(tab.inner_text("#status").await.unwrap(), STATUS_TEXT);
    assert!(tab.inner_html("body").await.unwrap().contains(STATUS_TEXT));

    session.dispose().await;
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn http_error_status_fails_and_clears_meta() {
    let (addr, server) = spawn_fixture_server().await;
    let mut session = headless_session();
    session.start().await.unwrap();

    let ok = Url::parse(&format!("http://{addr}/ok")).unwrap();
    let missing = Url::parse(&format!("http://{addr}/missing")).unwrap();

    let tab = session.new_tab(Some(&ok)).await.unwrap();
    assert!(tab.charset_meta().is_some());

    let err = tab.goto(&missing).await.unwrap_err();
    match err {
        BrowserError::HttpStatus { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other}"),
    }
    // The failed navigation must not leave the previous success value behind.
    assert!(tab.charset_meta().is_none());
    assert!(matches!(
        tab.inner_text("#status").await.unwrap_err(),
        BrowserError::NotReady
    ));

    session.dispose().await;
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn missing_element_is_reported() {
    let (addr, server) = spawn_fixture_server().await;
    let mut session = headless_session();
    session.start().await.unwrap();

    let url = Url::parse(&format!("http://{addr}/ok")).unwrap();
    let tab = session.new_tab(Some(&url)).await.unwrap();

    let err = tab.inner_text("#does-not-exist").await.unwrap_err();
    match err {
        BrowserError::ElementNotFound { selector } => {
            assert_eq!(selector, "#does-not-exist");
        }
        other => panic!("unexpected error: {other}"),
    }

    session.dispose().await;
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires a local Chromium"]
async fn saves_session_state_when_tab_closes() {
    let (addr, server) = spawn_fixture_server().await;
    let dir = tempfile::tempdir().unwrap();
    let save_path = dir.path().join("session.json");

    let profile = Arc::new(ProfileDir::create().unwrap());
    let opts = BrowserOpts::new()
        .headless(true)
        .storage_state_save_path(&save_path);
    let mut session = BrowserSession::new(opts, profile);
    session.start().await.unwrap();

    let url = Url::parse(&format!("http://{addr}/ok")).unwrap();
    session.new_tab(Some(&url)).await.unwrap();

    // dispose closes the tab, which fires the one-shot save watcher; the
    // write must be complete by the time dispose returns.
    session.dispose().await;
    assert!(save_path.exists());
    let state = restock::StorageState::from_file(&save_path).unwrap();
    assert!(state.origins.is_empty());

    server.abort();
}
