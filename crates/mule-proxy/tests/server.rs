//! Lifecycle tests for `serve_listener`: the full process wiring, including the
//! quota reset task, against an httpmock upstream.
//!
//! Run with:
//!   cargo test -p mule-proxy --test server

use std::time::Duration;

use httpmock::MockServer;
use mule_proxy::{Config, Credential, CredentialDirectory, PublicId, serve_listener};
use tokio_util::sync::CancellationToken;

const GOOD_DOC: &str = r#"<Chars nextCharId="3" maxNumChars="2"><Account><Name>Alice</Name></Account></Chars>"#;

async fn char_list(base_url: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/char/list?guid={}", base_url, PublicId::derive("a")))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .expect("Request to relay failed")
}

#[tokio::test]
async fn quota_window_rolls_over_and_cancellation_stops_server() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.path("/char/list");
            then.status(200).body(GOOD_DOC);
        })
        .await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let config = Config::new()
        .with_upstream_origin(upstream.base_url())
        .with_rate_limit(1)
        .with_quota_window(Duration::from_secs(1));
    let directory = CredentialDirectory::new([Credential::new("a", "p")]);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve_listener(listener, config, directory, shutdown.clone()));

    let first = char_list(&base_url).await;
    assert_eq!(first.status(), 200);
    assert_eq!(first.headers()["content-type"], "application/json");

    let second = char_list(&base_url).await;
    assert_eq!(second.status(), 200);
    assert_eq!(second.headers()["content-type"], "text/xml; charset=utf-8");
    mock.assert_hits_async(1).await;

    // The reset task owned by the server refills the quota.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let third = char_list(&base_url).await;
    assert_eq!(third.headers()["content-type"], "application/json");
    mock.assert_hits_async(2).await;

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops after cancellation")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
}
