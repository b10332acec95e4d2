use std::time::Duration;

use cookieferry::chrome::cdp::discover_web_socket_url;
use cookieferry::error::CookieFerryError;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn version_body(ws_url: &str) -> serde_json::Value {
    json!({
        "Browser": "Chrome/120.0.0.0",
        "Protocol-Version": "1.3",
        "webSocketDebuggerUrl": ws_url
    })
}

#[tokio::test]
async fn discovery_returns_the_debugger_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(version_body("ws://127.0.0.1:9222/devtools/browser/abc")),
        )
        .mount(&server)
        .await;

    let url = discover_web_socket_url(&server.uri(), 3, Duration::from_millis(10))
        .await
        .expect("url");
    assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
}

#[tokio::test]
async fn discovery_retries_until_the_endpoint_appears() {
    let server = MockServer::start().await;
    // the freshly launched browser answers 503 once, then comes up
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(version_body("ws://127.0.0.1:9222/devtools/browser/def")),
        )
        .mount(&server)
        .await;

    let url = discover_web_socket_url(&server.uri(), 5, Duration::from_millis(10))
        .await
        .expect("url");
    assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/def");
}

#[tokio::test]
async fn discovery_gives_up_when_attempts_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = discover_web_socket_url(&server.uri(), 2, Duration::from_millis(5))
        .await
        .expect_err("unreachable endpoint");
    assert!(matches!(err, CookieFerryError::DebuggingConnect(_)));
}
