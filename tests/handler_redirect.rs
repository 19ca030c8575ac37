mod common;

use axum_test::TestServer;
use shrink::domain::click_event::ClickEvent;
use shrink::routes::router;

#[tokio::test]
async fn test_redirect_success() {
    let pool = common::test_pool().await;
    let url = common::create_test_url(&pool, "https://example.com/target").await;
    let (state, mut rx) = common::create_test_state(pool);
    let server = TestServer::new(router(state)).unwrap();

    let response = server.get(&format!("/{}", url.code)).await;

    assert_eq!(response.status_code(), 301);
    assert_eq!(response.header("location"), "https://example.com/target");
    assert_eq!(rx.try_recv().unwrap(), ClickEvent::new(url.code));
}

#[tokio::test]
async fn test_redirect_not_found() {
    let pool = common::test_pool().await;
    let (state, mut rx) = common::create_test_state(pool);
    let server = TestServer::new(router(state)).unwrap();

    let response = server.get("/nope").await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(
        response.json::<serde_json::Value>(),
        serde_json::json!({ "error": "short url not found", "code": 404 })
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_redirect_survives_full_click_queue() {
    let pool = common::test_pool().await;
    let url = common::create_test_url(&pool, "https://example.com").await;
    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(router(state)).unwrap();

    // The test queue holds 100 events and nothing drains it.
    for _ in 0..120 {
        let response = server.get(&format!("/{}", url.code)).await;
        assert_eq!(response.status_code(), 301);
    }
}

#[tokio::test]
async fn test_unknown_nested_path_is_json_404() {
    let pool = common::test_pool().await;
    let (state, _rx) = common::create_test_state(pool);
    let server = TestServer::new(router(state)).unwrap();

    let response = server.get("/a/b/c").await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(
        response.json::<serde_json::Value>(),
        serde_json::json!({ "error": "not found", "code": 404 })
    );
}
