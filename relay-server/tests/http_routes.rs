//! Smoke tests for the plain HTTP routes, run against a real listener on an
//! ephemeral port — the websocket game loop is covered at the unit level
//! inside `battle-core`, this just checks the server comes up and answers.

use std::sync::Arc;

use battle_core::UnitCatalog;
use relay_server::build_router;
use relay_server::state::AppState;

async fn spawn_test_server() -> String {
    let state = Arc::new(AppState::new(Arc::new(UnitCatalog::default_catalog())));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn rooms_starts_empty() {
    let base = spawn_test_server().await;
    let response = reqwest::get(format!("{base}/rooms")).await.unwrap();
    assert!(response.status().is_success());
    let rooms: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(rooms.is_empty());
}
