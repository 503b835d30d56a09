//! Router-level integration tests, grounded on
//! `Lowband21-ferrex/server/src/main.rs`'s `tower::ServiceExt::oneshot`
//! test style.

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gateway_core::config::Config;
use gateway_core::domain::{DriveId, RemoteItemId, Task, TaskId};

async fn test_state(dir: &std::path::Path) -> gateway_server::state::AppState {
    let mut config = Config::default();
    config.database.data_dir = dir.to_path_buf();
    config.database.url = format!("sqlite://{}/state.db", dir.display());
    gateway_server::state::AppState::build(config).await.expect("state builds")
}

#[tokio::test]
async fn drives_list_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = gateway_server::http::create_app(state);

    let response = app
        .oneshot(Request::builder().uri("/api/drives").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let drives: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert!(drives.is_empty());
}

#[tokio::test]
async fn stream_without_drive_id_query_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = gateway_server::http::create_app(state);

    let response = app
        .oneshot(Request::builder().uri("/stream/abc").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stream_for_unknown_drive_is_unauthenticated() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = gateway_server::http::create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stream/abc?drive_id=drive115_1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_crud_round_trips_through_the_api() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = gateway_server::http::create_app(state);

    let task = Task::new(
        TaskId::new(),
        "movies",
        DriveId::from("drive115_1".to_string()),
        RemoteItemId::from("0"),
        PathBuf::from("/mnt/media"),
    )
    .unwrap();
    let body = serde_json::to_vec(&task).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tasks")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/tasks/{}", task.task_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
