//! Integration tests for `Drive115Client` against a mock 115 API server.
//!
//! Uses `wiremock` to stand up a fake open-platform endpoint and exercise
//! the client's request shapes and retry/backoff behavior against it.

use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gateway_core::domain::{EventCursor, ItemKind, PickHandle};
use gateway_core::ports::upstream_client::UpstreamClient;
use gateway_drive115::client::Drive115Client;

async fn mock_client(server: &MockServer) -> Drive115Client {
    Drive115Client::with_base_url("test-token", server.uri())
}

#[tokio::test]
async fn list_children_maps_rows_to_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/open/ufile/files"))
        .and(query_param("cid", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": true,
            "data": [
                {"fid": "10", "pid": "0", "fn": "Movies", "fc": "0", "te": "1700000000"},
                {"fid": "11", "pid": "0", "fn": "clip.mkv", "fc": "1", "fs": 1024, "pc": "abc123", "sha1": "deadbeef", "te": "1700000100"},
            ],
            "count": 2,
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let page = client.list_children(None, 0, 100).await.unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].kind, ItemKind::Folder);
    assert_eq!(page.items[0].name, "Movies");
    assert_eq!(page.items[1].kind, ItemKind::File);
    assert_eq!(page.items[1].size, Some(1024));
    assert_eq!(page.items[1].pick_handle, Some(PickHandle::new("abc123")));
}

#[tokio::test]
async fn list_children_maps_state_false_to_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/open/ufile/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": false,
            "code": 40140116,
            "message": "access token expired",
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let err = client.list_children(None, 0, 100).await.unwrap_err();
    assert!(matches!(err, gateway_core::ports::upstream_client::UpstreamError::Unauth));
}

#[tokio::test]
async fn resolve_signed_url_extracts_nested_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/open/ufile/downurl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": true,
            "data": {
                "904988455858481865": {
                    "url": { "url": "https://cdn.115.com/d/abc?t=1" }
                }
            }
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let url = client.resolve_signed_url(&PickHandle::new("abc123"), None).await.unwrap();
    assert_eq!(url, "https://cdn.115.com/d/abc?t=1");
}

#[tokio::test]
async fn iter_subtree_walks_nested_folders_lazily() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/open/ufile/files"))
        .and(query_param("cid", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": true,
            "data": [{"fid": "10", "pid": "0", "fn": "Movies", "fc": "0", "te": "1700000000"}],
            "count": 1,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open/ufile/files"))
        .and(query_param("cid", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": true,
            "data": [{"fid": "11", "pid": "10", "fn": "clip.mkv", "fc": "1", "fs": 2048, "pc": "xyz", "te": "1700000100"}],
            "count": 1,
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let items: Vec<_> = client.iter_subtree(None).collect().await;
    assert_eq!(items.len(), 2);
    let (first, first_path) = items[0].as_ref().unwrap();
    assert_eq!(first.name, "Movies");
    assert_eq!(first_path.to_str().unwrap(), "Movies");
    let (second, second_path) = items[1].as_ref().unwrap();
    assert_eq!(second.name, "clip.mkv");
    assert_eq!(second_path.to_str().unwrap(), "Movies/clip.mkv");
}

#[tokio::test]
async fn list_events_tracks_new_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/android/2.0/life/behavior_detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": true,
            "data": {
                "list": [
                    {"id": 5, "type": 2, "file_id": "1", "file_name": "a.mkv", "pid": "0", "update_time": 1700000000},
                    {"id": 9, "type": 22, "file_id": "2", "file_name": "b.mkv", "pid": "0", "update_time": 1700000100},
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let page = client.list_events(None, 100).await.unwrap();
    assert_eq!(page.events.len(), 2);
    assert_eq!(page.new_cursor, EventCursor(9));
}
