//! Integration tests for the file catalog: listing, deletion, text probes.

use std::sync::Arc;

use docvault_core::api::{NoopNotifier, Session};
use docvault_core::{ApiClient, ApiErrorKind, ClientConfig, FileCatalog, FilesApi};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn files_for(mock_server: &MockServer) -> FilesApi {
    let config = ClientConfig {
        base_url: mock_server.uri(),
        ..ClientConfig::default()
    };
    let client =
        ApiClient::new(&config, Arc::new(Session::new()), Arc::new(NoopNotifier)).expect("client");
    FilesApi::new(client)
}

#[tokio::test]
async fn test_list_decodes_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("page", "1"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": 3, "originalFilename": "c.pdf", "size": 30, "contentType": "application/pdf", "uploadTimestamp": 1714557600000_i64},
                {"id": 2, "originalFilename": "b.png", "size": 20, "contentType": "image/png"}
            ],
            "currentPage": 1,
            "totalPages": 3,
            "totalElements": 5,
            "hasNext": true,
            "hasPrevious": true
        })))
        .mount(&mock_server)
        .await;

    let page = files_for(&mock_server).list(1, 2).await.expect("listing");
    assert_eq!(page.files.len(), 2);
    assert_eq!(page.files[0].display_name, "c.pdf");
    assert_eq!(page.files[0].created_at.as_deref(), Some("1714557600000"));
    assert_eq!(page.files[1].created_at, None);
    assert_eq!(page.total_elements, 5);
    assert!(page.has_next && page.has_previous);
}

#[tokio::test]
async fn test_list_clamps_page_size() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [], "currentPage": 0, "totalPages": 0, "totalElements": 0,
            "hasNext": false, "hasPrevious": false
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = files_for(&mock_server).list(0, 50_000).await.expect("listing");
    assert!(page.files.is_empty());
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/8"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    files_for(&mock_server).delete(8).await.expect("delete");
}

#[tokio::test]
async fn test_delete_forbidden_is_classified() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/8"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Not your file"})))
        .mount(&mock_server)
        .await;

    let err = files_for(&mock_server).delete(8).await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Forbidden);
}

#[tokio::test]
async fn test_text_availability_reads_headers() {
    let mock_server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/api/v1/search/files/5/text"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Has-Text", "true")
                .insert_header("X-Text-Length", "2048")
                .insert_header("ETag", "\"v1\""),
        )
        .mount(&mock_server)
        .await;

    let availability = files_for(&mock_server)
        .text_availability(5)
        .await
        .expect("probe");
    assert!(availability.has_text);
    assert_eq!(availability.text_length, 2048);
    assert_eq!(availability.etag.as_deref(), Some("\"v1\""));
}
