//! Integration tests for the upload orchestrator and transfer engine.
//!
//! These tests drive full submissions against a mock vault API: validation,
//! duplicate handling, progress, failure classification and cancellation.

use std::sync::Arc;
use std::time::Duration;

use docvault_core::api::{
    CLIENT_REQUEST_ID_HEADER, ChannelNotifier, ClientEvent, NoopNotifier, Session,
};
use docvault_core::{
    ApiClient, ClientConfig, DuplicateAction, FilesApi, SubmitOptions, SubmitOutcome, TaskId,
    TransferEngine, UploadError, UploadErrorKind, UploadEvent, UploadOrchestrator, UploadPayload,
    UploadState,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPLOAD_PATH: &str = "/api/v1/files/upload";

fn orchestrator_for(mock_server: &MockServer) -> UploadOrchestrator {
    let config = ClientConfig {
        base_url: mock_server.uri(),
        ..ClientConfig::default()
    };
    let client = ApiClient::new(
        &config,
        Arc::new(Session::with_token("t")),
        Arc::new(NoopNotifier),
    )
    .expect("client builds");
    let engine = TransferEngine::new(client.clone(), &config);
    UploadOrchestrator::new(engine, Arc::new(FilesApi::new(client)), &config)
}

fn file_json(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "originalFilename": name,
        "size": 4,
        "contentType": "application/pdf",
        "uploadTimestamp": "2024-05-01T10:00:00Z"
    })
}

fn listing(files: Vec<serde_json::Value>) -> serde_json::Value {
    let total = files.len();
    json!({
        "files": files,
        "currentPage": 0,
        "totalPages": 1,
        "totalElements": total,
        "hasNext": false,
        "hasPrevious": false
    })
}

fn listing_page(files: Vec<serde_json::Value>, page: u32, has_next: bool) -> serde_json::Value {
    json!({
        "files": files,
        "currentPage": page,
        "totalPages": 2,
        "totalElements": 200,
        "hasNext": has_next,
        "hasPrevious": page > 0
    })
}

async fn mount_listing_page(mock_server: &MockServer, page: u32, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("page", page.to_string()))
        .and(query_param("size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
}

async fn mount_listing(mock_server: &MockServer, files: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .and(query_param("page", "0"))
        .and(query_param("size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(files)))
        .mount(mock_server)
        .await;
}

fn started(outcome: SubmitOutcome) -> TaskId {
    match outcome {
        SubmitOutcome::Started(id) => id,
        SubmitOutcome::Duplicate(pending) => {
            panic!("unexpected duplicate of {}", pending.existing().display_name)
        }
    }
}

#[tokio::test]
async fn test_oversized_and_empty_files_never_reach_the_network() {
    let mock_server = MockServer::start().await;
    let orchestrator = orchestrator_for(&mock_server);

    let empty = orchestrator
        .submit(UploadPayload::new("empty.pdf", Vec::new()), SubmitOptions::default())
        .await;
    assert!(matches!(empty, Err(UploadError::Validation { .. })));

    let big = vec![0_u8; 10 * 1024 * 1024 + 1];
    let oversized = orchestrator
        .submit(UploadPayload::new("big.pdf", big), SubmitOptions::default())
        .await;
    assert!(matches!(oversized, Err(UploadError::Validation { .. })));

    let requests = mock_server.received_requests().await.expect("recording on");
    assert!(requests.is_empty(), "validation must not issue requests");
    assert!(orchestrator.tasks().is_empty());
}

#[tokio::test]
async fn test_successful_upload_records_result_id() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, vec![]).await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"report.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(42, "report.pdf")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let id = started(
        orchestrator
            .submit(UploadPayload::new("report.pdf", b"%PDF".to_vec()), SubmitOptions::default())
            .await
            .expect("submit"),
    );

    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.state, UploadState::Success);
    assert_eq!(task.result_file_id, Some(42));
    assert!((task.progress - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_keep_both_uploads_under_next_free_name() {
    let mock_server = MockServer::start().await;
    mount_listing(
        &mock_server,
        vec![file_json(1, "report.pdf"), file_json(2, "report-1.pdf")],
    )
    .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"report-2.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(3, "report-2.pdf")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let outcome = orchestrator
        .submit(UploadPayload::new("report.pdf", b"%PDF".to_vec()), SubmitOptions::default())
        .await
        .expect("submit");
    let SubmitOutcome::Duplicate(pending) = outcome else {
        panic!("expected a duplicate");
    };
    assert_eq!(pending.existing().id, 1);
    assert!(orchestrator.tasks().is_empty(), "no task before the decision");

    let id = orchestrator
        .resolve_duplicate(pending.decide(DuplicateAction::KeepBoth))
        .await
        .expect("resolve")
        .expect("keep-both starts a task");
    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.file_name, "report-2.pdf");
    assert_eq!(task.state, UploadState::Success);
}

#[tokio::test]
async fn test_conflict_on_later_listing_page_is_detected() {
    let mock_server = MockServer::start().await;
    let first: Vec<_> = (0..100)
        .map(|i| file_json(1000 + i, &format!("scan-{i}.png")))
        .collect();
    mount_listing_page(&mock_server, 0, listing_page(first, 0, true)).await;
    mount_listing_page(
        &mock_server,
        1,
        listing_page(
            vec![file_json(7, "Report.pdf"), file_json(8, "report-1.pdf")],
            1,
            false,
        ),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"report-2.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(9, "report-2.pdf")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let SubmitOutcome::Duplicate(pending) = orchestrator
        .submit(UploadPayload::new("report.pdf", b"%PDF".to_vec()), SubmitOptions::default())
        .await
        .expect("submit")
    else {
        panic!("conflict on the second page must be found");
    };
    assert_eq!(pending.existing().id, 7);

    let id = orchestrator
        .resolve_duplicate(pending.decide(DuplicateAction::KeepBoth))
        .await
        .expect("resolve")
        .expect("keep-both starts a task");
    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.file_name, "report-2.pdf");
}

#[tokio::test]
async fn test_duplicate_scan_stops_at_configured_limit() {
    let mock_server = MockServer::start().await;
    let first: Vec<_> = (0..100)
        .map(|i| file_json(1000 + i, &format!("scan-{i}.png")))
        .collect();
    mount_listing_page(&mock_server, 0, listing_page(first, 0, true)).await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(5, "new.pdf")))
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        base_url: mock_server.uri(),
        duplicate_scan_limit: 100,
        ..ClientConfig::default()
    };
    let client = ApiClient::new(&config, Arc::new(Session::new()), Arc::new(NoopNotifier))
        .expect("client builds");
    let orchestrator = UploadOrchestrator::new(
        TransferEngine::new(client.clone(), &config),
        Arc::new(FilesApi::new(client)),
        &config,
    );

    let id = started(
        orchestrator
            .submit(UploadPayload::new("new.pdf", b"data".to_vec()), SubmitOptions::default())
            .await
            .expect("submit"),
    );
    orchestrator.wait(id).await.expect("task finishes");

    let requests = mock_server.received_requests().await.expect("recording on");
    let listings = requests.iter().filter(|r| r.method.as_str() == "GET").count();
    assert_eq!(listings, 1, "page 1 is beyond the scan limit");
}

#[tokio::test]
async fn test_replace_deletes_existing_before_upload() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, vec![file_json(5, "Invoice.PDF")]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/5"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(6, "invoice.pdf")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let SubmitOutcome::Duplicate(pending) = orchestrator
        .submit(UploadPayload::new("invoice.pdf", b"data".to_vec()), SubmitOptions::default())
        .await
        .expect("submit")
    else {
        panic!("name match is case-insensitive");
    };

    let id = orchestrator
        .resolve_duplicate(pending.decide(DuplicateAction::Replace))
        .await
        .expect("resolve")
        .expect("replace starts a task");
    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.result_file_id, Some(6));

    let requests = mock_server.received_requests().await.expect("recording on");
    let delete_at = requests
        .iter()
        .position(|r| r.method.as_str() == "DELETE")
        .expect("delete sent");
    let upload_at = requests
        .iter()
        .position(|r| r.method.as_str() == "POST")
        .expect("upload sent");
    assert!(delete_at < upload_at, "delete must precede the upload");
}

#[tokio::test]
async fn test_failed_replace_creates_no_task() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, vec![file_json(5, "a.pdf")]).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files/5"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Access denied"})))
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let SubmitOutcome::Duplicate(pending) = orchestrator
        .submit(UploadPayload::new("a.pdf", b"data".to_vec()), SubmitOptions::default())
        .await
        .expect("submit")
    else {
        panic!("expected a duplicate");
    };

    let result = orchestrator
        .resolve_duplicate(pending.decide(DuplicateAction::Replace))
        .await;
    assert!(matches!(result, Err(UploadError::Replace { file_id: 5, .. })));
    assert!(orchestrator.tasks().is_empty());
}

#[tokio::test]
async fn test_upload_request_carries_credential_and_correlation_id() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(header("Authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(4, "memo.txt")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    let id = started(
        orchestrator
            .submit(UploadPayload::new("memo.txt", b"memo".to_vec()), options)
            .await
            .expect("submit"),
    );
    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.state, UploadState::Success);

    let requests = mock_server.received_requests().await.expect("recording on");
    let id = requests[0]
        .headers
        .get(CLIENT_REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .expect("correlation id on upload");
    assert!(uuid::Uuid::parse_str(id).is_ok(), "not a UUID: {id}");
    let content_type = requests[0]
        .headers
        .get("Content-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"), "{content_type}");
}

#[tokio::test]
async fn test_upload_rejections_fire_session_and_rate_limit_signals() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"expired.pdf\""))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"busy.pdf\""))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "12")
                .set_body_json(json!({"message": "Too many uploads"})),
        )
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        base_url: mock_server.uri(),
        ..ClientConfig::default()
    };
    let session = Arc::new(Session::with_token("stale"));
    let (notifier, mut events) = ChannelNotifier::new();
    let client = ApiClient::new(&config, Arc::clone(&session), Arc::new(notifier))
        .expect("client builds");
    let orchestrator = UploadOrchestrator::new(
        TransferEngine::new(client.clone(), &config),
        Arc::new(FilesApi::new(client)),
        &config,
    );
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };

    let expired = started(
        orchestrator
            .submit(UploadPayload::new("expired.pdf", b"data".to_vec()), options)
            .await
            .expect("submit expired"),
    );
    let expired = orchestrator.wait(expired).await.expect("task finishes");
    assert_eq!(expired.state, UploadState::Error);
    assert!(!session.is_authenticated(), "401 clears the session");
    assert_eq!(events.try_recv().expect("expiry signal"), ClientEvent::SessionExpired);

    let busy = started(
        orchestrator
            .submit(UploadPayload::new("busy.pdf", b"data".to_vec()), options)
            .await
            .expect("submit busy"),
    );
    let busy = orchestrator.wait(busy).await.expect("task finishes");
    assert_eq!(busy.state, UploadState::Error);
    assert_eq!(busy.error_message.as_deref(), Some("Too many uploads"));
    let ClientEvent::RateLimited(advisory) = events.try_recv().expect("rate limit signal") else {
        panic!("expected a rate limit advisory");
    };
    assert_eq!(advisory.retry_after, Duration::from_secs(12));
    assert_eq!(advisory.endpoint, UPLOAD_PATH);
}

#[tokio::test]
async fn test_server_size_rejection_is_classified_too_large() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(413)
                .set_body_json(json!({"message": "Maximum upload size exceeded"})),
        )
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    let id = started(
        orchestrator
            .submit(UploadPayload::new("scan.png", b"png!".to_vec()), options)
            .await
            .expect("submit"),
    );

    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.state, UploadState::Error);
    assert_eq!(task.error_kind, Some(UploadErrorKind::TooLarge));
    assert_eq!(
        task.error_message.as_deref(),
        Some("Maximum upload size exceeded")
    );
}

#[tokio::test]
async fn test_undecodable_success_body_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    let id = started(
        orchestrator
            .submit(UploadPayload::new("a.txt", b"abc".to_vec()), options)
            .await
            .expect("submit"),
    );

    let task = orchestrator.wait(id).await.expect("task finishes");
    assert_eq!(task.state, UploadState::Error);
    assert_eq!(task.error_message.as_deref(), Some("Invalid JSON response"));
}

#[tokio::test]
async fn test_progress_events_rise_monotonically() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(9, "big.bin")))
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let mut events = orchestrator.subscribe();
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    // Four chunks.
    let payload = UploadPayload::new("big.bin", vec![7_u8; 4 * 64 * 1024]);
    let id = started(orchestrator.submit(payload, options).await.expect("submit"));

    let mut percents = Vec::new();
    loop {
        match events.recv().await.expect("event stream open") {
            UploadEvent::Progress { id: event_id, percent } if event_id == id => {
                percents.push(percent);
            }
            UploadEvent::Finished(task) if task.id == id => {
                assert_eq!(task.state, UploadState::Success);
                break;
            }
            _ => {}
        }
    }

    assert!(!percents.is_empty(), "expected progress events");
    assert!(percents.windows(2).all(|w| w[0] < w[1]), "not increasing: {percents:?}");
    assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
}

#[tokio::test]
async fn test_cancel_in_flight_upload_ends_cancelled() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json(1, "slow.pdf"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    let id = started(
        orchestrator
            .submit(UploadPayload::new("slow.pdf", b"data".to_vec()), options)
            .await
            .expect("submit"),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(orchestrator.cancel(id));

    let task = tokio::time::timeout(Duration::from_secs(5), orchestrator.wait(id))
        .await
        .expect("cancellation is prompt")
        .expect("task finishes");
    assert_eq!(task.state, UploadState::Cancelled);
    assert_eq!(task.result_file_id, None);
}

#[tokio::test]
async fn test_concurrent_uploads_are_tracked_independently() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"one.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(11, "one.pdf")))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("filename=\"two.pdf\""))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "Storage offline"})))
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let options = SubmitOptions {
        skip_duplicate_check: true,
    };
    let one = started(
        orchestrator
            .submit(UploadPayload::new("one.pdf", b"1".to_vec()), options)
            .await
            .expect("submit one"),
    );
    let two = started(
        orchestrator
            .submit(UploadPayload::new("two.pdf", b"2".to_vec()), options)
            .await
            .expect("submit two"),
    );

    let (one, two) = tokio::join!(orchestrator.wait(one), orchestrator.wait(two));
    let (one, two) = (one.expect("one finishes"), two.expect("two finishes"));
    assert_eq!(one.state, UploadState::Success);
    assert_eq!(two.state, UploadState::Error);
    assert_eq!(two.error_kind, Some(UploadErrorKind::Unknown));

    let names: Vec<String> = orchestrator.tasks().into_iter().map(|t| t.file_name).collect();
    assert_eq!(names, vec!["two.pdf".to_string(), "one.pdf".to_string()]);
}

#[tokio::test]
async fn test_listing_failure_blocks_submission() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let result = orchestrator
        .submit(UploadPayload::new("a.pdf", b"data".to_vec()), SubmitOptions::default())
        .await;
    assert!(matches!(result, Err(UploadError::DuplicateCheck { .. })));
    assert!(orchestrator.tasks().is_empty());
}
