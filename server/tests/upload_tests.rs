mod common;

use std::io::Write;

use fixtures::google::google_router;
use streamsched::upload::upload_thumbnail;
use streamsched::Error;

const MIB: u64 = 1024 * 1024;

fn thumbnail_file(size: u64, extension: &str) -> tempfile::TempPath {
    let mut file = tempfile::Builder::new()
        .prefix("thumbnail")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .unwrap();
    file.write_all(&vec![0xabu8; size as usize]).unwrap();
    file.into_temp_path()
}

#[tokio::test]
async fn a_ten_mebibyte_file_goes_up_in_ten_chunks() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    let path = thumbnail_file(10 * MIB, "png");
    let sent = upload_thumbnail(&app.client, &app.endpoints, "access-token", "abc123", &path)
        .await
        .unwrap();
    assert_eq!(sent, 10 * MIB);

    assert_eq!(mock.chunk_sizes(), vec![MIB; 10]);

    let sessions = mock.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].broadcast_id, "abc123");
    assert_eq!(sessions[0].content_type, "image/png");
    assert_eq!(sessions[0].declared_total, 10 * MIB);
    assert_eq!(sessions[0].received, 10 * MIB);
}

#[tokio::test]
async fn a_partial_trailing_chunk_is_sent_short() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    let path = thumbnail_file(2 * MIB + 512 * 1024, "png");
    let sent = upload_thumbnail(&app.client, &app.endpoints, "access-token", "abc123", &path)
        .await
        .unwrap();
    assert_eq!(sent, 2 * MIB + 512 * 1024);

    assert_eq!(mock.chunk_sizes(), vec![MIB, MIB, 512 * 1024]);
}

#[tokio::test]
async fn the_extension_decides_the_content_type() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    let path = thumbnail_file(1000, "jpg");
    upload_thumbnail(&app.client, &app.endpoints, "access-token", "abc123", &path)
        .await
        .unwrap();

    assert_eq!(mock.sessions()[0].content_type, "image/jpeg");
}

#[tokio::test]
async fn a_missing_file_is_reported_before_any_session_is_opened() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    let err = upload_thumbnail(
        &app.client,
        &app.endpoints,
        "access-token",
        "abc123",
        std::path::Path::new("/nonexistent/thumbnail.png"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
    assert!(mock.sessions().is_empty());
}

#[tokio::test]
async fn a_mid_upload_failure_reports_the_acknowledged_bytes() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    // The third chunk (index 2) fails after two full chunks went through.
    mock.fail_chunk(2);

    let path = thumbnail_file(3 * MIB, "png");
    let err = upload_thumbnail(&app.client, &app.endpoints, "access-token", "abc123", &path)
        .await
        .unwrap_err();
    match err {
        Error::ChunkUploadFailed {
            bytes_sent,
            message,
        } => {
            assert_eq!(bytes_sent, 2 * MIB);
            assert!(message.contains("500"));
        }
        other => panic!("expected ChunkUploadFailed, got {other:?}"),
    }

    assert_eq!(mock.chunk_sizes(), vec![MIB, MIB]);
}
