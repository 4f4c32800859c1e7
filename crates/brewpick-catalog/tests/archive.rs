//! Integration tests for `ImageArchiver` using `wiremock` and a temp dir.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brewpick_catalog::{ArchiveOutcome, CatalogError, ImageArchiver};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn archiver(dir: &std::path::Path) -> ImageArchiver {
    ImageArchiver::new(dir, 5, "brewpick-test/0.1").expect("test archiver")
}

#[tokio::test]
async fn archive_downloads_new_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    let outcome = archiver(&images)
        .archive(&format!("{}/img/a.png", server.uri()), "IPA_1.png")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ArchiveOutcome::Downloaded {
            bytes: PNG_BYTES.len()
        }
    );
    assert_eq!(std::fs::read(images.join("IPA_1.png")).unwrap(), PNG_BYTES);
    let leftovers: Vec<_> = std::fs::read_dir(&images)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[tokio::test]
async fn archive_skips_existing_file_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("IPA_1.png"), b"old").unwrap();

    let outcome = archiver(dir.path())
        .archive(&format!("{}/img/a.png", server.uri()), "IPA_1.png")
        .await
        .unwrap();

    assert_eq!(outcome, ArchiveOutcome::AlreadyPresent);
    assert_eq!(std::fs::read(dir.path().join("IPA_1.png")).unwrap(), b"old");
}

#[tokio::test]
async fn archive_follows_one_relative_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/cdn/a.png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdn/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let outcome = archiver(dir.path())
        .archive(&format!("{}/img/a.png", server.uri()), "a.png")
        .await
        .unwrap();

    assert!(matches!(outcome, ArchiveOutcome::Downloaded { .. }));
    assert!(dir.path().join("a.png").exists());
}

#[tokio::test]
async fn archive_rejects_second_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/two"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/three"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = archiver(dir.path())
        .archive(&format!("{}/one", server.uri()), "x.jpg")
        .await
        .unwrap_err();

    assert!(
        matches!(err, CatalogError::Download { status: 301, .. }),
        "got: {err:?}"
    );
    assert!(!dir.path().join("x.jpg").exists());
}

#[tokio::test]
async fn archive_not_found_is_download_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = archiver(dir.path())
        .archive(&format!("{}/missing.png", server.uri()), "m.png")
        .await
        .unwrap_err();

    assert!(
        matches!(err, CatalogError::Download { status: 404, .. }),
        "got: {err:?}"
    );
    assert!(!dir.path().join("m.png").exists());
}
