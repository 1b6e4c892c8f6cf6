mod support;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use gallery_core::{identity_of, ItemReference, PendingItem, SessionConfig};
use gallery_engine::{
    FailureKind, FetchError, FetchExecutor, FetchOutcome, FetchedResource, FileSink,
    ResourceFetcher,
};
use pretty_assertions::assert_eq;
use support::{cursor, fast_config, init_logging, item_url, markup, FakeFetcher, FakeGallery};
use tempfile::TempDir;

fn pending(id: &str) -> PendingItem {
    let reference = ItemReference::new(item_url(id));
    PendingItem {
        identity: identity_of(&reference).unwrap(),
        reference,
    }
}

#[tokio::test]
async fn discovery_only_grows_as_the_gallery_scrolls() {
    init_logging();
    let gallery = Arc::new(FakeGallery::with_numbered_items(7, 2, 2));
    let mut cursor = cursor(gallery.clone(), &fast_config());

    let mut previous: HashSet<ItemReference> =
        cursor.discover().await.unwrap().into_iter().collect();
    assert_eq!(previous.len(), 2);

    for _ in 0..4 {
        assert!(cursor.advance().await.unwrap());
        let current: HashSet<ItemReference> =
            cursor.discover().await.unwrap().into_iter().collect();
        assert!(current.is_superset(&previous));
        previous = current;
    }
    assert_eq!(previous.len(), 7);
}

#[tokio::test]
async fn discover_returns_rendered_order_without_albums() {
    init_logging();
    let gallery = Arc::new(FakeGallery::new(&["30", "10", "20"], 3, 0));
    let mut cursor = cursor(gallery, &fast_config());

    let references = cursor.discover().await.unwrap();
    let urls: Vec<&str> = references.iter().map(ItemReference::as_str).collect();
    assert_eq!(urls, vec![item_url("30"), item_url("10"), item_url("20")]);
}

#[tokio::test]
async fn advance_reports_exhaustion_after_stale_scrolls() {
    init_logging();
    let config = SessionConfig {
        max_stale_advances: 2,
        ..fast_config()
    };
    let gallery = Arc::new(FakeGallery::with_numbered_items(3, 3, 0));
    let mut cursor = cursor(gallery.clone(), &config);
    cursor.discover().await.unwrap();

    assert!(cursor.advance().await.unwrap());
    assert!(!cursor.advance().await.unwrap());
    assert_eq!(gallery.scroll_calls(), 2);
    assert_eq!(cursor.position().await.unwrap(), 1000.0);
}

#[tokio::test]
async fn advance_scrolls_in_configured_steps() {
    init_logging();
    let config = SessionConfig {
        scroll_steps: 3,
        scroll_increment_fraction: 0.5,
        ..fast_config()
    };
    let gallery = Arc::new(FakeGallery::with_numbered_items(20, 2, 1));
    let mut cursor = cursor(gallery.clone(), &config);

    assert!(cursor.advance().await.unwrap());
    assert_eq!(gallery.scroll_calls(), 3);
    assert_eq!(cursor.position().await.unwrap(), 1500.0);
}

#[tokio::test]
async fn executor_stores_media_under_its_identity() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path().to_path_buf());
    let gallery = Arc::new(FakeGallery::with_numbered_items(1, 1, 0));
    let executor = FetchExecutor::new(
        gallery.clone(),
        Arc::new(FakeFetcher::new()),
        markup(),
        &fast_config(),
    );

    let report = executor.fetch(&pending("1001"), &sink).await;

    let FetchOutcome::Success(stored) = report.outcome else {
        panic!("expected success, got {:?}", report.outcome);
    };
    assert_eq!(stored.path, dir.path().join("1001.jpg"));
    assert_eq!(stored.bytes_written, 2048);
    assert!(report.teardown_error.is_none());
    assert_eq!(gallery.open_tabs(), 0);
}

#[tokio::test]
async fn executor_classifies_download_failures() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path().to_path_buf());
    let gallery = Arc::new(FakeGallery::with_numbered_items(3, 3, 0));
    let fetcher = FakeFetcher::new()
        .failing("1001", FailureKind::HttpStatus(503))
        .failing("1002", FailureKind::HttpStatus(410))
        .failing(
            "1003",
            FailureKind::UnsupportedContentType {
                content_type: "text/html".to_string(),
            },
        );
    let executor = FetchExecutor::new(gallery, Arc::new(fetcher), markup(), &fast_config());

    let transient = executor.fetch(&pending("1001"), &sink).await;
    let absent = executor.fetch(&pending("1002"), &sink).await;
    let permanent = executor.fetch(&pending("1003"), &sink).await;

    assert!(matches!(transient.outcome, FetchOutcome::TransientFailure(_)));
    assert!(matches!(absent.outcome, FetchOutcome::AlreadyAbsent(_)));
    assert!(matches!(permanent.outcome, FetchOutcome::PermanentFailure(_)));
}

#[tokio::test]
async fn hanging_navigation_times_out_as_transient() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path().to_path_buf());
    let gallery = Arc::new(FakeGallery::with_numbered_items(1, 1, 0).hanging_navigation("1001"));
    let fetcher = Arc::new(FakeFetcher::new());
    let executor = FetchExecutor::new(gallery.clone(), fetcher.clone(), markup(), &fast_config());

    let report = executor.fetch(&pending("1001"), &sink).await;

    let FetchOutcome::TransientFailure(err) = report.outcome else {
        panic!("expected a transient failure, got {:?}", report.outcome);
    };
    assert_eq!(err.kind, FailureKind::Navigation);
    assert!(fetcher.calls().is_empty());
    assert_eq!(gallery.open_tabs(), 0);
}

struct PanickingFetcher;

#[async_trait]
impl ResourceFetcher for PanickingFetcher {
    async fn download(&self, _url: &str) -> Result<FetchedResource, FetchError> {
        panic!("fetcher blew up");
    }
}

#[tokio::test]
async fn secondary_context_is_closed_when_the_fetch_panics() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let sink = FileSink::new(dir.path().to_path_buf());
    let gallery = Arc::new(FakeGallery::with_numbered_items(1, 1, 0));
    let executor = FetchExecutor::new(
        gallery.clone(),
        Arc::new(PanickingFetcher),
        markup(),
        &fast_config(),
    );

    let joined = tokio::spawn(async move { executor.fetch(&pending("1001"), &sink).await }).await;

    assert!(joined.unwrap_err().is_panic());
    assert_eq!(gallery.opened(), 1);
    assert_eq!(gallery.closed(), 1);
    assert_eq!(gallery.open_tabs(), 0);
}
