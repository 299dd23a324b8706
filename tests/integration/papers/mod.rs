//! Paper metadata and recent papers tests

use chrono::Duration;
use paperchat_common::Config;
use paperchat_papers::PaperRef;

use crate::common::{arxiv_record, TestApp};

#[tokio::test]
async fn test_metadata_fetched_once_then_cached() {
    let app = TestApp::new();
    app.fetcher
        .insert(arxiv_record("2301.12345", "Caching in Practice"));
    let paper = PaperRef::resolve("https://arxiv.org/pdf/2301.12345.pdf").unwrap();

    let first = app.library.load_metadata(&paper, &app.fetcher).await;
    let second = app.library.load_metadata(&paper, &app.fetcher).await;

    assert_eq!(first.display_title(), "Caching in Practice");
    assert_eq!(first.author_line(), "Ada Lovelace and Alan Turing");
    assert_eq!(first.url, "https://arxiv.org/pdf/2301.12345");
    assert_eq!(first, second);
    assert_eq!(app.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_recent_papers_reflect_conversation_activity() {
    let app = TestApp::new();
    for (id, title) in [
        ("2301.00001", "First"),
        ("2301.00002", "Second"),
        ("2301.00003", "Third"),
    ] {
        app.fetcher.insert(arxiv_record(id, title));
        let paper = PaperRef::resolve(id).unwrap();
        app.library.load_metadata(&paper, &app.fetcher).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let mut session = app.library.open_paper("2301.00001").unwrap();
    session
        .conversation
        .send_message(app.library.chat_service(), "Hi".to_string(), Vec::new(), None)
        .await
        .unwrap();

    let recent = app.library.recent_papers().unwrap();
    let titles: Vec<&str> = recent.iter().map(|r| r.metadata.display_title()).collect();
    assert_eq!(titles, vec!["First", "Third", "Second"]);
    assert_eq!(recent[0].thread_count, 1);
    assert_eq!(recent[1].thread_count, 0);
}

#[tokio::test]
async fn test_recent_papers_limit_and_expiry() {
    let app = TestApp::with_config(Config {
        recent_papers_limit: 2,
        ..Config::default()
    });

    for id in ["2301.00001", "2301.00002", "2301.00003"] {
        let paper = PaperRef::resolve(id).unwrap();
        let mut metadata = paperchat_papers::PaperMetadata::basic(&paper);
        if id == "2301.00002" {
            metadata.fetched_at = chrono::Utc::now() - Duration::hours(25);
        }
        app.library.metadata().store(&metadata).unwrap();
    }

    let recent = app.library.recent_papers().unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent
        .iter()
        .all(|r| r.metadata.url != "https://arxiv.org/pdf/2301.00002"));
}

#[tokio::test]
async fn test_unknown_paper_falls_back_to_basic_metadata() {
    let app = TestApp::new();
    let paper = PaperRef::resolve("https://example.org/preprint.pdf").unwrap();

    let metadata = app.library.load_metadata(&paper, &app.fetcher).await;
    assert_eq!(metadata.display_title(), "https://example.org/preprint.pdf");
    assert!(metadata.authors.is_empty());
    assert_eq!(app.fetcher.call_count(), 0);
}
