//! Cache maintenance and settings tests

use chrono::Duration;
use paperchat_app::CacheStats;
use paperchat_papers::PaperRef;
use paperchat_storage::KeyValueStore;

use crate::common::{arxiv_record, TestApp, PAPER_URL};

async fn seed_paper(app: &TestApp, id: &str) {
    app.fetcher.insert(arxiv_record(id, "Seeded"));
    let paper = PaperRef::resolve(id).unwrap();
    app.library.load_metadata(&paper, &app.fetcher).await;

    let mut session = app.library.open_paper(id).unwrap();
    session
        .conversation
        .send_message(app.library.chat_service(), "Hi".to_string(), Vec::new(), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stats_and_clear_all() {
    let app = TestApp::new();
    seed_paper(&app, "2301.12345").await;
    seed_paper(&app, "2301.54321").await;
    app.library
        .settings()
        .save("vck_1234567890abcdef")
        .unwrap();

    let manager = app.library.cache_manager();
    let stats = manager.stats().unwrap();
    assert_eq!(stats.papers, 2);
    assert_eq!(stats.chats, 4);
    assert_eq!(stats.total, 6);

    let removed = manager.clear_all().unwrap();
    assert_eq!(removed, stats);
    assert_eq!(manager.stats().unwrap(), CacheStats::default());
    assert!(app.library.recent_papers().unwrap().is_empty());

    // Settings survive a cache clear
    assert!(app.library.settings().is_configured());
}

#[tokio::test]
async fn test_clear_chat_threads_resets_conversations() {
    let app = TestApp::new();
    seed_paper(&app, "2301.12345").await;

    assert_eq!(app.library.cache_manager().clear_chat_threads().unwrap(), 2);

    let session = app.library.open_paper(PAPER_URL).unwrap();
    assert!(session.conversation.messages().is_empty());
    assert_eq!(session.conversation.threads().len(), 1);
}

#[tokio::test]
async fn test_clear_old_keeps_fresh_entries() {
    let app = TestApp::new();
    seed_paper(&app, "2301.12345").await;

    let removed = app
        .library
        .cache_manager()
        .clear_old(Duration::hours(24))
        .unwrap();
    assert_eq!(removed.total, 0);

    let removed = app
        .library
        .cache_manager()
        .clear_old(Duration::zero())
        .unwrap();
    assert_eq!(removed.papers, 1);
    assert_eq!(removed.chats, 0);
}

#[test]
fn test_api_key_roundtrip_through_store() {
    let app = TestApp::new();
    let settings = app.library.settings();

    assert!(settings.save("short").is_err());
    settings.save(" vck_1234567890abcdef ").unwrap();
    assert_eq!(
        app.memory
            .get(paperchat_app::settings::API_KEY_STORAGE_KEY)
            .unwrap()
            .as_deref(),
        Some("vck_1234567890abcdef")
    );

    settings.clear().unwrap();
    assert!(settings.get().is_none());
}
