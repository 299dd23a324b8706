//! Durability tests across library restarts and storage backends

use std::sync::Arc;

use paperchat_app::Library;
use paperchat_common::{Config, ResourceKey};
use paperchat_conversations::DEFAULT_THREAD_ID;
use paperchat_llm::{LlmConfig, MockChatService, MockScript};
use paperchat_storage::{FileStore, KeyValueStore, SharedStore, DEFAULT_QUOTA_BYTES};

use crate::common::{TestApp, PAPER_URL};

fn file_library(root: &std::path::Path, chat: &MockChatService) -> Library {
    let store: SharedStore = Arc::new(FileStore::open(root, DEFAULT_QUOTA_BYTES).unwrap());
    Library::new(
        store,
        Arc::new(chat.clone()),
        LlmConfig::default(),
        Config::default(),
    )
}

#[tokio::test]
async fn test_conversation_survives_restart_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let chat = MockChatService::new();
    chat.push_script(MockScript::reply(&["It", " works"]));

    let thread_id = {
        let library = file_library(dir.path(), &chat);
        let mut session = library.open_paper("2301.12345").unwrap();
        let thread = session.conversation.create_thread(Some("Notes")).unwrap();
        session
            .conversation
            .send_message(library.chat_service(), "Does it?".to_string(), Vec::new(), None)
            .await
            .unwrap();
        thread.id
    };

    let library = file_library(dir.path(), &chat);
    let mut session = library.open_paper(PAPER_URL).unwrap();

    // Active selection is not persisted; the first thread is active again
    assert_eq!(session.conversation.active_thread_id(), Some(DEFAULT_THREAD_ID));
    assert_eq!(session.conversation.threads().len(), 2);

    session.conversation.switch_thread(&thread_id).unwrap();
    let texts: Vec<String> = session
        .conversation
        .messages()
        .iter()
        .map(|m| m.text())
        .collect();
    assert_eq!(texts, vec!["Does it?", "It works"]);
}

#[test]
fn test_corrupt_directory_recovers_to_main_thread() {
    let app = TestApp::new();
    let key = ResourceKey::derive(PAPER_URL).unwrap().directory_key();
    app.memory.set(&key, "{\"threads\": oops").unwrap();

    let session = app.library.open_paper(PAPER_URL).unwrap();
    assert_eq!(session.conversation.threads().len(), 1);
    assert_eq!(session.conversation.active_thread_id(), Some(DEFAULT_THREAD_ID));

    // The repaired directory was written back
    let raw = app.memory.get(&key).unwrap().unwrap();
    assert!(raw.starts_with('['));
}

#[test]
fn test_restart_on_shared_memory_store() {
    let app = TestApp::new();
    {
        let mut session = app.library.open_paper(PAPER_URL).unwrap();
        session.conversation.create_thread(Some("Second")).unwrap();
    }

    let restarted = TestApp::with_store(app.memory.clone(), Config::default());
    let session = restarted.library.open_paper(PAPER_URL).unwrap();
    let titles: Vec<&str> = session
        .conversation
        .threads()
        .iter()
        .map(|t| t.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Main Thread", "Second"]);
}

#[test]
fn test_failed_thread_creation_changes_nothing() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    app.memory.set_fail_writes(true);

    let err = session.conversation.create_thread(Some("Lost")).unwrap_err();
    assert!(err.is_persistence_failure());
    assert_eq!(session.conversation.threads().len(), 1);

    app.memory.set_fail_writes(false);
    let reopened = app.library.open_paper(PAPER_URL).unwrap();
    assert_eq!(reopened.conversation.threads().len(), 1);
}
