//! Conversation flow tests: threads, streaming turns, cancellation, failures

use chrono::Utc;
use paperchat_common::Error;
use paperchat_conversations::{SessionState, TurnOutcome, DEFAULT_THREAD_ID, DEFAULT_THREAD_TITLE};
use paperchat_llm::{stop_channel, ImageAttachment, MockScript, StreamEvent};

use crate::common::{transcript, TestApp, PAPER_URL};

#[tokio::test]
async fn test_summarize_paper_end_to_end() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();

    let thread = session.conversation.active_thread().unwrap().clone();
    assert_eq!(thread.id, DEFAULT_THREAD_ID);
    assert_eq!(thread.title, DEFAULT_THREAD_TITLE);

    app.reply_with(&["This", " paper", " presents..."]);
    let sent_at = Utc::now();
    let outcome = session
        .conversation
        .send_message(
            app.library.chat_service(),
            "Summarize this paper".to_string(),
            Vec::new(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Settled);
    assert_eq!(
        transcript(&app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID)),
        vec![
            ("user".to_string(), "Summarize this paper".to_string()),
            ("assistant".to_string(), "This paper presents...".to_string()),
        ]
    );

    // The directory on disk carries the touched timestamp
    let reopened = app.library.open_paper(PAPER_URL).unwrap();
    assert!(reopened.conversation.active_thread().unwrap().last_message_at >= sent_at);
    assert_eq!(reopened.conversation.messages().len(), 2);
}

#[tokio::test]
async fn test_arxiv_id_and_url_share_conversation() {
    let app = TestApp::new();
    let mut by_url = app
        .library
        .open_paper("https://arxiv.org/abs/2301.12345")
        .unwrap();
    by_url
        .conversation
        .send_message(app.library.chat_service(), "Hello".to_string(), Vec::new(), None)
        .await
        .unwrap();

    let by_id = app.library.open_paper("2301.12345").unwrap();
    assert_eq!(by_id.paper.display_url, "arXiv:2301.12345");
    assert_eq!(by_id.conversation.messages().len(), 2);
}

#[tokio::test]
async fn test_threads_are_independent() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    let service = app.library.chat_service();

    session
        .conversation
        .send_message(service, "Main question".to_string(), Vec::new(), None)
        .await
        .unwrap();

    let methods = session.conversation.create_thread(Some("Methods")).unwrap();
    assert!(session.conversation.messages().is_empty());
    session
        .conversation
        .send_message(service, "Methods question".to_string(), Vec::new(), None)
        .await
        .unwrap();

    // The second request carries no history from the main thread
    let requests = app.chat.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].history.is_empty());

    session.conversation.switch_thread(DEFAULT_THREAD_ID).unwrap();
    assert_eq!(
        session.conversation.messages()[0].text(),
        "Main question"
    );
    assert_eq!(
        app.stored_messages(PAPER_URL, &methods.id)[0].text(),
        "Methods question"
    );
}

#[tokio::test]
async fn test_image_attachment_travels_with_message() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();

    session
        .conversation
        .send_message(
            app.library.chat_service(),
            "What does this figure show?".to_string(),
            vec![ImageAttachment::png("data:image/png;base64,iVBORw0KGgo")],
            None,
        )
        .await
        .unwrap();

    let request = &app.chat.recorded_requests()[0];
    assert_eq!(request.message.images.len(), 1);
    assert_eq!(request.document.url, PAPER_URL);

    let stored = app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID);
    assert_eq!(stored[0].images().len(), 1);
}

#[tokio::test]
async fn test_nothing_written_until_turn_ends() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    app.memory.reset_journal();

    session
        .conversation
        .submit("Explain section 2".to_string(), Vec::new())
        .unwrap();
    session.conversation.on_fragment("Section").unwrap();
    session.conversation.on_fragment(" 2").unwrap();
    assert_eq!(app.memory.write_count(), 0);

    session.conversation.on_complete().unwrap();
    assert_eq!(
        app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID)[1].text(),
        "Section 2"
    );
}

#[test_log::test(tokio::test)]
async fn test_stop_keeps_partial_reply() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    app.chat.push_script(MockScript::Hold(vec![
        StreamEvent::Delta("The main".to_string()),
        StreamEvent::Delta(" result".to_string()),
    ]));

    let (handle, signal) = stop_channel();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        handle.stop();
    });

    let outcome = session
        .conversation
        .send_message(
            app.library.chat_service(),
            "Main result?".to_string(),
            Vec::new(),
            Some(signal),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert!(app.chat.stop_requested());
    assert_eq!(
        transcript(&app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID)),
        vec![
            ("user".to_string(), "Main result?".to_string()),
            ("assistant".to_string(), "The main result".to_string()),
        ]
    );

    // Acknowledged by the next submit
    session
        .conversation
        .send_message(app.library.chat_service(), "Go on".to_string(), Vec::new(), None)
        .await
        .unwrap();
    assert_eq!(session.conversation.messages().len(), 4);
}

#[tokio::test]
async fn test_stream_failure_keeps_settled_history() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    let service = app.library.chat_service();

    session
        .conversation
        .send_message(service, "First".to_string(), Vec::new(), None)
        .await
        .unwrap();
    let settled = app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID);

    app.chat
        .push_script(MockScript::fail_after(&["Half an"], "gateway timeout"));
    let err = session
        .conversation
        .send_message(service, "Second".to_string(), Vec::new(), None)
        .await
        .unwrap_err();

    assert!(err.is_stream_failure());
    assert_eq!(session.conversation.state(), SessionState::Errored);
    assert_eq!(session.conversation.last_error(), Some("gateway timeout"));
    assert_eq!(app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID), settled);

    let outcome = session
        .conversation
        .retry_message(service, None)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Settled);
    assert_eq!(app.stored_messages(PAPER_URL, DEFAULT_THREAD_ID).len(), 4);
}

#[tokio::test]
async fn test_quota_exhaustion_is_a_persistence_failure() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    app.memory.set_quota(Some(app.memory.used_bytes() + 16));

    let err = session
        .conversation
        .send_message(
            app.library.chat_service(),
            "A question long enough to overflow the quota".to_string(),
            Vec::new(),
            None,
        )
        .await
        .unwrap_err();

    assert!(err.is_persistence_failure());
    assert!(!err.is_stream_failure());
    // The conversation is still on screen
    assert_eq!(session.conversation.messages().len(), 2);
    assert_eq!(session.conversation.state(), SessionState::Settled);
}

#[tokio::test]
async fn test_thread_switch_blocked_mid_stream() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    let other = session.conversation.create_thread(None).unwrap();
    session.conversation.switch_thread(DEFAULT_THREAD_ID).unwrap();

    session
        .conversation
        .submit("Hi".to_string(), Vec::new())
        .unwrap();
    session.conversation.on_fragment("Hel").unwrap();

    let err = session.conversation.switch_thread(&other.id).unwrap_err();
    assert!(matches!(err, Error::ThreadSwitchDuringStream));

    session.conversation.stop().unwrap();
    session.conversation.switch_thread(&other.id).unwrap();
    assert_eq!(session.conversation.active_thread_id(), Some(other.id.as_str()));
}

#[test]
fn test_deleting_every_thread_recreates_main() {
    let app = TestApp::new();
    let mut session = app.library.open_paper(PAPER_URL).unwrap();
    let second = session.conversation.create_thread(Some("Second")).unwrap();

    session.conversation.delete_thread(DEFAULT_THREAD_ID).unwrap();
    assert_eq!(session.conversation.active_thread_id(), Some(second.id.as_str()));

    session.conversation.delete_thread(&second.id).unwrap();
    let threads = session.conversation.threads();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, DEFAULT_THREAD_ID);
    assert_eq!(threads[0].title, DEFAULT_THREAD_TITLE);
}
