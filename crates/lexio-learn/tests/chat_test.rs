mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bson::oid::ObjectId;

use common::FakeGateway;
use lexio_learn::{ChatService, LearnError, UserRef, MAX_CHAT_ROUNDS};
use lexio_persist::{ChatStatus, ExchangeWrite, LearnStore, MemoryStore, Sender};

fn setup() -> (Arc<MemoryStore>, Arc<FakeGateway>, ChatService) {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(FakeGateway::new());
    let service = ChatService::new(store.clone(), gateway.clone(), "lexio");
    (store, gateway, service)
}

fn alice() -> UserRef {
    UserRef::new("u-1", "alice")
}

#[tokio::test]
async fn test_start_session_appends_tagged_greeting() {
    let (_, _, service) = setup();

    let (session, messages) = service
        .start_session(&alice(), "The fox waited.", None)
        .await
        .unwrap();

    assert_eq!(session.total_rounds, 0);
    assert_eq!(session.status, ChatStatus::Active);
    assert_eq!(session.story_snapshot.as_deref(), Some("The fox waited."));

    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Sender::Ai);
    assert_eq!(messages[0].sequence, 0);
    let payload = messages[0].payload.as_ref().unwrap();
    assert_eq!(payload["skip_history"], true);
}

#[tokio::test]
async fn test_blank_snapshot_is_not_stored() {
    let (_, _, service) = setup();

    let (session, _) = service.start_session(&alice(), "   ", None).await.unwrap();
    assert!(session.story_snapshot.is_none());
}

#[tokio::test]
async fn test_first_message_prefixes_snapshot_upstream_only() {
    let (_, gateway, service) = setup();
    let user = alice();
    let (session, _) = service
        .start_session(&user, "The fox waited.", None)
        .await
        .unwrap();

    let (_, messages) = service
        .send_message(&user, session.id, "它在等什么？")
        .await
        .unwrap();

    // The remote model sees the injected context.
    let sent = gateway.last_chat_request.lock().unwrap().clone().unwrap();
    assert_eq!(
        sent.content,
        "短文内容：The fox waited.\n用户问题：它在等什么？"
    );
    assert_eq!(sent.user_id, "lexio-chat-u-1");

    // The stored transcript keeps the original text.
    assert_eq!(messages[0].content, "它在等什么？");
    assert_eq!(messages[0].payload.as_ref().unwrap()["is_story_prefixed"], true);

    // Later turns are sent verbatim.
    service
        .send_message(&user, session.id, "换个说法")
        .await
        .unwrap();
    let sent = gateway.last_chat_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent.content, "换个说法");
}

#[tokio::test]
async fn test_exchange_increments_rounds_and_remembers_conversation() {
    let (_, gateway, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    let (session, messages) = service
        .send_message(&user, session.id, "hello")
        .await
        .unwrap();

    assert_eq!(session.total_rounds, 1);
    assert_eq!(session.coze_conversation_id.as_deref(), Some("conv-1"));
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[1].sender, Sender::Ai);
    assert_eq!(messages[1].content, "scripted reply");

    // The remembered id rides along on the next turn.
    service
        .send_message(&user, session.id, "again")
        .await
        .unwrap();
    let sent = gateway.last_chat_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent.conversation_id.as_deref(), Some("conv-1"));
}

#[tokio::test]
async fn test_sequences_stay_monotonic_across_rounds() {
    let (store, _, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    service.send_message(&user, session.id, "one").await.unwrap();
    service.send_message(&user, session.id, "two").await.unwrap();

    let messages = store.list_messages(session.id).await.unwrap();
    let sequences: Vec<i64> = messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_round_cap_completes_session_then_rejects() {
    let (_, gateway, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    for round in 1..MAX_CHAT_ROUNDS {
        let (state, _) = service
            .send_message(&user, session.id, "question")
            .await
            .unwrap();
        assert_eq!(state.total_rounds, round);
        assert_eq!(state.status, ChatStatus::Active);
        assert!(state.ended_at.is_none());
    }

    // The capping exchange flips the session, one-way.
    let (state, _) = service
        .send_message(&user, session.id, "last question")
        .await
        .unwrap();
    assert_eq!(state.total_rounds, MAX_CHAT_ROUNDS);
    assert_eq!(state.status, ChatStatus::Completed);
    assert!(state.ended_at.is_some());

    // Further messages are rejected before any network call.
    let calls_before = gateway.chat_calls.load(Ordering::SeqCst);
    let err = service
        .send_message(&user, session.id, "one more")
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::ChatCompleted));
    assert_eq!(gateway.chat_calls.load(Ordering::SeqCst), calls_before);
}

#[tokio::test]
async fn test_active_session_at_cap_is_rejected_defensively() {
    let (store, gateway, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    // Simulate a drifted record: at the cap but still marked active.
    store
        .append_exchange(
            session.id,
            ExchangeWrite {
                user_content: "q".to_string(),
                user_payload: None,
                ai_content: "a".to_string(),
                ai_payload: None,
                conversation_id: None,
                total_rounds: MAX_CHAT_ROUNDS,
                status: ChatStatus::Active,
                ended_at: None,
            },
        )
        .await
        .unwrap();

    let err = service
        .send_message(&user, session.id, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::RoundCapReached(_)));
    assert_eq!(gateway.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blank_message_rejected_without_network() {
    let (_, gateway, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    let err = service
        .send_message(&user, session.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::InvalidInput(_)));
    assert_eq!(gateway.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gateway_failure_leaves_transcript_untouched() {
    let (store, gateway, service) = setup();
    let user = alice();
    let (session, _) = service.start_session(&user, "", None).await.unwrap();

    gateway.fail_next();
    let err = service
        .send_message(&user, session.id, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::Gateway(_)));

    let messages = store.list_messages(session.id).await.unwrap();
    assert_eq!(messages.len(), 1); // greeting only
    let state = store.get_session(session.id, &user.id).await.unwrap().unwrap();
    assert_eq!(state.total_rounds, 0);
}

#[tokio::test]
async fn test_unknown_chat_and_foreign_user_are_not_found() {
    let (_, _, service) = setup();
    let user = alice();

    let err = service
        .send_message(&user, ObjectId::new(), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, LearnError::ChatNotFound));

    let (session, _) = service.start_session(&user, "", None).await.unwrap();
    let stranger = UserRef::new("u-2", "bob");
    let err = service.get_detail(&stranger, session.id).await.unwrap_err();
    assert!(matches!(err, LearnError::ChatNotFound));
}
