mod common;

use agora_backend::errors::AppError;
use agora_backend::models::{SendMessageRequest, UserProfile};
use agora_backend::realtime::chat_topic;
use agora_backend::services::messages::DELETED_MESSAGE_PLACEHOLDER;
use agora_backend::services::{fetch_message, fetch_user};
use common::TestApp;

async fn profile(app: &TestApp, uid: &str) -> UserProfile {
    fetch_user(&app.state().store, uid).await.unwrap()
}

fn text(content: &str) -> SendMessageRequest {
    SendMessageRequest {
        content: content.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn new_message_is_read_by_its_sender() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "hello").await;
    let message = fetch_message(&app.state().store, &id).await.unwrap();
    assert_eq!(message.read_by, vec!["alice".to_string()]);
    assert!(message.delivered_to.is_empty());
    assert_eq!(message.chat_id.as_deref(), Some("alice_bob"));
}

#[tokio::test]
async fn reply_snapshot_is_truncated_and_frozen() {
    let app = TestApp::new().await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let alice = profile(&app, "alice").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    let long = "x".repeat(150);
    let original = messages
        .send_private_message(&alice, "bob", text(&long))
        .await
        .unwrap();

    let mut req = text("re");
    req.reply_to = Some(original.id.clone());
    let reply = messages
        .send_private_message(&bob, "alice", req)
        .await
        .unwrap();

    assert_eq!(reply.reply_to_content.as_ref().unwrap().len(), 100);
    assert_eq!(reply.reply_to_sender_name.as_deref(), Some("Test alice"));

    // Editing the original does not change the snapshot.
    messages.edit(&alice, &original.id, "rewritten").await.unwrap();
    let reply = fetch_message(&app.state().store, &reply.id).await.unwrap();
    assert_eq!(reply.reply_to_content.as_ref().unwrap().len(), 100);
}

#[tokio::test]
async fn empty_content_without_attachment_is_rejected() {
    let app = TestApp::new().await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let alice = profile(&app, "alice").await;
    let err = app
        .state()
        .messages
        .send_private_message(&alice, "bob", text("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // A file message may have empty content.
    let mut req = text("");
    req.file_url = Some("https://cdn.example.com/doc.pdf".into());
    app.state()
        .messages
        .send_private_message(&alice, "bob", req)
        .await
        .unwrap();
}

#[tokio::test]
async fn mark_read_skips_own_messages_and_is_idempotent() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let a1 = app.send_private(&token, "bob", "one").await;
    let a2 = app.send_private(&token, "bob", "two").await;

    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    let count = messages.mark_chat_read(&bob, "alice").await.unwrap();
    assert_eq!(count, 2);

    for id in [&a1, &a2] {
        let message = fetch_message(&app.state().store, id).await.unwrap();
        assert!(message.read_by.contains(&"bob".to_string()));
        assert_eq!(message.status, agora_backend::models::DeliveryStatus::Read);
    }

    // Nothing left unread, so the second sweep touches nothing.
    let count = messages.mark_chat_read(&bob, "alice").await.unwrap();
    assert_eq!(count, 0);

    // The sender reading their own chat marks nothing.
    let alice = profile(&app, "alice").await;
    let count = messages.mark_chat_read(&alice, "bob").await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn mark_delivered_only_advances_sent_messages() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "hello").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    let count = messages.mark_chat_delivered(&bob, "alice").await.unwrap();
    assert_eq!(count, 1);
    let message = fetch_message(&app.state().store, &id).await.unwrap();
    assert_eq!(message.status, agora_backend::models::DeliveryStatus::Delivered);

    // Read messages never regress to delivered.
    messages.mark_chat_read(&bob, "alice").await.unwrap();
    let count = messages.mark_chat_delivered(&bob, "alice").await.unwrap();
    assert_eq!(count, 0);
    let message = fetch_message(&app.state().store, &id).await.unwrap();
    assert_eq!(message.status, agora_backend::models::DeliveryStatus::Read);
}

#[tokio::test]
async fn reaction_toggle_is_self_inverse() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "hello").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    let reactions = messages.react(&bob, &id, "👍").await.unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].emoji, "👍");

    // A different emoji from the same user coexists.
    let reactions = messages.react(&bob, &id, "🎉").await.unwrap();
    assert_eq!(reactions.len(), 2);

    let reactions = messages.react(&bob, &id, "👍").await.unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].emoji, "🎉");
}

#[tokio::test]
async fn edit_is_sender_only_and_keeps_history() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "first").await;
    let alice = profile(&app, "alice").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    let err = messages.edit(&bob, &id, "hijacked").await.unwrap_err();
    assert!(matches!(err, AppError::NotAllowed(_)));

    let err = messages.edit(&alice, &id, "  ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let updated = messages.edit(&alice, &id, "second").await.unwrap();
    assert!(updated.is_edited);
    assert_eq!(updated.content, "second");
    assert_eq!(updated.edit_history.len(), 1);
    assert_eq!(updated.edit_history[0].content, "first");

    let updated = messages.edit(&alice, &id, "third").await.unwrap();
    assert_eq!(updated.edit_history.len(), 2);
    assert_eq!(updated.edit_history[1].content, "second");
}

#[tokio::test]
async fn delete_for_me_masks_content_only_for_that_viewer() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "hello").await;
    let alice = profile(&app, "alice").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    messages.delete_for_me(&bob, &id).await.unwrap();

    // The message stays in bob's history as a placeholder.
    let for_bob = messages.private_messages(&bob, "alice").await.unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].content, DELETED_MESSAGE_PLACEHOLDER);
    assert!(for_bob[0].is_deleted);

    let for_alice = messages.private_messages(&alice, "bob").await.unwrap();
    assert_eq!(for_alice.len(), 1);
    assert_eq!(for_alice[0].content, "hello");
    assert!(!for_alice[0].is_deleted);

    // The stored document keeps the original content; the overlay is
    // projection-time only. Repeating is harmless.
    messages.delete_for_me(&bob, &id).await.unwrap();
    let message = fetch_message(&app.state().store, &id).await.unwrap();
    assert_eq!(message.content, "hello");
    assert!(!message.is_deleted);
    assert_eq!(message.deleted_for, vec!["bob".to_string()]);
}

#[tokio::test]
async fn history_returns_the_newest_page_oldest_first() {
    let app = TestApp::new().await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let alice = profile(&app, "alice").await;
    let messages = &app.state().messages;

    let page_size = app.state().config.message_page_size;
    let total = page_size + 5;
    for n in 1..=total {
        messages
            .send_private_message(&alice, "bob", text(&format!("m{n}")))
            .await
            .unwrap();
    }

    let listed = messages.private_messages(&alice, "bob").await.unwrap();
    assert_eq!(listed.len(), page_size);
    // The oldest five fall off the page; the rest come back in send order.
    assert_eq!(listed[0].content, "m6");
    assert_eq!(listed[page_size - 1].content, format!("m{total}"));
}

#[tokio::test]
async fn delete_for_everyone_is_terminal() {
    let app = TestApp::new().await;
    let token = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&token, "bob", "first").await;
    let alice = profile(&app, "alice").await;
    let bob = profile(&app, "bob").await;
    let messages = &app.state().messages;

    // Edit first so the history survives the delete.
    messages.edit(&alice, &id, "second").await.unwrap();

    let err = messages.delete_for_everyone(&bob, &id).await.unwrap_err();
    assert!(matches!(err, AppError::NotAllowed(_)));

    messages.delete_for_everyone(&alice, &id).await.unwrap();
    let message = fetch_message(&app.state().store, &id).await.unwrap();
    assert!(message.deleted_for_everyone);
    assert!(message.is_deleted);
    assert_eq!(message.content, DELETED_MESSAGE_PLACEHOLDER);
    assert_eq!(message.edit_history.len(), 1);

    let err = messages.edit(&alice, &id, "again").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn group_admin_can_delete_for_everyone() {
    let app = TestApp::new().await;
    let _admin_token = app.register_admin("admin", "Ankara").await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("mod", "mod@example.com", "Ankara").await;
    let community_id = app.community_id(&_admin_token, "Ankara").await;
    let sub_groups = app.sub_groups(&_admin_token, &community_id).await;
    let entry_id = sub_groups[0]["id"].as_str().unwrap().to_string();

    let admin = profile(&app, "admin").await;
    app.state()
        .membership
        .add_sub_group_admin(&admin, &entry_id, "mod")
        .await
        .unwrap();

    let alice = profile(&app, "alice").await;
    let moderator = profile(&app, "mod").await;
    let messages = &app.state().messages;

    let message = messages
        .send_sub_group_message(&alice, &entry_id, text("to be moderated"))
        .await
        .unwrap();
    messages.delete_for_everyone(&moderator, &message.id).await.unwrap();

    let message = fetch_message(&app.state().store, &message.id).await.unwrap();
    assert_eq!(message.content, DELETED_MESSAGE_PLACEHOLDER);
}

#[tokio::test]
async fn sub_group_history_requires_membership() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let community_id = app.community_id(&admin_token, "Ankara").await;
    let sub_groups = app.sub_groups(&admin_token, &community_id).await;
    let entry_id = sub_groups[0]["id"].as_str().unwrap().to_string();
    let growth_id = sub_groups[1]["id"].as_str().unwrap().to_string();

    let admin = profile(&app, "admin").await;
    let alice = profile(&app, "alice").await;
    let messages = &app.state().messages;

    messages
        .send_sub_group_message(&admin, &growth_id, text("tier talk"))
        .await
        .unwrap();

    // Alice sits in the entry tier; the private tier refuses her the same
    // way it refuses her posts.
    let err = messages.sub_group_messages(&alice, &growth_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotAllowed(_)));

    // Promotion into the tier grants access.
    app.state()
        .membership
        .promote(&admin, &entry_id, "alice")
        .await
        .unwrap();
    let listed = messages.sub_group_messages(&alice, &growth_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "tier talk");

    // Global and super admins read without tier membership.
    let listed = messages.sub_group_messages(&admin, &growth_id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn pin_toggle_mirrors_legacy_group_roster() {
    let app = TestApp::new().await;
    let _admin_token = app.register_admin("admin", "Ankara").await;

    let admin = profile(&app, "admin").await;
    let state = app.state();
    let groups = state.groups.list(&admin).await.unwrap();
    let group_id = groups[0].group.id.clone();
    state.groups.join(&admin, &group_id).await.unwrap();

    let message = state
        .messages
        .send_group_message(&admin, &group_id, text("pin me"))
        .await
        .unwrap();

    assert!(state.messages.pin(&admin, &message.id).await.unwrap());
    let pinned = state.messages.pinned_messages(&admin, &group_id).await.unwrap();
    assert_eq!(pinned.len(), 1);
    let group = state.groups.get(&admin, &group_id).await.unwrap();
    assert_eq!(group.group.pinned_messages, vec![message.id.clone()]);

    assert!(!state.messages.pin(&admin, &message.id).await.unwrap());
    let group = state.groups.get(&admin, &group_id).await.unwrap();
    assert!(group.group.pinned_messages.is_empty());
}

#[tokio::test]
async fn sending_publishes_after_persisting() {
    let app = TestApp::new().await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let _ = app.register_user("bob", "bob@example.com", "Ankara").await;

    let topic = chat_topic("alice", "bob");
    let mut rx = app.state().events.subscribe(&topic);

    let alice = profile(&app, "alice").await;
    let sent = app
        .state()
        .messages
        .send_private_message(&alice, "bob", text("hello"))
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.event, "new_private_message");
    assert_eq!(event.payload["id"], sent.id.as_str());
    // The message is already durable when the event arrives.
    fetch_message(&app.state().store, &sent.id).await.unwrap();
}

#[tokio::test]
async fn announcements_require_super_admin() {
    let app = TestApp::new().await;
    let _admin_token = app.register_admin("admin", "Ankara").await;
    let _ = app.register_user("alice", "alice@example.com", "Ankara").await;
    let community_id = app.community_id(&_admin_token, "Ankara").await;

    let alice = profile(&app, "alice").await;
    let admin = profile(&app, "admin").await;
    let messages = &app.state().messages;

    let err = messages
        .send_announcement(&alice, &community_id, text("not allowed"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    let sent = messages
        .send_announcement(&admin, &community_id, text("welcome"))
        .await
        .unwrap();
    assert_eq!(sent.kind, agora_backend::models::MessageKind::Announcement);

    let listed = messages.announcements(&alice, &community_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "welcome");
}
