mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, _) = app
        .request(Method::GET, "/api/users/me", Some("bogus"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;

    let body = json!({"firstName": "Test", "lastName": "u1", "city": "Ankara"});
    let (status, value) = app
        .request(Method::POST, "/api/users/register", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["status"], 409);
}

#[tokio::test]
async fn registration_validates_fields() {
    let app = TestApp::new().await;
    let token = "token-bad";
    // Identity exists but the profile payload is invalid.
    app.verifier.register(token, "bad", "bad@example.com");

    let body = json!({"firstName": "", "lastName": "x", "city": "Ankara"});
    let (status, _) = app
        .request(Method::POST, "/api/users/register", Some(token), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_update_round_trips() {
    let app = TestApp::new().await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;

    let body = json!({"occupation": "plumber", "phone": "+90 555 000 0000"});
    let (status, value) = app
        .request(Method::PUT, "/api/users/me", Some(&token), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["occupation"], "plumber");

    let (status, value) = app.request(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["occupation"], "plumber");
    assert_eq!(value["phone"], "+90 555 000 0000");
    assert_eq!(value["city"], "Ankara");
}

#[tokio::test]
async fn community_join_and_leave_over_http() {
    let app = TestApp::new().await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;
    let other = app.community_id(&token, "Bursa").await;

    let uri = format!("/api/communities/{other}/join");
    let (status, _) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/communities/{other}");
    let (status, value) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["community"]["isMember"], true);

    let uri = format!("/api/communities/{other}/leave");
    let (status, _) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/communities/{other}");
    let (status, value) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["community"]["isMember"], false);
}

#[tokio::test]
async fn join_request_flow_over_http() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;
    let community_id = app.community_id(&token, "Ankara").await;
    let sub_groups = app.sub_groups(&token, &community_id).await;
    let growth_id = sub_groups[1]["id"].as_str().unwrap();

    let uri = format!("/api/subgroups/{growth_id}/request-join");
    let (status, value) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["outcome"], "pending");
    let request_id = value["requestId"].as_str().unwrap().to_string();

    let uri = format!("/api/subgroups/{growth_id}/requests");
    let (status, value) = app.request(Method::GET, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value.as_array().unwrap().len(), 1);

    let uri = format!("/api/subgroups/{growth_id}/requests/{request_id}/approve");
    let (status, _) = app.request(Method::POST, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/subgroups/{growth_id}");
    let (status, value) = app.request(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["isMember"], true);
}

#[tokio::test]
async fn private_messaging_over_http() {
    let app = TestApp::new().await;
    let alice = app.register_user("alice", "alice@example.com", "Ankara").await;
    let bob = app.register_user("bob", "bob@example.com", "Ankara").await;

    let id = app.send_private(&alice, "bob", "hello bob").await;

    let (status, value) = app
        .request(Method::GET, "/api/messages/private/alice", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = value.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], id.as_str());
    assert_eq!(history[0]["content"], "hello bob");
    assert_eq!(history[0]["status"], "sent");

    let (status, value) = app
        .request(Method::POST, "/api/messages/private/alice/read", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["markedRead"], 1);

    let (status, value) = app
        .request(Method::GET, "/api/messages/private/bob", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value[0]["status"], "read");
}

#[tokio::test]
async fn sub_group_message_read_counts_over_http() {
    let app = TestApp::new().await;
    let alice = app.register_user("alice", "alice@example.com", "Ankara").await;
    let bob = app.register_user("bob", "bob@example.com", "Ankara").await;
    let community_id = app.community_id(&alice, "Ankara").await;
    let sub_groups = app.sub_groups(&alice, &community_id).await;
    let entry_id = sub_groups[0]["id"].as_str().unwrap();

    let uri = format!("/api/subgroups/{entry_id}/messages");
    let (status, _) = app
        .request(Method::POST, &uri, Some(&alice), Some(json!({"content": "hi all"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/subgroups/{entry_id}/messages");
    let (status, value) = app.request(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value.as_array().unwrap().len(), 1);

    // Members only; an outsider gets a refusal, not the history.
    let charlie = app.register_user("charlie", "charlie@example.com", "Bursa").await;
    let (status, _) = app.request(Method::GET, &uri, Some(&charlie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/subgroups/{entry_id}/read");
    let (status, value) = app.request(Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["markedRead"], 1);

    // Second sweep finds nothing unread.
    let (status, value) = app.request(Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["markedRead"], 0);
}

#[tokio::test]
async fn banned_user_cannot_rejoin_or_post() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;

    let (status, value) = app.request(Method::GET, "/api/groups", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let group_id = value[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/groups/{group_id}/join");
    let (status, _) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/groups/{group_id}/ban/u1");
    let (status, _) = app.request(Method::POST, &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/groups/{group_id}/messages");
    let (status, _) = app
        .request(Method::POST, &uri, Some(&token), Some(json!({"content": "hi"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/groups/{group_id}/join");
    let (status, _) = app.request(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn feed_post_like_and_comment() {
    let app = TestApp::new().await;
    let alice = app.register_user("alice", "alice@example.com", "Ankara").await;
    let bob = app.register_user("bob", "bob@example.com", "Ankara").await;

    let (status, post) = app
        .request(
            Method::POST,
            "/api/posts",
            Some(&alice),
            Some(json!({"content": "first post"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let post_id = post["id"].as_str().unwrap().to_string();

    let uri = format!("/api/posts/{post_id}/like");
    let (status, value) = app.request(Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["likes"], 1);
    // Like again to toggle off.
    let (_, value) = app.request(Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(value["likes"], 0);

    let uri = format!("/api/posts/{post_id}/comments");
    let (status, _) = app
        .request(Method::POST, &uri, Some(&bob), Some(json!({"content": "nice"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, value) = app.request(Method::GET, "/api/posts", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = value.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["commentCount"], 1);
}

#[tokio::test]
async fn poll_vote_over_http() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let voter = app.register_user("u1", "u1@example.com", "Ankara").await;

    let (_, value) = app.request(Method::GET, "/api/groups", Some(&admin_token), None).await;
    let group_id = value[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/groups/{group_id}/polls");
    let (status, poll) = app
        .request(
            Method::POST,
            &uri,
            Some(&admin_token),
            Some(json!({"question": "Next meetup?", "options": ["Saturday", "Sunday"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "Create poll failed: {}", poll);
    let poll_id = poll["id"].as_str().unwrap().to_string();
    let first = poll["options"][0]["id"].as_str().unwrap().to_string();
    let second = poll["options"][1]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/polls/{poll_id}/vote");
    let (status, value) = app
        .request(Method::POST, &uri, Some(&voter), Some(json!({"optionId": first})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["options"][0]["votes"][0], "u1");

    // Single-choice: voting for the other option moves the vote.
    let (status, value) = app
        .request(Method::POST, &uri, Some(&voter), Some(json!({"optionId": second})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(value["options"][0]["votes"].as_array().unwrap().is_empty());
    assert_eq!(value["options"][1]["votes"][0], "u1");
}

#[tokio::test]
async fn upload_returns_a_cdn_descriptor() {
    let app = TestApp::new().await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;

    let (status, value) = app
        .request(
            Method::POST,
            "/api/upload",
            Some(&token),
            Some(json!({"fileName": "report.pdf", "fileSize": 1024})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["fileName"], "report.pdf");
    assert!(value["url"].as_str().unwrap().ends_with("/report.pdf"));

    let (status, _) = app
        .request(Method::POST, "/api/upload", Some(&token), Some(json!({"fileName": "  "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_surface_requires_global_admin() {
    let app = TestApp::new().await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;

    for uri in ["/api/admin/stats", "/api/admin/users", "/api/admin/settings"] {
        let (status, _) = app.request(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri} should be admin-only");
    }
}

#[tokio::test]
async fn admin_stats_count_collections() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let _ = app.register_user("u1", "u1@example.com", "Ankara").await;

    let (status, value) = app
        .request(Method::GET, "/api/admin/stats", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["totalUsers"], 2);
    assert_eq!(value["totalCommunities"], 81);
    assert_eq!(value["totalSubGroups"], 81 * 4);
}

#[tokio::test]
async fn fixed_admin_identity_cannot_be_demoted() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let _ = app.register_user("u1", "u1@example.com", "Ankara").await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/admin/users/u1/admin",
            Some(&admin_token),
            Some(json!({"isAdmin": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/admin/users/admin/admin",
            Some(&admin_token),
            Some(json!({"isAdmin": false})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_a_user_sweeps_rosters() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;
    let token = app.register_user("u1", "u1@example.com", "Ankara").await;
    let community_id = app.community_id(&token, "Ankara").await;

    let (status, _) = app
        .request(Method::DELETE, "/api/admin/users/u1", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.request(Method::GET, "/api/users/u1", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let sub_groups = app.sub_groups(&admin_token, &community_id).await;
    for sg in &sub_groups {
        assert!(!sg["members"].as_array().unwrap().contains(&"u1".into()));
    }
    let uri = format!("/api/communities/{community_id}");
    let (_, value) = app.request(Method::GET, &uri, Some(&admin_token), None).await;
    assert!(!value["community"]["members"]
        .as_array()
        .unwrap()
        .contains(&"u1".into()));
}

#[tokio::test]
async fn settings_lazily_default_and_update() {
    let app = TestApp::new().await;
    let admin_token = app.register_admin("admin", "Ankara").await;

    let (status, value) = app
        .request(Method::GET, "/api/admin/settings", Some(&admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["allowRegistration"], true);

    let (status, value) = app
        .request(
            Method::PUT,
            "/api/admin/settings",
            Some(&admin_token),
            Some(json!({"maxFileSizeMb": 25})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["maxFileSizeMb"], 25);

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/admin/settings",
            Some(&admin_token),
            Some(json!({"maxFileSizeMb": 0})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
