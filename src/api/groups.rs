use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{
    CreateGroupRequest, CreatePollRequest, LegacyGroup, LegacyGroupView, Message, Poll,
    RestrictRequest, SendMessageRequest, TypingRequest, UpdateGroupRequest,
};
use crate::services::fetch_user;
use crate::AppState;

/// GET /api/groups
pub async fn list(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<LegacyGroupView>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.groups.list(&viewer).await.map(Json)
}

/// GET /api/groups/:id
pub async fn get(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<LegacyGroupView>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.groups.get(&viewer, &group_id).await.map(Json)
}

/// POST /api/groups
pub async fn create(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> AppResult<Json<LegacyGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.create(&actor, req).await.map(Json)
}

/// PUT /api/groups/:id
pub async fn update(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> AppResult<Json<LegacyGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.update_settings(&actor, &group_id, req).await.map(Json)
}

/// DELETE /api/groups/:id
pub async fn delete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.delete(&actor, &group_id).await?;
    Ok(Json(json!({"message": "Group deleted"})))
}

/// POST /api/groups/:id/join
pub async fn join(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.join(&actor, &group_id).await?;
    Ok(Json(json!({"message": "Joined group"})))
}

/// POST /api/groups/:id/leave
pub async fn leave(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.leave(&actor, &group_id).await?;
    Ok(Json(json!({"message": "Left group"})))
}

/// GET /api/groups/:id/messages
pub async fn messages(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.messages.group_messages(&viewer, &group_id).await.map(Json)
}

/// POST /api/groups/:id/messages
pub async fn send_message(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .send_group_message(&actor, &group_id, req)
        .await
        .map(Json)
}

/// POST /api/groups/:id/read
pub async fn mark_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state.messages.mark_group_read(&viewer, &group_id).await?;
    Ok(Json(json!({"markedRead": count})))
}

/// POST /api/groups/:id/delivered
pub async fn mark_delivered(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state.messages.mark_group_delivered(&viewer, &group_id).await?;
    Ok(Json(json!({"markedDelivered": count})))
}

/// POST /api/groups/:id/typing
pub async fn typing(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<TypingRequest>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .typing_in_group(&actor, &group_id, req.is_typing)
        .await;
    Ok(Json(json!({"message": "ok"})))
}

/// GET /api/groups/:id/pins
pub async fn pins(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.messages.pinned_messages(&viewer, &group_id).await.map(Json)
}

/// POST /api/groups/:id/ban/:uid
pub async fn ban(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.ban(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "User banned"})))
}

/// POST /api/groups/:id/unban/:uid
pub async fn unban(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.unban(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "User unbanned"})))
}

/// POST /api/groups/:id/restrict/:uid
pub async fn restrict(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
    Json(req): Json<RestrictRequest>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.restrict(&actor, &group_id, &uid, req).await?;
    Ok(Json(json!({"message": "User restricted"})))
}

/// POST /api/groups/:id/unrestrict/:uid
pub async fn unrestrict(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.unrestrict(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "User unrestricted"})))
}

/// POST /api/groups/:id/kick/:uid
pub async fn kick(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.kick(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "User kicked"})))
}

/// POST /api/groups/:id/admins/:uid
pub async fn add_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.add_admin(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "Admin added"})))
}

/// DELETE /api/groups/:id/admins/:uid
pub async fn remove_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.groups.remove_admin(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"message": "Admin removed"})))
}

/// DELETE /api/groups/:id/messages/:uid
pub async fn delete_user_messages(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    let removed = state.groups.delete_user_messages(&actor, &group_id, &uid).await?;
    Ok(Json(json!({"deleted": removed})))
}

/// POST /api/groups/:id/polls
pub async fn create_poll(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<Json<Poll>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.create_poll(&actor, &group_id, req).await.map(Json)
}

/// GET /api/groups/:id/polls
pub async fn list_polls(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> AppResult<Json<Vec<Poll>>> {
    state.feed.list_polls(&group_id).await.map(Json)
}
