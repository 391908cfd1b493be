use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{CommunityView, CreateSubGroupRequest, Message, SendMessageRequest, SubGroup};
use crate::services::fetch_user;
use crate::AppState;

/// GET /api/communities
pub async fn list(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CommunityView>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.membership.list_communities(&viewer).await.map(Json)
}

/// GET /api/communities/:id
pub async fn get(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let (community, sub_groups) = state.membership.get_community(&viewer, &community_id).await?;
    Ok(Json(json!({
        "community": community,
        "subGroups": sub_groups,
    })))
}

/// POST /api/communities/:id/join
pub async fn join(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.join_community(&actor, &community_id).await?;
    Ok(Json(json!({"message": "Joined community"})))
}

/// POST /api/communities/:id/leave
pub async fn leave(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.leave_community(&actor, &community_id).await?;
    Ok(Json(json!({"message": "Left community"})))
}

/// GET /api/communities/:id/announcements
pub async fn announcements(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.messages.announcements(&viewer, &community_id).await.map(Json)
}

/// POST /api/communities/:id/announcements
pub async fn post_announcement(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .send_announcement(&actor, &community_id, req)
        .await
        .map(Json)
}

/// POST /api/communities/:id/super-admins/:uid
pub async fn add_super_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((community_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .add_super_admin(&actor, &community_id, &uid)
        .await?;
    Ok(Json(json!({"message": "Super admin added"})))
}

/// DELETE /api/communities/:id/super-admins/:uid
pub async fn remove_super_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((community_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .remove_super_admin(&actor, &community_id, &uid)
        .await?;
    Ok(Json(json!({"message": "Super admin removed"})))
}

/// POST /api/communities/:id/subgroups
pub async fn create_sub_group(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    Json(req): Json<CreateSubGroupRequest>,
) -> AppResult<Json<SubGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .create_sub_group(&actor, &community_id, req)
        .await
        .map(Json)
}
