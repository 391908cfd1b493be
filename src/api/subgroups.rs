use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{
    JoinRequest, Message, SendMessageRequest, SubGroup, SubGroupView, TypingRequest,
    UpdateSubGroupRequest,
};
use crate::services::membership::JoinOutcome;
use crate::services::{fetch_sub_group, fetch_user};
use crate::AppState;

/// GET /api/subgroups/:id
pub async fn get(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<SubGroupView>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let sub_group = fetch_sub_group(&state.store, &sub_group_id).await?;
    Ok(Json(SubGroupView::for_viewer(sub_group, &viewer.uid)))
}

/// PUT /api/subgroups/:id
pub async fn update(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
    Json(req): Json<UpdateSubGroupRequest>,
) -> AppResult<Json<SubGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .update_sub_group(&actor, &sub_group_id, req)
        .await
        .map(Json)
}

/// DELETE /api/subgroups/:id
pub async fn delete(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.delete_sub_group(&actor, &sub_group_id).await?;
    Ok(Json(json!({"message": "Sub-group deleted"})))
}

/// POST /api/subgroups/:id/request-join
pub async fn request_join(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<JoinOutcome>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.request_join(&actor, &sub_group_id).await.map(Json)
}

/// GET /api/subgroups/:id/requests
pub async fn pending_requests(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Vec<JoinRequest>>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .pending_requests(&actor, &sub_group_id)
        .await
        .map(Json)
}

/// POST /api/subgroups/:id/requests/:request_id/approve
pub async fn approve_request(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, request_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .handle_request(&actor, &sub_group_id, &request_id, true)
        .await?;
    Ok(Json(json!({"message": "Request approved"})))
}

/// POST /api/subgroups/:id/requests/:request_id/reject
pub async fn reject_request(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, request_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .handle_request(&actor, &sub_group_id, &request_id, false)
        .await?;
    Ok(Json(json!({"message": "Request rejected"})))
}

/// POST /api/subgroups/:id/promote/:uid
pub async fn promote(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<SubGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.promote(&actor, &sub_group_id, &uid).await.map(Json)
}

/// POST /api/subgroups/:id/demote/:uid
pub async fn demote(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<SubGroup>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.demote(&actor, &sub_group_id, &uid).await.map(Json)
}

/// POST /api/subgroups/:id/members/:uid
pub async fn add_member(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.add_member(&actor, &sub_group_id, &uid).await?;
    Ok(Json(json!({"message": "Member added"})))
}

/// DELETE /api/subgroups/:id/members/:uid
pub async fn remove_member(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.remove_member(&actor, &sub_group_id, &uid).await?;
    Ok(Json(json!({"message": "Member removed"})))
}

/// POST /api/subgroups/:id/admins/:uid
pub async fn add_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .add_sub_group_admin(&actor, &sub_group_id, &uid)
        .await?;
    Ok(Json(json!({"message": "Admin added"})))
}

/// DELETE /api/subgroups/:id/admins/:uid
pub async fn remove_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path((sub_group_id, uid)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .membership
        .remove_sub_group_admin(&actor, &sub_group_id, &uid)
        .await?;
    Ok(Json(json!({"message": "Admin removed"})))
}

/// POST /api/subgroups/:id/leave
pub async fn leave(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.membership.leave_sub_group(&actor, &sub_group_id).await?;
    Ok(Json(json!({"message": "Left sub-group"})))
}

/// GET /api/subgroups/:id/messages
pub async fn messages(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.messages.sub_group_messages(&viewer, &sub_group_id).await.map(Json)
}

/// POST /api/subgroups/:id/messages
pub async fn send_message(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .send_sub_group_message(&actor, &sub_group_id, req)
        .await
        .map(Json)
}

/// POST /api/subgroups/:id/read
pub async fn mark_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state.messages.mark_group_read(&viewer, &sub_group_id).await?;
    Ok(Json(json!({"markedRead": count})))
}

/// POST /api/subgroups/:id/delivered
pub async fn mark_delivered(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state
        .messages
        .mark_group_delivered(&viewer, &sub_group_id)
        .await?;
    Ok(Json(json!({"markedDelivered": count})))
}

/// POST /api/subgroups/:id/typing
pub async fn typing(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(sub_group_id): Path<String>,
    Json(req): Json<TypingRequest>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .typing_in_group(&actor, &sub_group_id, req.is_typing)
        .await;
    Ok(Json(json!({"message": "ok"})))
}
