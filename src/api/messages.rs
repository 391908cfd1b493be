use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{
    EditMessageRequest, Message, ReactRequest, Reaction, SendPrivateMessageRequest, TypingRequest,
};
use crate::services::fetch_user;
use crate::AppState;

/// POST /api/messages/private
pub async fn send_private(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendPrivateMessageRequest>,
) -> AppResult<Json<Message>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .send_private_message(&actor, &req.receiver_id, req.message)
        .await
        .map(Json)
}

/// GET /api/messages/private/:uid
pub async fn private_history(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(other_uid): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.messages.private_messages(&viewer, &other_uid).await.map(Json)
}

/// POST /api/messages/private/:uid/read
pub async fn mark_private_read(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(other_uid): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state.messages.mark_chat_read(&viewer, &other_uid).await?;
    Ok(Json(json!({"markedRead": count})))
}

/// POST /api/messages/private/:uid/delivered
pub async fn mark_private_delivered(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(other_uid): Path<String>,
) -> AppResult<Json<Value>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    let count = state.messages.mark_chat_delivered(&viewer, &other_uid).await?;
    Ok(Json(json!({"markedDelivered": count})))
}

/// POST /api/messages/private/:uid/typing
pub async fn private_typing(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(other_uid): Path<String>,
    Json(req): Json<TypingRequest>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .typing_in_chat(&actor, &other_uid, req.is_typing)
        .await;
    Ok(Json(json!({"message": "ok"})))
}

/// POST /api/messages/:id/react
pub async fn react(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<ReactRequest>,
) -> AppResult<Json<Vec<Reaction>>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .react(&actor, &message_id, &req.emoji)
        .await
        .map(Json)
}

/// PUT /api/messages/:id
pub async fn edit(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(req): Json<EditMessageRequest>,
) -> AppResult<Json<Message>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state
        .messages
        .edit(&actor, &message_id, &req.content)
        .await
        .map(Json)
}

/// POST /api/messages/:id/pin
pub async fn pin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    let pinned = state.messages.pin(&actor, &message_id).await?;
    Ok(Json(json!({"isPinned": pinned})))
}

/// POST /api/messages/:id/delete-for-me
pub async fn delete_for_me(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.messages.delete_for_me(&actor, &message_id).await?;
    Ok(Json(json!({"message": "Message hidden"})))
}

/// POST /api/messages/:id/delete-for-everyone
pub async fn delete_for_everyone(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.messages.delete_for_everyone(&actor, &message_id).await?;
    Ok(Json(json!({"message": "Message deleted"})))
}
