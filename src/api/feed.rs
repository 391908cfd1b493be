use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{
    Comment, CreateCommentRequest, CreatePostRequest, CreateServiceRequest, Poll, Post, PostView,
    ServiceListing, VoteRequest,
};
use crate::services::fetch_user;
use crate::AppState;

/// POST /api/posts
pub async fn create_post(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<Post>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.create_post(&actor, req).await.map(Json)
}

/// GET /api/posts
pub async fn list_posts(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PostView>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.feed.list_posts(&viewer).await.map(Json)
}

/// POST /api/posts/:id/like
pub async fn like_post(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    let likes = state.feed.like_post(&actor, &post_id).await?;
    Ok(Json(json!({"likes": likes})))
}

/// POST /api/posts/:id/share
pub async fn share_post(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let shares = state.feed.share_post(&post_id).await?;
    Ok(Json(json!({"shares": shares})))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.delete_post(&actor, &post_id).await?;
    Ok(Json(json!({"message": "Post deleted"})))
}

/// POST /api/posts/:id/comments
pub async fn create_comment(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Json<Comment>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.create_comment(&actor, &post_id, req).await.map(Json)
}

/// GET /api/posts/:id/comments
pub async fn list_comments(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Comment>>> {
    state.feed.list_comments(&post_id).await.map(Json)
}

/// POST /api/comments/:id/like
pub async fn like_comment(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    let likes = state.feed.like_comment(&actor, &comment_id).await?;
    Ok(Json(json!({"likes": likes})))
}

/// DELETE /api/comments/:id
pub async fn delete_comment(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.delete_comment(&actor, &comment_id).await?;
    Ok(Json(json!({"message": "Comment deleted"})))
}

/// POST /api/services
pub async fn create_service(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateServiceRequest>,
) -> AppResult<Json<ServiceListing>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.create_service(&actor, req).await.map(Json)
}

/// GET /api/services
pub async fn list_services(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ServiceListing>>> {
    let viewer = fetch_user(&state.store, &identity.uid).await?;
    state.feed.list_services(&viewer).await.map(Json)
}

/// DELETE /api/services/:id
pub async fn delete_service(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.delete_service(&actor, &service_id).await?;
    Ok(Json(json!({"message": "Service deleted"})))
}

/// POST /api/polls/:id/vote
pub async fn vote(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<Json<Poll>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.vote(&actor, &poll_id, &req.option_id).await.map(Json)
}

/// DELETE /api/polls/:id
pub async fn delete_poll(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<Value>> {
    let actor = fetch_user(&state.store, &identity.uid).await?;
    state.feed.delete_poll(&actor, &poll_id).await?;
    Ok(Json(json!({"message": "Poll deleted"})))
}
