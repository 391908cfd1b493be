use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{RegisterRequest, UpdateProfileRequest, UserProfile};
use crate::services::fetch_user;
use crate::store::{Collection, Filter};
use crate::AppState;

/// POST /api/users/register
///
/// Creates the profile for a verified identity and joins the city
/// community (entering its public entry tier).
pub async fn register(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<UserProfile>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let existing = state
        .store
        .find_one(Collection::Users, &Filter::field("uid", identity.uid.as_str()))
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("User already registered".into()));
    }

    let profile = UserProfile {
        uid: identity.uid.clone(),
        email: identity.email.clone(),
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
        city: req.city,
        occupation: req.occupation,
        profile_image_url: None,
        is_admin: identity.email.eq_ignore_ascii_case(&state.config.admin_email),
        is_banned: false,
        is_restricted: false,
        restricted_until: None,
        groups: vec![],
        communities: vec![],
        created_at: Utc::now(),
    };
    state
        .store
        .insert(Collection::Users, crate::store::to_doc(&profile)?)
        .await?;

    let community = state.directory.ensure_city_community(&profile.city).await?;
    state.membership.join_community(&profile, &community.id).await?;

    fetch_user(&state.store, &identity.uid).await.map(Json)
}

/// GET /api/users/me
pub async fn me(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserProfile>> {
    fetch_user(&state.store, &identity.uid).await.map(Json)
}

/// PUT /api/users/me
pub async fn update_me(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserProfile>> {
    fetch_user(&state.store, &identity.uid).await?;

    let mut fields = serde_json::Map::new();
    if let Some(first_name) = req.first_name {
        if first_name.trim().is_empty() {
            return Err(AppError::Validation("First name cannot be empty".into()));
        }
        fields.insert("firstName".into(), json!(first_name.trim()));
    }
    if let Some(last_name) = req.last_name {
        if last_name.trim().is_empty() {
            return Err(AppError::Validation("Last name cannot be empty".into()));
        }
        fields.insert("lastName".into(), json!(last_name.trim()));
    }
    if let Some(phone) = req.phone {
        fields.insert("phone".into(), json!(phone));
    }
    if let Some(occupation) = req.occupation {
        fields.insert("occupation".into(), json!(occupation));
    }
    if let Some(url) = req.profile_image_url {
        fields.insert("profileImageUrl".into(), json!(url));
    }
    if !fields.is_empty() {
        state
            .store
            .set_fields(
                Collection::Users,
                &Filter::field("uid", identity.uid.as_str()),
                serde_json::Value::Object(fields),
            )
            .await?;
    }

    fetch_user(&state.store, &identity.uid).await.map(Json)
}

/// GET /api/users/:uid
pub async fn get_user(
    AuthUser(_identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<UserProfile>> {
    fetch_user(&state.store, &uid).await.map(Json)
}
