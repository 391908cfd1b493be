use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::authz::{self, PrivilegeLevel};
use crate::errors::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    AdminSearchQuery, AdminStats, SetAdminRequest, SystemSettings, UpdateSettingsRequest,
    UserProfile,
};
use crate::services::fetch_user;
use crate::store::{from_doc, to_doc, Collection, Filter, Sort};
use crate::AppState;

async fn require_global_admin(state: &AppState, uid: &str) -> AppResult<UserProfile> {
    let actor = fetch_user(&state.store, uid).await?;
    authz::require(
        authz::resolve(&actor, None, None, &state.config.admin_email),
        PrivilegeLevel::GlobalAdmin,
    )?;
    Ok(actor)
}

/// GET /api/admin/stats
pub async fn stats(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminStats>> {
    require_global_admin(&state, &identity.uid).await?;

    let (users, communities, sub_groups, groups, messages, posts) = tokio::try_join!(
        state.store.count(Collection::Users, &Filter::All),
        state.store.count(Collection::Communities, &Filter::All),
        state.store.count(Collection::SubGroups, &Filter::All),
        state.store.count(Collection::Groups, &Filter::All),
        state.store.count(Collection::Messages, &Filter::All),
        state.store.count(Collection::Posts, &Filter::All),
    )?;

    Ok(Json(AdminStats {
        total_users: users,
        total_communities: communities,
        total_sub_groups: sub_groups,
        total_groups: groups,
        total_messages: messages,
        total_posts: posts,
    }))
}

/// GET /api/admin/users
pub async fn list_users(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<AdminSearchQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    require_global_admin(&state, &identity.uid).await?;
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let docs = state
        .store
        .find_many(
            Collection::Users,
            &Filter::All,
            Some(&Sort::asc("email")),
            None,
        )
        .await?;

    let needle = params.search.map(|s| s.to_lowercase());
    let mut users = Vec::new();
    for doc in docs {
        let user: UserProfile = from_doc(doc)?;
        let keep = match &needle {
            Some(needle) => {
                user.email.to_lowercase().contains(needle)
                    || user.display_name().to_lowercase().contains(needle)
            }
            None => true,
        };
        if keep {
            users.push(user);
            if users.len() >= limit {
                break;
            }
        }
    }
    Ok(Json(users))
}

/// PUT /api/admin/users/:uid/admin
pub async fn set_admin(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(req): Json<SetAdminRequest>,
) -> AppResult<Json<Value>> {
    require_global_admin(&state, &identity.uid).await?;
    let target = fetch_user(&state.store, &uid).await?;

    // The configured admin identity stays admin no matter what.
    if target.email.eq_ignore_ascii_case(&state.config.admin_email) {
        return Err(AppError::Conflict(
            "The fixed admin identity cannot be modified".into(),
        ));
    }

    state
        .store
        .set_fields(
            Collection::Users,
            &Filter::field("uid", uid.as_str()),
            json!({"isAdmin": req.is_admin}),
        )
        .await?;
    Ok(Json(json!({"uid": uid, "isAdmin": req.is_admin})))
}

/// DELETE /api/admin/users/:uid
///
/// Removes the profile and sweeps the uid out of every membership and
/// admin roster.
pub async fn delete_user(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<Value>> {
    require_global_admin(&state, &identity.uid).await?;
    let target = fetch_user(&state.store, &uid).await?;
    if target.email.eq_ignore_ascii_case(&state.config.admin_email) {
        return Err(AppError::Conflict(
            "The fixed admin identity cannot be deleted".into(),
        ));
    }

    state
        .store
        .delete_one(Collection::Users, &Filter::field("uid", uid.as_str()))
        .await?;

    for field in ["members", "superAdmins"] {
        state
            .store
            .pull(Collection::Communities, &Filter::All, field, json!(uid))
            .await?;
    }
    for field in ["members", "groupAdmins"] {
        state
            .store
            .pull(Collection::SubGroups, &Filter::All, field, json!(uid))
            .await?;
    }
    for field in ["members", "admins", "bannedUsers"] {
        state
            .store
            .pull(Collection::Groups, &Filter::All, field, json!(uid))
            .await?;
    }

    Ok(Json(json!({"message": "User deleted"})))
}

/// POST /api/admin/users/:uid/super-admin-everywhere
pub async fn super_admin_everywhere(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> AppResult<Json<Value>> {
    require_global_admin(&state, &identity.uid).await?;
    fetch_user(&state.store, &uid).await?;

    let promoted = state
        .store
        .add_to_set(Collection::Communities, &Filter::All, "superAdmins", json!(uid))
        .await?;
    state
        .store
        .add_to_set(Collection::Communities, &Filter::All, "members", json!(uid))
        .await?;
    Ok(Json(json!({"communities": promoted})))
}

/// POST /api/admin/initialize-communities
pub async fn initialize_communities(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Value>> {
    require_global_admin(&state, &identity.uid).await?;
    let created = state.directory.seed().await?;
    Ok(Json(json!({"created": created})))
}

const SETTINGS_KIND: &str = "system";

async fn load_settings(state: &AppState) -> AppResult<SystemSettings> {
    let existing = state
        .store
        .find_one(Collection::Settings, &Filter::field("type", SETTINGS_KIND))
        .await?;
    match existing {
        Some(doc) => Ok(from_doc(doc)?),
        None => {
            let settings = SystemSettings {
                kind: SETTINGS_KIND.into(),
                app_name: "Agora".into(),
                admin_email: state.config.admin_email.clone(),
                max_file_size_mb: 10,
                allow_registration: true,
            };
            state
                .store
                .insert(Collection::Settings, to_doc(&settings)?)
                .await?;
            Ok(settings)
        }
    }
}

/// GET /api/admin/settings
pub async fn get_settings(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<SystemSettings>> {
    require_global_admin(&state, &identity.uid).await?;
    load_settings(&state).await.map(Json)
}

/// PUT /api/admin/settings
pub async fn update_settings(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SystemSettings>> {
    require_global_admin(&state, &identity.uid).await?;
    load_settings(&state).await?;

    let mut fields = serde_json::Map::new();
    if let Some(app_name) = req.app_name {
        fields.insert("appName".into(), json!(app_name));
    }
    if let Some(max) = req.max_file_size_mb {
        if max <= 0 {
            return Err(AppError::Validation("Max file size must be positive".into()));
        }
        fields.insert("maxFileSizeMb".into(), json!(max));
    }
    if let Some(allow) = req.allow_registration {
        fields.insert("allowRegistration".into(), json!(allow));
    }
    if !fields.is_empty() {
        state
            .store
            .set_fields(
                Collection::Settings,
                &Filter::field("type", SETTINGS_KIND),
                Value::Object(fields),
            )
            .await?;
    }
    load_settings(&state).await.map(Json)
}
