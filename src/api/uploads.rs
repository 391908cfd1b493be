use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::new_id;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// POST /api/upload
///
/// Blob storage is out of scope; this hands back a CDN descriptor the
/// client embeds in file messages.
pub async fn upload(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> AppResult<Json<Value>> {
    crate::services::fetch_user(&state.store, &identity.uid).await?;
    let name = req.file_name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("File name cannot be empty".into()));
    }
    Ok(Json(json!({
        "url": format!("https://cdn.agora.invalid/{}/{}", new_id(), name),
        "fileName": name,
        "contentType": req.content_type,
        "fileSize": req.file_size,
    })))
}
