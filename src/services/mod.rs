//! Domain engines. Handlers stay thin; each engine owns the rules for one
//! slice of the domain and talks to the store and the event bus.

pub mod directory;
pub mod feed;
pub mod groups;
pub mod membership;
pub mod messages;

use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::models::{Community, LegacyGroup, Message, SubGroup, UserProfile};
use crate::store::{from_doc, Collection, DocumentStore, Filter};

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub async fn fetch_user(store: &Arc<dyn DocumentStore>, uid: &str) -> AppResult<UserProfile> {
    let doc = store
        .find_one(Collection::Users, &Filter::field("uid", uid))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(from_doc(doc)?)
}

pub async fn fetch_community(store: &Arc<dyn DocumentStore>, id: &str) -> AppResult<Community> {
    let doc = store
        .find_one(Collection::Communities, &Filter::id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".into()))?;
    Ok(from_doc(doc)?)
}

pub async fn fetch_sub_group(store: &Arc<dyn DocumentStore>, id: &str) -> AppResult<SubGroup> {
    let doc = store
        .find_one(Collection::SubGroups, &Filter::id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Sub-group not found".into()))?;
    Ok(from_doc(doc)?)
}

pub async fn fetch_group(store: &Arc<dyn DocumentStore>, id: &str) -> AppResult<LegacyGroup> {
    let doc = store
        .find_one(Collection::Groups, &Filter::id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Group not found".into()))?;
    Ok(from_doc(doc)?)
}

pub async fn fetch_message(store: &Arc<dyn DocumentStore>, id: &str) -> AppResult<Message> {
    let doc = store
        .find_one(Collection::Messages, &Filter::id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?;
    Ok(from_doc(doc)?)
}
