//! Legacy flat groups and their moderation surface.
//!
//! These predate the community ladder: a single membership list with
//! group admins, bans, timed restrictions, and a pinned-message set.
//! Group creation and deletion is reserved for the global admin; admin
//! roster changes additionally allow the group creator.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::authz::{self, PrivilegeLevel};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateGroupRequest, LegacyGroup, LegacyGroupView, RestrictRequest, RestrictedEntry,
    UpdateGroupRequest, UserProfile,
};
use crate::store::{from_doc, to_doc, Collection, DocumentStore, Filter, Sort};

use super::{fetch_group, new_id};

#[derive(Clone)]
pub struct Groups {
    store: Arc<dyn DocumentStore>,
    admin_email: String,
}

impl Groups {
    pub fn new(store: Arc<dyn DocumentStore>, admin_email: String) -> Self {
        Self { store, admin_email }
    }

    fn require_moderator(&self, actor: &UserProfile, group: &LegacyGroup) -> AppResult<()> {
        authz::require(
            authz::resolve_legacy(actor, group, &self.admin_email),
            PrivilegeLevel::SubGroupAdmin,
        )
    }

    fn require_roster_control(&self, actor: &UserProfile, group: &LegacyGroup) -> AppResult<()> {
        if authz::is_global_admin(actor, &self.admin_email) || group.created_by == actor.uid {
            Ok(())
        } else {
            Err(AppError::NotAllowed(
                "Only the global admin or the group creator can manage admins".into(),
            ))
        }
    }

    // ─── Listing / membership ──────────────────────────

    pub async fn list(&self, viewer: &UserProfile) -> AppResult<Vec<LegacyGroupView>> {
        let docs = self
            .store
            .find_many(Collection::Groups, &Filter::All, Some(&Sort::asc("name")), None)
            .await?;
        let mut views = Vec::with_capacity(docs.len());
        for doc in docs {
            let group: LegacyGroup = from_doc(doc)?;
            views.push(LegacyGroupView::for_viewer(group, &viewer.uid));
        }
        Ok(views)
    }

    pub async fn get(&self, viewer: &UserProfile, group_id: &str) -> AppResult<LegacyGroupView> {
        let group = fetch_group(&self.store, group_id).await?;
        Ok(LegacyGroupView::for_viewer(group, &viewer.uid))
    }

    pub async fn join(&self, actor: &UserProfile, group_id: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        if group.banned_users.iter().any(|u| u == &actor.uid) {
            return Err(AppError::NotAllowed("You are banned from this group".into()));
        }
        self.store
            .add_to_set(Collection::Groups, &Filter::id(&group.id), "members", json!(actor.uid))
            .await?;
        self.store
            .add_to_set(
                Collection::Users,
                &Filter::field("uid", actor.uid.as_str()),
                "groups",
                json!(group.id),
            )
            .await?;
        Ok(())
    }

    pub async fn leave(&self, actor: &UserProfile, group_id: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.store
            .pull(Collection::Groups, &Filter::id(&group.id), "members", json!(actor.uid))
            .await?;
        self.store
            .pull(
                Collection::Users,
                &Filter::field("uid", actor.uid.as_str()),
                "groups",
                json!(group.id),
            )
            .await?;
        Ok(())
    }

    // ─── Lifecycle ─────────────────────────────────────

    pub async fn create(&self, actor: &UserProfile, req: CreateGroupRequest) -> AppResult<LegacyGroup> {
        authz::require(
            authz::resolve(actor, None, None, &self.admin_email),
            PrivilegeLevel::GlobalAdmin,
        )?;
        if req.name.trim().is_empty() {
            return Err(AppError::Validation("Group name cannot be empty".into()));
        }
        let group = LegacyGroup {
            id: new_id(),
            name: req.name.trim().to_string(),
            description: req.description,
            image_url: req.image_url,
            city: actor.city.clone(),
            is_public: true,
            created_by: actor.uid.clone(),
            created_by_name: actor.display_name(),
            members: vec![actor.uid.clone()],
            admins: vec![actor.uid.clone()],
            banned_users: vec![],
            restricted_users: vec![],
            pinned_messages: vec![],
            created_at: Utc::now(),
        };
        self.store.insert(Collection::Groups, to_doc(&group)?).await?;
        Ok(group)
    }

    pub async fn update_settings(
        &self,
        actor: &UserProfile,
        group_id: &str,
        req: UpdateGroupRequest,
    ) -> AppResult<LegacyGroup> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;

        let mut fields = serde_json::Map::new();
        if let Some(name) = req.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Group name cannot be empty".into()));
            }
            fields.insert("name".into(), json!(name.trim()));
        }
        if let Some(description) = req.description {
            fields.insert("description".into(), json!(description));
        }
        if let Some(image_url) = req.image_url {
            fields.insert("imageUrl".into(), json!(image_url));
        }
        if let Some(is_public) = req.is_public {
            fields.insert("isPublic".into(), json!(is_public));
        }
        if !fields.is_empty() {
            self.store
                .set_fields(
                    Collection::Groups,
                    &Filter::id(&group.id),
                    serde_json::Value::Object(fields),
                )
                .await?;
        }
        fetch_group(&self.store, group_id).await
    }

    /// Delete the group and every message in it.
    pub async fn delete(&self, actor: &UserProfile, group_id: &str) -> AppResult<()> {
        authz::require(
            authz::resolve(actor, None, None, &self.admin_email),
            PrivilegeLevel::GlobalAdmin,
        )?;
        let group = fetch_group(&self.store, group_id).await?;
        self.store
            .delete_one(Collection::Groups, &Filter::id(&group.id))
            .await?;
        let removed = self
            .store
            .delete_many(Collection::Messages, &Filter::field("groupId", group.id.as_str()))
            .await?;
        tracing::info!("Deleted group {} and {} messages", group.id, removed);
        Ok(())
    }

    // ─── Moderation ────────────────────────────────────

    pub async fn ban(&self, actor: &UserProfile, group_id: &str, target_uid: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        let target = Filter::id(&group.id);
        self.store
            .add_to_set(Collection::Groups, &target, "bannedUsers", json!(target_uid))
            .await?;
        self.store
            .pull(Collection::Groups, &target, "members", json!(target_uid))
            .await?;
        Ok(())
    }

    pub async fn unban(&self, actor: &UserProfile, group_id: &str, target_uid: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        self.store
            .pull(
                Collection::Groups,
                &Filter::id(&group.id),
                "bannedUsers",
                json!(target_uid),
            )
            .await?;
        Ok(())
    }

    /// Timed write restriction. Re-restricting replaces the previous entry.
    pub async fn restrict(
        &self,
        actor: &UserProfile,
        group_id: &str,
        target_uid: &str,
        req: RestrictRequest,
    ) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        if req.hours <= 0 {
            return Err(AppError::Validation("Restriction must last at least one hour".into()));
        }

        let mut restricted = group.restricted_users.clone();
        restricted.retain(|r| r.uid != target_uid);
        restricted.push(RestrictedEntry {
            uid: target_uid.to_string(),
            until: Utc::now() + Duration::hours(req.hours),
            reason: req.reason,
        });
        self.store
            .set_fields(
                Collection::Groups,
                &Filter::id(&group.id),
                json!({"restrictedUsers": to_doc(&restricted)?}),
            )
            .await?;
        Ok(())
    }

    pub async fn unrestrict(
        &self,
        actor: &UserProfile,
        group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        let mut restricted = group.restricted_users.clone();
        restricted.retain(|r| r.uid != target_uid);
        self.store
            .set_fields(
                Collection::Groups,
                &Filter::id(&group.id),
                json!({"restrictedUsers": to_doc(&restricted)?}),
            )
            .await?;
        Ok(())
    }

    pub async fn kick(&self, actor: &UserProfile, group_id: &str, target_uid: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        self.store
            .pull(Collection::Groups, &Filter::id(&group.id), "members", json!(target_uid))
            .await?;
        self.store
            .pull(
                Collection::Users,
                &Filter::field("uid", target_uid),
                "groups",
                json!(group.id),
            )
            .await?;
        Ok(())
    }

    pub async fn add_admin(&self, actor: &UserProfile, group_id: &str, target_uid: &str) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_roster_control(actor, &group)?;
        let target = Filter::id(&group.id);
        self.store
            .add_to_set(Collection::Groups, &target, "admins", json!(target_uid))
            .await?;
        self.store
            .add_to_set(Collection::Groups, &target, "members", json!(target_uid))
            .await?;
        Ok(())
    }

    pub async fn remove_admin(
        &self,
        actor: &UserProfile,
        group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_roster_control(actor, &group)?;
        self.store
            .pull(Collection::Groups, &Filter::id(&group.id), "admins", json!(target_uid))
            .await?;
        Ok(())
    }

    /// Remove every message a user posted in a group.
    pub async fn delete_user_messages(
        &self,
        actor: &UserProfile,
        group_id: &str,
        target_uid: &str,
    ) -> AppResult<u64> {
        let group = fetch_group(&self.store, group_id).await?;
        self.require_moderator(actor, &group)?;
        let removed = self
            .store
            .delete_many(
                Collection::Messages,
                &Filter::And(vec![
                    Filter::field("groupId", group.id.as_str()),
                    Filter::field("senderId", target_uid),
                ]),
            )
            .await?;
        Ok(removed)
    }
}
