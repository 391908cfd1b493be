//! Membership tier engine.
//!
//! Communities hold a ladder of leveled sub-groups. A user occupies at
//! most one rung per community: every path into a tier (public join,
//! approval, direct add, promote, demote) removes the user from the other
//! rungs of the same ladder. Mutations are idempotent set operations;
//! cross-document sequences are ordered so a partial failure leaves the
//! user in too many tiers rather than none.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::authz::{self, PrivilegeLevel};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Community, CommunityView, CreateSubGroupRequest, JoinRequest, JoinRequestStatus, SubGroup,
    SubGroupView, UpdateSubGroupRequest, UserProfile,
};
use crate::store::{to_doc, Collection, DocumentStore, Filter, Sort};

use super::{fetch_community, fetch_sub_group, new_id};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "outcome")]
pub enum JoinOutcome {
    /// Public tier: membership took effect immediately.
    Joined,
    /// Private tier: a request is waiting for an admin.
    Pending { request_id: String },
}

#[derive(Clone)]
pub struct Membership {
    store: Arc<dyn DocumentStore>,
    admin_email: String,
}

impl Membership {
    pub fn new(store: Arc<dyn DocumentStore>, admin_email: String) -> Self {
        Self { store, admin_email }
    }

    fn resolve(
        &self,
        actor: &UserProfile,
        community: Option<&Community>,
        sub_group: Option<&SubGroup>,
    ) -> PrivilegeLevel {
        authz::resolve(actor, community, sub_group, &self.admin_email)
    }

    // ─── Communities ───────────────────────────────────

    pub async fn list_communities(&self, viewer: &UserProfile) -> AppResult<Vec<CommunityView>> {
        let docs = self
            .store
            .find_many(
                Collection::Communities,
                &Filter::All,
                Some(&Sort::asc("city")),
                None,
            )
            .await?;
        let mut views = Vec::with_capacity(docs.len());
        for doc in docs {
            let community: Community = crate::store::from_doc(doc)?;
            views.push(CommunityView::for_viewer(community, &viewer.uid));
        }
        Ok(views)
    }

    pub async fn get_community(
        &self,
        viewer: &UserProfile,
        community_id: &str,
    ) -> AppResult<(CommunityView, Vec<SubGroupView>)> {
        let community = fetch_community(&self.store, community_id).await?;
        let docs = self
            .store
            .find_many(
                Collection::SubGroups,
                &Filter::field("communityId", community_id),
                Some(&Sort::asc("level")),
                None,
            )
            .await?;
        let mut sub_groups = Vec::with_capacity(docs.len());
        for doc in docs {
            let sg: SubGroup = crate::store::from_doc(doc)?;
            sub_groups.push(SubGroupView::for_viewer(sg, &viewer.uid));
        }
        Ok((CommunityView::for_viewer(community, &viewer.uid), sub_groups))
    }

    /// Join a community. Idempotent: the membership adds are set-adds, and
    /// the entry (level 1) tier placement only happens for users not
    /// already on a rung of the ladder, so re-joining never moves a
    /// promoted member.
    pub async fn join_community(&self, actor: &UserProfile, community_id: &str) -> AppResult<()> {
        let community = fetch_community(&self.store, community_id).await?;

        self.store
            .add_to_set(
                Collection::Communities,
                &Filter::id(&community.id),
                "members",
                json!(actor.uid),
            )
            .await?;
        self.store
            .add_to_set(
                Collection::Users,
                &Filter::field("uid", actor.uid.as_str()),
                "communities",
                json!(community.id),
            )
            .await?;

        let current_rung = self
            .store
            .find_one(
                Collection::SubGroups,
                &Filter::And(vec![
                    Filter::field("communityId", community.id.as_str()),
                    Filter::Contains("members".into(), json!(actor.uid)),
                ]),
            )
            .await?;
        if current_rung.is_some() {
            return Ok(());
        }

        let entry_tier = self
            .store
            .find_one(
                Collection::SubGroups,
                &Filter::And(vec![
                    Filter::field("communityId", community.id.as_str()),
                    Filter::field("level", 1),
                ]),
            )
            .await?;
        if let Some(doc) = entry_tier {
            let entry: SubGroup = crate::store::from_doc(doc)?;
            self.enter_tier(&community, &entry, &actor.uid).await?;
        }
        Ok(())
    }

    /// Leave a community. Super admins cannot leave; everyone else is
    /// swept out of every rung of the ladder.
    pub async fn leave_community(&self, actor: &UserProfile, community_id: &str) -> AppResult<()> {
        let community = fetch_community(&self.store, community_id).await?;
        if community.super_admins.iter().any(|u| u == &actor.uid) {
            return Err(AppError::Conflict(
                "Super admins cannot leave the community".into(),
            ));
        }

        self.store
            .pull(
                Collection::Communities,
                &Filter::id(&community.id),
                "members",
                json!(actor.uid),
            )
            .await?;
        self.store
            .pull(
                Collection::Users,
                &Filter::field("uid", actor.uid.as_str()),
                "communities",
                json!(community.id),
            )
            .await?;

        let ladder = Filter::field("communityId", community.id.as_str());
        self.store
            .pull(Collection::SubGroups, &ladder, "members", json!(actor.uid))
            .await?;
        self.store
            .pull(Collection::SubGroups, &ladder, "groupAdmins", json!(actor.uid))
            .await?;
        Ok(())
    }

    // ─── Tier entry ────────────────────────────────────

    /// Put `uid` into exactly this rung: add to the target sub-group, then
    /// remove from every other rung of the same ladder. On a failed
    /// removal the add is compensated once before the error propagates,
    /// so the observable bad state is dual membership, never none.
    async fn enter_tier(
        &self,
        community: &Community,
        sub_group: &SubGroup,
        uid: &str,
    ) -> AppResult<()> {
        self.store
            .add_to_set(
                Collection::SubGroups,
                &Filter::id(&sub_group.id),
                "members",
                json!(uid),
            )
            .await?;

        let others = Filter::And(vec![
            Filter::field("communityId", community.id.as_str()),
            Filter::Ne("id".into(), json!(sub_group.id)),
        ]);
        if let Err(e) = self
            .store
            .pull(Collection::SubGroups, &others, "members", json!(uid))
            .await
        {
            let _ = self
                .store
                .pull(
                    Collection::SubGroups,
                    &Filter::id(&sub_group.id),
                    "members",
                    json!(uid),
                )
                .await;
            return Err(e.into());
        }

        // Tier membership implies community membership.
        self.store
            .add_to_set(
                Collection::Communities,
                &Filter::id(&community.id),
                "members",
                json!(uid),
            )
            .await?;
        self.store
            .add_to_set(
                Collection::Users,
                &Filter::field("uid", uid),
                "communities",
                json!(community.id),
            )
            .await?;
        Ok(())
    }

    // ─── Join requests ─────────────────────────────────

    /// Ask to enter a tier. Public tiers grant immediately; private tiers
    /// record a pending request unless one already exists.
    pub async fn request_join(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
    ) -> AppResult<JoinOutcome> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;

        if sub_group.members.iter().any(|u| u == &actor.uid) {
            return Err(AppError::Conflict("Already a member of this group".into()));
        }

        if sub_group.is_public {
            self.enter_tier(&community, &sub_group, &actor.uid).await?;
            return Ok(JoinOutcome::Joined);
        }

        if sub_group.has_pending_request(&actor.uid) {
            return Err(AppError::Conflict("A join request is already pending".into()));
        }

        let request = JoinRequest {
            id: new_id(),
            user_id: actor.uid.clone(),
            user_name: actor.display_name(),
            user_profile_image: actor.profile_image_url.clone(),
            status: JoinRequestStatus::Pending,
            created_at: Utc::now(),
        };
        self.store
            .push(
                Collection::SubGroups,
                &Filter::id(&sub_group.id),
                "pendingRequests",
                to_doc(&request)?,
            )
            .await?;
        Ok(JoinOutcome::Pending { request_id: request.id })
    }

    /// Approve or reject a pending request. Rejection flips the status
    /// only; the record stays as an audit trail.
    pub async fn handle_request(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        request_id: &str,
        approve: bool,
    ) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&sub_group)),
            PrivilegeLevel::SubGroupAdmin,
        )?;

        let request = sub_group
            .pending_requests
            .iter()
            .find(|r| r.id == request_id)
            .ok_or_else(|| AppError::NotFound("Join request not found".into()))?;
        if request.status != JoinRequestStatus::Pending {
            return Err(AppError::Conflict("Join request already handled".into()));
        }

        if approve {
            // Member add before status flip: a failure here leaves the
            // request pending and retryable.
            self.enter_tier(&community, &sub_group, &request.user_id).await?;
        }

        let new_status = if approve {
            JoinRequestStatus::Approved
        } else {
            JoinRequestStatus::Rejected
        };
        let mut requests = sub_group.pending_requests.clone();
        for r in requests.iter_mut().filter(|r| r.id == request_id) {
            r.status = new_status;
        }
        self.store
            .set_fields(
                Collection::SubGroups,
                &Filter::id(&sub_group.id),
                json!({ "pendingRequests": to_doc(&requests)? }),
            )
            .await?;
        Ok(())
    }

    pub async fn pending_requests(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
    ) -> AppResult<Vec<JoinRequest>> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&sub_group)),
            PrivilegeLevel::SubGroupAdmin,
        )?;
        Ok(sub_group
            .pending_requests
            .into_iter()
            .filter(|r| r.status == JoinRequestStatus::Pending)
            .collect())
    }

    // ─── Promotion ladder ──────────────────────────────

    pub async fn promote(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<SubGroup> {
        self.move_along_ladder(actor, sub_group_id, target_uid, 1).await
    }

    pub async fn demote(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<SubGroup> {
        self.move_along_ladder(actor, sub_group_id, target_uid, -1).await
    }

    /// Move a member one rung up or down. Fails with Conflict at either
    /// end of the ladder, leaving membership untouched.
    async fn move_along_ladder(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
        delta: i64,
    ) -> AppResult<SubGroup> {
        let current = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &current.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&current)),
            PrivilegeLevel::SubGroupAdmin,
        )?;

        if !current.members.iter().any(|u| u == target_uid) {
            return Err(AppError::Validation(
                "User is not a member of this tier".into(),
            ));
        }

        let next_level = current.level + delta;
        let next_doc = self
            .store
            .find_one(
                Collection::SubGroups,
                &Filter::And(vec![
                    Filter::field("communityId", current.community_id.as_str()),
                    Filter::field("level", next_level),
                ]),
            )
            .await?;
        let next: SubGroup = match next_doc {
            Some(doc) => crate::store::from_doc(doc)?,
            None if delta > 0 => {
                return Err(AppError::Conflict("No higher tier exists".into()))
            }
            None => return Err(AppError::Conflict("No lower tier exists".into())),
        };

        self.enter_tier(&community, &next, target_uid).await?;
        Ok(next)
    }

    // ─── Sub-group membership management ───────────────

    pub async fn add_member(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&sub_group)),
            PrivilegeLevel::SubGroupAdmin,
        )?;
        self.enter_tier(&community, &sub_group, target_uid).await
    }

    pub async fn remove_member(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&sub_group)),
            PrivilegeLevel::SubGroupAdmin,
        )?;
        let target = Filter::id(&sub_group.id);
        self.store
            .pull(Collection::SubGroups, &target, "members", json!(target_uid))
            .await?;
        self.store
            .pull(Collection::SubGroups, &target, "groupAdmins", json!(target_uid))
            .await?;
        Ok(())
    }

    pub async fn leave_sub_group(&self, actor: &UserProfile, sub_group_id: &str) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let target = Filter::id(&sub_group.id);
        self.store
            .pull(Collection::SubGroups, &target, "members", json!(actor.uid))
            .await?;
        self.store
            .pull(Collection::SubGroups, &target, "groupAdmins", json!(actor.uid))
            .await?;
        Ok(())
    }

    /// Grant sub-group admin. The grantee also enters the tier.
    pub async fn add_sub_group_admin(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), None),
            PrivilegeLevel::SuperAdmin,
        )?;
        self.enter_tier(&community, &sub_group, target_uid).await?;
        self.store
            .add_to_set(
                Collection::SubGroups,
                &Filter::id(&sub_group.id),
                "groupAdmins",
                json!(target_uid),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_sub_group_admin(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), None),
            PrivilegeLevel::SuperAdmin,
        )?;
        self.store
            .pull(
                Collection::SubGroups,
                &Filter::id(&sub_group.id),
                "groupAdmins",
                json!(target_uid),
            )
            .await?;
        Ok(())
    }

    // ─── Super admins ──────────────────────────────────

    pub async fn add_super_admin(
        &self,
        actor: &UserProfile,
        community_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        authz::require(
            self.resolve(actor, None, None),
            PrivilegeLevel::GlobalAdmin,
        )?;
        let community = fetch_community(&self.store, community_id).await?;
        let target = Filter::id(&community.id);
        // Super admins are members by construction.
        self.store
            .add_to_set(Collection::Communities, &target, "superAdmins", json!(target_uid))
            .await?;
        self.store
            .add_to_set(Collection::Communities, &target, "members", json!(target_uid))
            .await?;
        self.store
            .add_to_set(
                Collection::Users,
                &Filter::field("uid", target_uid),
                "communities",
                json!(community.id),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_super_admin(
        &self,
        actor: &UserProfile,
        community_id: &str,
        target_uid: &str,
    ) -> AppResult<()> {
        authz::require(
            self.resolve(actor, None, None),
            PrivilegeLevel::GlobalAdmin,
        )?;
        let community = fetch_community(&self.store, community_id).await?;
        self.store
            .pull(
                Collection::Communities,
                &Filter::id(&community.id),
                "superAdmins",
                json!(target_uid),
            )
            .await?;
        Ok(())
    }

    // ─── Sub-group lifecycle ───────────────────────────

    pub async fn create_sub_group(
        &self,
        actor: &UserProfile,
        community_id: &str,
        req: CreateSubGroupRequest,
    ) -> AppResult<SubGroup> {
        let community = fetch_community(&self.store, community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), None),
            PrivilegeLevel::SuperAdmin,
        )?;
        if req.name.trim().is_empty() {
            return Err(AppError::Validation("Group name cannot be empty".into()));
        }

        let level = match req.level {
            Some(level) if level >= 1 => level,
            Some(_) => return Err(AppError::Validation("Level must be at least 1".into())),
            None => {
                let top = self
                    .store
                    .find_many(
                        Collection::SubGroups,
                        &Filter::field("communityId", community.id.as_str()),
                        Some(&Sort::desc("level")),
                        Some(1),
                    )
                    .await?;
                match top.first() {
                    Some(doc) => doc.get("level").and_then(|l| l.as_i64()).unwrap_or(0) + 1,
                    None => 1,
                }
            }
        };

        let sub_group = SubGroup {
            id: new_id(),
            community_id: community.id.clone(),
            name: req.name.trim().to_string(),
            description: req.description,
            image_url: req.image_url,
            level,
            group_admins: vec![],
            members: vec![],
            pending_requests: vec![],
            // Level 1 is the entry rung and always public.
            is_public: level == 1 || req.is_public,
            created_by: actor.uid.clone(),
            created_by_name: actor.display_name(),
            created_at: Utc::now(),
        };
        self.store
            .insert(Collection::SubGroups, to_doc(&sub_group)?)
            .await?;
        self.store
            .add_to_set(
                Collection::Communities,
                &Filter::id(&community.id),
                "subGroups",
                json!(sub_group.id),
            )
            .await?;
        Ok(sub_group)
    }

    pub async fn update_sub_group(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        req: UpdateSubGroupRequest,
    ) -> AppResult<SubGroup> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), Some(&sub_group)),
            PrivilegeLevel::SubGroupAdmin,
        )?;

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
        if !fields.is_empty() {
            self.store
                .set_fields(
                    Collection::SubGroups,
                    &Filter::id(&sub_group.id),
                    serde_json::Value::Object(fields),
                )
                .await?;
        }
        fetch_sub_group(&self.store, sub_group_id).await
    }

    /// Delete a sub-group and every message posted in it.
    pub async fn delete_sub_group(&self, actor: &UserProfile, sub_group_id: &str) -> AppResult<()> {
        let sub_group = fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        authz::require(
            self.resolve(actor, Some(&community), None),
            PrivilegeLevel::SuperAdmin,
        )?;

        self.store
            .delete_one(Collection::SubGroups, &Filter::id(&sub_group.id))
            .await?;
        self.store
            .pull(
                Collection::Communities,
                &Filter::id(&community.id),
                "subGroups",
                json!(sub_group.id),
            )
            .await?;
        let removed = self
            .store
            .delete_many(
                Collection::Messages,
                &Filter::field("groupId", sub_group.id.as_str()),
            )
            .await?;
        tracing::info!(
            "Deleted sub-group {} and {} messages",
            sub_group.id,
            removed
        );
        Ok(())
    }
}
