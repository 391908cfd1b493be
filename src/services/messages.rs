//! Message lifecycle engine.
//!
//! send → deliver → read → edit → delete-for-me / delete-for-everyone,
//! plus reactions and pins. Every mutation persists first; the matching
//! event is published after the write succeeds and never on failure.
//! Delete-for-everyone is terminal: the content is replaced by a
//! placeholder and edits are refused from then on.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::authz::{self, PrivilegeLevel};
use crate::errors::{AppError, AppResult};
use crate::models::{
    Community, DeliveryStatus, EditRecord, LegacyGroup, Message, MessageKind, Reaction,
    SendMessageRequest, SubGroup, UserProfile,
};
use crate::realtime::{chat_topic, EventBus};
use crate::store::{from_doc, to_doc, Collection, DocumentStore, Filter, Sort};

use super::{fetch_community, fetch_message, fetch_user, new_id};

pub const DELETED_MESSAGE_PLACEHOLDER: &str = "This message was deleted";

/// Reply snapshots keep at most this many characters of the quoted content.
const REPLY_SNAPSHOT_CHARS: usize = 100;

#[derive(Clone)]
pub struct Messages {
    store: Arc<dyn DocumentStore>,
    events: EventBus,
    admin_email: String,
    page_size: usize,
}

impl Messages {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        events: EventBus,
        admin_email: String,
        page_size: usize,
    ) -> Self {
        Self { store, events, admin_email, page_size }
    }

    // ─── Send ──────────────────────────────────────────

    /// Post to a legacy flat group. Bans and active restrictions block.
    pub async fn send_group_message(
        &self,
        actor: &UserProfile,
        group_id: &str,
        req: SendMessageRequest,
    ) -> AppResult<Message> {
        let group = super::fetch_group(&self.store, group_id).await?;
        if group.banned_users.iter().any(|u| u == &actor.uid) {
            return Err(AppError::NotAllowed("You are banned from this group".into()));
        }
        let now = Utc::now();
        if group
            .restricted_users
            .iter()
            .any(|r| r.uid == actor.uid && r.until > now)
        {
            return Err(AppError::NotAllowed("You are restricted in this group".into()));
        }
        if !group.members.iter().any(|u| u == &actor.uid) {
            return Err(AppError::NotAllowed("You are not a member of this group".into()));
        }

        let message = self.build_message(actor, Some(group_id), None, None, req, None).await?;
        self.store.insert(Collection::Messages, to_doc(&message)?).await?;
        self.events
            .publish(group_id, "new_message", to_doc(&message)?)
            .await;
        Ok(message)
    }

    /// Post to a community sub-group. Members only.
    pub async fn send_sub_group_message(
        &self,
        actor: &UserProfile,
        sub_group_id: &str,
        req: SendMessageRequest,
    ) -> AppResult<Message> {
        let sub_group = super::fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        let is_member = sub_group.members.iter().any(|u| u == &actor.uid);
        let level = authz::resolve(actor, Some(&community), Some(&sub_group), &self.admin_email);
        if !is_member && level < PrivilegeLevel::SuperAdmin {
            return Err(AppError::NotAllowed("You are not a member of this group".into()));
        }

        let message = self
            .build_message(actor, Some(sub_group_id), None, None, req, None)
            .await?;
        self.store.insert(Collection::Messages, to_doc(&message)?).await?;
        self.events
            .publish(sub_group_id, "new_subgroup_message", to_doc(&message)?)
            .await;
        Ok(message)
    }

    /// Direct message. The chat id is derived from the sorted uid pair, so
    /// both parties address the same conversation.
    pub async fn send_private_message(
        &self,
        actor: &UserProfile,
        receiver_id: &str,
        req: SendMessageRequest,
    ) -> AppResult<Message> {
        // Receiver must exist.
        fetch_user(&self.store, receiver_id).await?;
        let chat_id = chat_topic(&actor.uid, receiver_id);

        let message = self
            .build_message(actor, None, Some(&chat_id), Some(receiver_id), req, None)
            .await?;
        self.store.insert(Collection::Messages, to_doc(&message)?).await?;
        self.events
            .publish(&chat_id, "new_private_message", to_doc(&message)?)
            .await;
        Ok(message)
    }

    /// Community announcement. Super admins and above only; the message
    /// lands in the community's announcement channel.
    pub async fn send_announcement(
        &self,
        actor: &UserProfile,
        community_id: &str,
        req: SendMessageRequest,
    ) -> AppResult<Message> {
        let community = fetch_community(&self.store, community_id).await?;
        authz::require(
            authz::resolve(actor, Some(&community), None, &self.admin_email),
            PrivilegeLevel::SuperAdmin,
        )?;
        let channel_id = community
            .announcement_channel_id
            .clone()
            .ok_or_else(|| AppError::NotFound("Community has no announcement channel".into()))?;

        let message = self
            .build_message(
                actor,
                Some(&channel_id),
                None,
                None,
                req,
                Some(MessageKind::Announcement),
            )
            .await?;
        self.store.insert(Collection::Messages, to_doc(&message)?).await?;
        self.events
            .publish(&community.id, "new_announcement", to_doc(&message)?)
            .await;
        Ok(message)
    }

    async fn build_message(
        &self,
        actor: &UserProfile,
        group_id: Option<&str>,
        chat_id: Option<&str>,
        receiver_id: Option<&str>,
        req: SendMessageRequest,
        forced_kind: Option<MessageKind>,
    ) -> AppResult<Message> {
        let content = req.content.trim().to_string();
        if content.is_empty() && req.file_url.is_none() && req.latitude.is_none() {
            return Err(AppError::Validation("Message content cannot be empty".into()));
        }

        // Reply context is snapshotted at send time and never re-resolved.
        let (reply_to_content, reply_to_sender_name) = match &req.reply_to {
            Some(reply_id) => {
                let original = fetch_message(&self.store, reply_id).await?;
                let snippet: String = original.content.chars().take(REPLY_SNAPSHOT_CHARS).collect();
                (Some(snippet), Some(original.sender_name))
            }
            None => (None, None),
        };

        Ok(Message {
            id: new_id(),
            group_id: group_id.map(String::from),
            chat_id: chat_id.map(String::from),
            sender_id: actor.uid.clone(),
            sender_name: actor.display_name(),
            sender_profile_image: actor.profile_image_url.clone(),
            receiver_id: receiver_id.map(String::from),
            content,
            kind: forced_kind.unwrap_or(req.kind),
            file_url: req.file_url,
            file_name: req.file_name,
            file_size: req.file_size,
            latitude: req.latitude,
            longitude: req.longitude,
            location_name: req.location_name,
            contact_name: req.contact_name,
            contact_phone: req.contact_phone,
            reactions: vec![],
            is_pinned: false,
            is_deleted: false,
            deleted_for_everyone: false,
            deleted_for: vec![],
            reply_to: req.reply_to,
            reply_to_content,
            reply_to_sender_name,
            is_edited: false,
            edited_at: None,
            edit_history: vec![],
            status: DeliveryStatus::Sent,
            delivered_to: vec![],
            // The sender has read their own message by definition.
            read_by: vec![actor.uid.clone()],
            timestamp: Utc::now(),
        })
    }

    // ─── Read projections ──────────────────────────────

    /// Messages in a group, oldest first. Messages the viewer deleted for
    /// themselves stay in the listing as placeholders.
    pub async fn group_messages(&self, viewer: &UserProfile, group_id: &str) -> AppResult<Vec<Message>> {
        self.projection(Filter::field("groupId", group_id), viewer).await
    }

    /// Sub-group history. Members only, same gate as the write path.
    pub async fn sub_group_messages(
        &self,
        viewer: &UserProfile,
        sub_group_id: &str,
    ) -> AppResult<Vec<Message>> {
        let sub_group = super::fetch_sub_group(&self.store, sub_group_id).await?;
        let community = fetch_community(&self.store, &sub_group.community_id).await?;
        let is_member = sub_group.members.iter().any(|u| u == &viewer.uid);
        let level = authz::resolve(viewer, Some(&community), Some(&sub_group), &self.admin_email);
        if !is_member && level < PrivilegeLevel::SuperAdmin {
            return Err(AppError::NotAllowed("You are not a member of this group".into()));
        }
        self.projection(Filter::field("groupId", sub_group_id), viewer).await
    }

    pub async fn private_messages(
        &self,
        viewer: &UserProfile,
        other_uid: &str,
    ) -> AppResult<Vec<Message>> {
        let chat_id = chat_topic(&viewer.uid, other_uid);
        self.projection(Filter::field("chatId", chat_id.as_str()), viewer).await
    }

    pub async fn announcements(
        &self,
        viewer: &UserProfile,
        community_id: &str,
    ) -> AppResult<Vec<Message>> {
        let community = fetch_community(&self.store, community_id).await?;
        let channel_id = community
            .announcement_channel_id
            .ok_or_else(|| AppError::NotFound("Community has no announcement channel".into()))?;
        self.projection(Filter::field("groupId", channel_id.as_str()), viewer).await
    }

    /// Newest page_size messages in scope, returned oldest first. Viewer-
    /// local deletes are overlaid as placeholders, never filtered out, so
    /// the conversation keeps its shape for every participant.
    async fn projection(&self, scope: Filter, viewer: &UserProfile) -> AppResult<Vec<Message>> {
        let docs = self
            .store
            .find_many(
                Collection::Messages,
                &scope,
                Some(&Sort::desc("timestamp")),
                Some(self.page_size),
            )
            .await?;
        let mut messages = Vec::with_capacity(docs.len());
        for doc in docs {
            messages.push(overlay_viewer_delete(from_doc(doc)?, &viewer.uid));
        }
        messages.reverse();
        Ok(messages)
    }

    // ─── Delivery / read receipts ──────────────────────

    /// Mark every undelivered inbound message in scope as delivered.
    /// One aggregate event regardless of how many messages changed.
    pub async fn mark_chat_delivered(&self, viewer: &UserProfile, other_uid: &str) -> AppResult<u64> {
        let chat_id = chat_topic(&viewer.uid, other_uid);
        self.mark_delivered(Filter::field("chatId", chat_id.as_str()), &chat_id, viewer)
            .await
    }

    pub async fn mark_group_delivered(&self, viewer: &UserProfile, group_id: &str) -> AppResult<u64> {
        self.mark_delivered(Filter::field("groupId", group_id), group_id, viewer)
            .await
    }

    async fn mark_delivered(
        &self,
        scope: Filter,
        topic: &str,
        viewer: &UserProfile,
    ) -> AppResult<u64> {
        let pending = Filter::And(vec![
            scope.clone(),
            Filter::Ne("senderId".into(), json!(viewer.uid)),
            Filter::NotContains("deliveredTo".into(), json!(viewer.uid)),
            Filter::field("status", "sent"),
        ]);
        let count = self
            .store
            .add_to_set(Collection::Messages, &pending, "deliveredTo", json!(viewer.uid))
            .await?;
        if count > 0 {
            let advanced = Filter::And(vec![
                scope,
                Filter::field("status", "sent"),
                Filter::Contains("deliveredTo".into(), json!(viewer.uid)),
            ]);
            self.store
                .set_fields(Collection::Messages, &advanced, json!({"status": "delivered"}))
                .await?;
            self.events
                .publish(
                    topic,
                    "messages_delivered",
                    json!({"userId": viewer.uid, "count": count}),
                )
                .await;
        }
        Ok(count)
    }

    /// Mark every unread inbound message in scope as read. One aggregate
    /// event carries the reader and the count.
    pub async fn mark_chat_read(&self, viewer: &UserProfile, other_uid: &str) -> AppResult<u64> {
        let chat_id = chat_topic(&viewer.uid, other_uid);
        self.mark_read(Filter::field("chatId", chat_id.as_str()), &chat_id, viewer)
            .await
    }

    pub async fn mark_group_read(&self, viewer: &UserProfile, group_id: &str) -> AppResult<u64> {
        self.mark_read(Filter::field("groupId", group_id), group_id, viewer)
            .await
    }

    async fn mark_read(&self, scope: Filter, topic: &str, viewer: &UserProfile) -> AppResult<u64> {
        let unread = Filter::And(vec![
            scope.clone(),
            Filter::Ne("senderId".into(), json!(viewer.uid)),
            Filter::NotContains("readBy".into(), json!(viewer.uid)),
        ]);
        let count = self
            .store
            .add_to_set(Collection::Messages, &unread, "readBy", json!(viewer.uid))
            .await?;
        if count > 0 {
            let seen = Filter::And(vec![
                scope,
                Filter::Ne("senderId".into(), json!(viewer.uid)),
                Filter::Contains("readBy".into(), json!(viewer.uid)),
            ]);
            self.store
                .set_fields(Collection::Messages, &seen, json!({"status": "read"}))
                .await?;
            self.events
                .publish(
                    topic,
                    "messages_read",
                    json!({"readerId": viewer.uid, "count": count}),
                )
                .await;
        }
        Ok(count)
    }

    // ─── Reactions ─────────────────────────────────────

    /// Toggle the (user, emoji) reaction pair. A second identical call
    /// undoes the first.
    pub async fn react(
        &self,
        actor: &UserProfile,
        message_id: &str,
        emoji: &str,
    ) -> AppResult<Vec<Reaction>> {
        let message = fetch_message(&self.store, message_id).await?;
        let mut reactions = message.reactions.clone();
        let existing = reactions
            .iter()
            .position(|r| r.user_id == actor.uid && r.emoji == emoji);
        match existing {
            Some(pos) => {
                reactions.remove(pos);
            }
            None => reactions.push(Reaction {
                emoji: emoji.to_string(),
                user_id: actor.uid.clone(),
                user_name: actor.display_name(),
            }),
        }
        self.store
            .set_fields(
                Collection::Messages,
                &Filter::id(message_id),
                json!({"reactions": to_doc(&reactions)?}),
            )
            .await?;
        self.events
            .publish(
                &topic_of(&message),
                "message_reaction",
                json!({"messageId": message_id, "reactions": to_doc(&reactions)?}),
            )
            .await;
        Ok(reactions)
    }

    // ─── Edit ──────────────────────────────────────────

    /// Sender-only. The pre-edit content is appended to the history before
    /// the new content lands. Deleted-for-everyone messages cannot be
    /// edited.
    pub async fn edit(
        &self,
        actor: &UserProfile,
        message_id: &str,
        content: &str,
    ) -> AppResult<Message> {
        let message = fetch_message(&self.store, message_id).await?;
        if message.sender_id != actor.uid {
            return Err(AppError::NotAllowed("Only the sender can edit a message".into()));
        }
        if message.deleted_for_everyone {
            return Err(AppError::Conflict("Cannot edit a deleted message".into()));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Message content cannot be empty".into()));
        }

        let now = Utc::now();
        let record = EditRecord {
            content: message.content.clone(),
            edited_at: now,
        };
        self.store
            .push(
                Collection::Messages,
                &Filter::id(message_id),
                "editHistory",
                to_doc(&record)?,
            )
            .await?;
        self.store
            .set_fields(
                Collection::Messages,
                &Filter::id(message_id),
                json!({
                    "content": content,
                    "isEdited": true,
                    "editedAt": now,
                }),
            )
            .await?;

        let updated = fetch_message(&self.store, message_id).await?;
        self.events
            .publish(&topic_of(&message), "message_edited", to_doc(&updated)?)
            .await;
        Ok(updated)
    }

    // ─── Delete ────────────────────────────────────────

    /// Viewer-local delete. The set only ever grows; no event is emitted
    /// because nothing changes for other viewers.
    pub async fn delete_for_me(&self, actor: &UserProfile, message_id: &str) -> AppResult<()> {
        fetch_message(&self.store, message_id).await?;
        self.store
            .add_to_set(
                Collection::Messages,
                &Filter::id(message_id),
                "deletedFor",
                json!(actor.uid),
            )
            .await?;
        Ok(())
    }

    /// Terminal delete for all viewers: sender, or a group admin tier in
    /// group contexts. Content is replaced by the placeholder.
    pub async fn delete_for_everyone(&self, actor: &UserProfile, message_id: &str) -> AppResult<()> {
        let message = fetch_message(&self.store, message_id).await?;
        if message.sender_id != actor.uid {
            let allowed = match &message.group_id {
                Some(group_id) => {
                    self.moderator_level(actor, group_id).await? >= PrivilegeLevel::SubGroupAdmin
                }
                None => authz::is_global_admin(actor, &self.admin_email),
            };
            if !allowed {
                return Err(AppError::NotAllowed(
                    "Only the sender or a group admin can delete for everyone".into(),
                ));
            }
        }

        self.store
            .set_fields(
                Collection::Messages,
                &Filter::id(message_id),
                json!({
                    "deletedForEveryone": true,
                    "isDeleted": true,
                    "content": DELETED_MESSAGE_PLACEHOLDER,
                }),
            )
            .await?;
        self.events
            .publish(
                &topic_of(&message),
                "message_deleted",
                json!({"messageId": message_id}),
            )
            .await;
        Ok(())
    }

    /// Effective moderation tier for a message's group context, whether it
    /// is a sub-group or a legacy flat group.
    async fn moderator_level(&self, actor: &UserProfile, group_id: &str) -> AppResult<PrivilegeLevel> {
        if let Some(doc) = self
            .store
            .find_one(Collection::SubGroups, &Filter::id(group_id))
            .await?
        {
            let sub_group: SubGroup = from_doc(doc)?;
            let community: Community =
                fetch_community(&self.store, &sub_group.community_id).await?;
            return Ok(authz::resolve(
                actor,
                Some(&community),
                Some(&sub_group),
                &self.admin_email,
            ));
        }
        if let Some(doc) = self
            .store
            .find_one(Collection::Groups, &Filter::id(group_id))
            .await?
        {
            let group: LegacyGroup = from_doc(doc)?;
            return Ok(authz::resolve_legacy(actor, &group, &self.admin_email));
        }
        Ok(if authz::is_global_admin(actor, &self.admin_email) {
            PrivilegeLevel::GlobalAdmin
        } else {
            PrivilegeLevel::None
        })
    }

    // ─── Pins ──────────────────────────────────────────

    /// Toggle a message pin. In legacy groups the group's pinned set is
    /// kept consistent with the message flag.
    pub async fn pin(&self, actor: &UserProfile, message_id: &str) -> AppResult<bool> {
        let message = fetch_message(&self.store, message_id).await?;
        let now_pinned = !message.is_pinned;
        self.store
            .set_fields(
                Collection::Messages,
                &Filter::id(message_id),
                json!({"isPinned": now_pinned}),
            )
            .await?;

        if let Some(group_id) = &message.group_id {
            let group_filter = Filter::id(group_id);
            if now_pinned {
                self.store
                    .add_to_set(Collection::Groups, &group_filter, "pinnedMessages", json!(message_id))
                    .await?;
            } else {
                self.store
                    .pull(Collection::Groups, &group_filter, "pinnedMessages", json!(message_id))
                    .await?;
            }
        }

        self.events
            .publish(
                &topic_of(&message),
                "message_pinned",
                json!({
                    "messageId": message_id,
                    "isPinned": now_pinned,
                    "pinnedBy": actor.uid,
                }),
            )
            .await;
        Ok(now_pinned)
    }

    pub async fn pinned_messages(&self, viewer: &UserProfile, group_id: &str) -> AppResult<Vec<Message>> {
        let filter = Filter::And(vec![
            Filter::field("groupId", group_id),
            Filter::field("isPinned", true),
        ]);
        let docs = self
            .store
            .find_many(
                Collection::Messages,
                &filter,
                Some(&Sort::asc("timestamp")),
                None,
            )
            .await?;
        let mut messages = Vec::with_capacity(docs.len());
        for doc in docs {
            messages.push(overlay_viewer_delete(from_doc(doc)?, &viewer.uid));
        }
        Ok(messages)
    }

    // ─── Typing ────────────────────────────────────────

    /// Ephemeral; goes straight to the bus, nothing is persisted.
    pub async fn typing_in_group(&self, actor: &UserProfile, group_id: &str, is_typing: bool) {
        self.events
            .publish(
                group_id,
                "user_typing",
                json!({
                    "userId": actor.uid,
                    "userName": actor.display_name(),
                    "isTyping": is_typing,
                }),
            )
            .await;
    }

    pub async fn typing_in_chat(&self, actor: &UserProfile, other_uid: &str, is_typing: bool) {
        let chat_id = chat_topic(&actor.uid, other_uid);
        self.events
            .publish(
                &chat_id,
                "user_typing",
                json!({
                    "userId": actor.uid,
                    "userName": actor.display_name(),
                    "isTyping": is_typing,
                }),
            )
            .await;
    }
}

/// A delete-for-me only hides the content from that viewer; everyone else
/// still sees the original message.
fn overlay_viewer_delete(mut message: Message, viewer_uid: &str) -> Message {
    if message.deleted_for.iter().any(|u| u == viewer_uid) {
        message.content = DELETED_MESSAGE_PLACEHOLDER.to_string();
        message.is_deleted = true;
    }
    message
}

fn topic_of(message: &Message) -> String {
    message
        .group_id
        .clone()
        .or_else(|| message.chat_id.clone())
        .unwrap_or_default()
}
