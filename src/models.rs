use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ─── User ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub city: String,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_banned: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub restricted_until: Option<DateTime<Utc>>,
    /// Legacy flat-group memberships.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub communities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Display name snapshotted into messages, posts, and join requests.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64, message = "First name must be 1-64 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64, message = "Last name must be 1-64 characters"))]
    pub last_name: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 64, message = "City is required"))]
    pub city: String,
    pub occupation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub occupation: Option<String>,
    pub profile_image_url: Option<String>,
}

// ─── Community ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// At most one community exists per city.
    pub city: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub super_admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    /// Ordered sub-group ids (the tier ladder plus any extras).
    #[serde(default)]
    pub sub_groups: Vec<String>,
    #[serde(default)]
    pub announcement_channel_id: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
}

/// Community record augmented with viewer-relative fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityView {
    #[serde(flatten)]
    pub community: Community,
    pub member_count: usize,
    pub is_member: bool,
    pub is_super_admin: bool,
    pub sub_group_count: usize,
}

impl CommunityView {
    pub fn for_viewer(community: Community, viewer_uid: &str) -> Self {
        Self {
            member_count: community.members.len(),
            is_member: community.members.iter().any(|m| m == viewer_uid),
            is_super_admin: community.super_admins.iter().any(|m| m == viewer_uid),
            sub_group_count: community.sub_groups.len(),
            community,
        }
    }
}

// ─── SubGroup ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubGroup {
    pub id: String,
    pub community_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Tier rung, 1 = entry. Level 1 is always public.
    pub level: i64,
    #[serde(default)]
    pub group_admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub pending_requests: Vec<JoinRequest>,
    pub is_public: bool,
    pub created_by: String,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
}

impl SubGroup {
    pub fn has_pending_request(&self, uid: &str) -> bool {
        self.pending_requests
            .iter()
            .any(|r| r.user_id == uid && r.status == JoinRequestStatus::Pending)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubGroupView {
    #[serde(flatten)]
    pub sub_group: SubGroup,
    pub member_count: usize,
    pub is_member: bool,
    pub is_group_admin: bool,
    pub has_pending_request: bool,
}

impl SubGroupView {
    pub fn for_viewer(sub_group: SubGroup, viewer_uid: &str) -> Self {
        Self {
            member_count: sub_group.members.len(),
            is_member: sub_group.members.iter().any(|m| m == viewer_uid),
            is_group_admin: sub_group.group_admins.iter().any(|m| m == viewer_uid),
            has_pending_request: sub_group.has_pending_request(viewer_uid),
            sub_group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Embedded in SubGroup.pendingRequests. Rejection is status-only — the
/// record stays in the list as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_profile_image: Option<String>,
    pub status: JoinRequestStatus,
    pub created_at: DateTime<Utc>,
}

// ─── Message ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Contact,
    Announcement,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub emoji: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRecord {
    /// Content as it was before the edit.
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Exactly one of group_id / chat_id is set.
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    pub sender_id: String,
    /// Sender identity snapshotted at send time, never re-looked-up.
    pub sender_name: String,
    #[serde(default)]
    pub sender_profile_image: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<String>,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_for_everyone: bool,
    /// Per-viewer soft delete overlay; only ever grows.
    #[serde(default)]
    pub deleted_for: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Snapshot of the replied-to content, frozen at reply time (≤100 chars).
    #[serde(default)]
    pub reply_to_content: Option<String>,
    #[serde(default)]
    pub reply_to_sender_name: Option<String>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edit_history: Vec<EditRecord>,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub delivered_to: Vec<String>,
    #[serde(default)]
    pub read_by: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivateMessageRequest {
    pub receiver_id: String,
    #[serde(flatten)]
    pub message: SendMessageRequest,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    #[serde(default)]
    pub is_typing: bool,
}

// ─── Legacy flat groups ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictedEntry {
    pub uid: String,
    pub until: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub city: String,
    pub is_public: bool,
    pub created_by: String,
    pub created_by_name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub banned_users: Vec<String>,
    #[serde(default)]
    pub restricted_users: Vec<RestrictedEntry>,
    #[serde(default)]
    pub pinned_messages: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGroupView {
    #[serde(flatten)]
    pub group: LegacyGroup,
    pub member_count: usize,
    pub is_member: bool,
    pub is_admin: bool,
}

impl LegacyGroupView {
    pub fn for_viewer(group: LegacyGroup, viewer_uid: &str) -> Self {
        Self {
            member_count: group.members.len(),
            is_member: group.members.iter().any(|m| m == viewer_uid),
            is_admin: group.admins.iter().any(|m| m == viewer_uid)
                || group.created_by == viewer_uid,
            group,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RestrictRequest {
    #[serde(default = "default_restrict_hours")]
    pub hours: i64,
    pub reason: Option<String>,
}

fn default_restrict_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_public: Option<bool>,
}

// ─── Sub-group management requests ─────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Defaults to one past the community's current top tier.
    pub level: Option<i64>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

// ─── Feed ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_profile_image: Option<String>,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub shares: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub is_liked: bool,
    pub like_count: usize,
    pub comment_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_profile_image: Option<String>,
    pub content: String,
    #[serde(default)]
    pub likes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

// ─── Polls ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub votes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: String,
    pub group_id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_by: String,
    pub created_by_name: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub multiple_choice: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub multiple_choice: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_id: String,
}

// ─── Service listings ──────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListing {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub city: String,
    pub contact_phone: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: String,
    pub category: String,
}

// ─── Admin surface ─────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AdminSearchQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub total_communities: u64,
    pub total_sub_groups: u64,
    pub total_groups: u64,
    pub total_messages: u64,
    pub total_posts: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub app_name: Option<String>,
    pub max_file_size_mb: Option<i64>,
    pub allow_registration: Option<bool>,
}

// ─── System settings ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    #[serde(rename = "type")]
    pub kind: String,
    pub app_name: String,
    pub admin_email: String,
    pub max_file_size_mb: i64,
    pub allow_registration: bool,
}
