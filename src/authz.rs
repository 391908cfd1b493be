//! Privilege resolution for the community hierarchy.
//!
//! Levels are strictly ordered: GlobalAdmin > SuperAdmin > SubGroupAdmin >
//! None. The global admin identity is configured, not stored; a user whose
//! email matches the configured admin email (case-insensitively) is
//! GlobalAdmin everywhere regardless of document flags.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::{Community, LegacyGroup, SubGroup, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivilegeLevel {
    None,
    SubGroupAdmin,
    SuperAdmin,
    GlobalAdmin,
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrivilegeLevel::None => "member",
            PrivilegeLevel::SubGroupAdmin => "group admin",
            PrivilegeLevel::SuperAdmin => "super admin",
            PrivilegeLevel::GlobalAdmin => "global admin",
        };
        f.write_str(name)
    }
}

/// True for the configured admin identity or for users flagged isAdmin.
pub fn is_global_admin(user: &UserProfile, admin_email: &str) -> bool {
    user.is_admin || user.email.eq_ignore_ascii_case(admin_email)
}

/// Effective privilege of `user` in the context of an optional community
/// and sub-group. Checks short-circuit from the highest level down.
pub fn resolve(
    user: &UserProfile,
    community: Option<&Community>,
    sub_group: Option<&SubGroup>,
    admin_email: &str,
) -> PrivilegeLevel {
    if is_global_admin(user, admin_email) {
        return PrivilegeLevel::GlobalAdmin;
    }
    if let Some(c) = community {
        if c.super_admins.iter().any(|u| u == &user.uid) {
            return PrivilegeLevel::SuperAdmin;
        }
    }
    if let Some(sg) = sub_group {
        if sg.group_admins.iter().any(|u| u == &user.uid) {
            return PrivilegeLevel::SubGroupAdmin;
        }
    }
    PrivilegeLevel::None
}

/// Privilege within a legacy flat group. Group admins and the creator map
/// to SubGroupAdmin.
pub fn resolve_legacy(user: &UserProfile, group: &LegacyGroup, admin_email: &str) -> PrivilegeLevel {
    if is_global_admin(user, admin_email) {
        return PrivilegeLevel::GlobalAdmin;
    }
    if group.admins.iter().any(|u| u == &user.uid) || group.created_by == user.uid {
        return PrivilegeLevel::SubGroupAdmin;
    }
    PrivilegeLevel::None
}

/// Fail with Forbidden (carrying the required tier) unless `actual` meets it.
pub fn require(actual: PrivilegeLevel, required: PrivilegeLevel) -> AppResult<()> {
    if actual >= required {
        Ok(())
    } else {
        Err(AppError::Forbidden { required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(uid: &str, email: &str) -> UserProfile {
        UserProfile {
            uid: uid.into(),
            email: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone: None,
            city: "Ankara".into(),
            occupation: None,
            profile_image_url: None,
            is_admin: false,
            is_banned: false,
            is_restricted: false,
            restricted_until: None,
            groups: vec![],
            communities: vec![],
            created_at: Utc::now(),
        }
    }

    fn community(super_admins: &[&str]) -> Community {
        Community {
            id: "c1".into(),
            name: "Ankara Community".into(),
            description: None,
            city: "Ankara".into(),
            image_url: None,
            super_admins: super_admins.iter().map(|s| s.to_string()).collect(),
            members: vec![],
            sub_groups: vec![],
            announcement_channel_id: None,
            created_by: "system".into(),
            created_by_name: "System".into(),
            created_at: Utc::now(),
        }
    }

    fn sub_group(group_admins: &[&str]) -> SubGroup {
        SubGroup {
            id: "sg1".into(),
            community_id: "c1".into(),
            name: "Tier 1".into(),
            description: None,
            image_url: None,
            level: 1,
            group_admins: group_admins.iter().map(|s| s.to_string()).collect(),
            members: vec![],
            pending_requests: vec![],
            is_public: true,
            created_by: "system".into(),
            created_by_name: "System".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ordering_is_strict() {
        assert!(PrivilegeLevel::GlobalAdmin > PrivilegeLevel::SuperAdmin);
        assert!(PrivilegeLevel::SuperAdmin > PrivilegeLevel::SubGroupAdmin);
        assert!(PrivilegeLevel::SubGroupAdmin > PrivilegeLevel::None);
    }

    #[test]
    fn configured_email_wins_case_insensitively() {
        let u = user("u1", "Root@Agora.Test");
        assert!(is_global_admin(&u, "root@agora.test"));
        assert_eq!(
            resolve(&u, None, None, "root@agora.test"),
            PrivilegeLevel::GlobalAdmin
        );
    }

    #[test]
    fn is_admin_flag_grants_global() {
        let mut u = user("u1", "someone@example.com");
        u.is_admin = true;
        assert_eq!(resolve(&u, None, None, "root@agora.test"), PrivilegeLevel::GlobalAdmin);
    }

    #[test]
    fn super_admin_outranks_sub_group_admin() {
        let u = user("u1", "someone@example.com");
        let c = community(&["u1"]);
        let sg = sub_group(&["u1"]);
        assert_eq!(
            resolve(&u, Some(&c), Some(&sg), "root@agora.test"),
            PrivilegeLevel::SuperAdmin
        );
    }

    #[test]
    fn sub_group_admin_only_in_that_sub_group() {
        let u = user("u1", "someone@example.com");
        let c = community(&[]);
        let sg = sub_group(&["u1"]);
        assert_eq!(
            resolve(&u, Some(&c), Some(&sg), "root@agora.test"),
            PrivilegeLevel::SubGroupAdmin
        );
        assert_eq!(
            resolve(&u, Some(&c), Some(&sub_group(&[])), "root@agora.test"),
            PrivilegeLevel::None
        );
    }

    #[test]
    fn require_reports_missing_tier() {
        let err = require(PrivilegeLevel::None, PrivilegeLevel::SuperAdmin).unwrap_err();
        match err {
            AppError::Forbidden { required } => assert_eq!(required, PrivilegeLevel::SuperAdmin),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
