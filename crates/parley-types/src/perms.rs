//! Roles, permission sets, and the permission evaluator.
//!
//! A membership carries a [`Role`] and a [`PermissionSet`]. Roles are a closed
//! enum; the permission set is a fixed-field record persisted as JSON, not an
//! open map. [`can_perform`] is the single decision point consulted before
//! every mutating group operation. It is pure and total: every (role, action)
//! pair yields a boolean, never an error.

use serde::{Deserialize, Serialize};

/// Role of a member within a group.
///
/// Exactly one CREATOR exists per group, created with the group itself.
/// ADMIN and MEMBER memberships come from join/add flows and may be
/// promoted/demoted; the CREATOR membership may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Creator,
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Creator => "CREATOR",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "CREATOR" => Some(Role::Creator),
            "ADMIN" => Some(Role::Admin),
            "MEMBER" => Some(Role::Member),
            _ => None,
        }
    }

    /// The canonical permission template assigned whenever this role is
    /// assigned by creation, promotion, or demotion.
    pub fn template(&self) -> PermissionSet {
        match self {
            Role::Creator => CREATOR_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Member => DEFAULT_MEMBER_PERMISSIONS,
        }
    }
}

/// An action a member may attempt within a group.
///
/// The first eight map one-to-one onto [`PermissionSet`] flags. `DeleteGroup`
/// has no flag: it is decided purely by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupAction {
    SendMessage,
    UploadFiles,
    CreateTopics,
    InviteMembers,
    ViewMembers,
    ManageMembers,
    ManagePermissions,
    ManageTopics,
    DeleteGroup,
}

/// Per-member capability flags, stored as a JSON column on the membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PermissionSet {
    pub send_message: bool,
    pub upload_files: bool,
    pub create_topics: bool,
    pub invite_members: bool,
    pub view_members: bool,
    pub manage_members: bool,
    pub manage_permissions: bool,
    pub manage_topics: bool,
}

impl PermissionSet {
    pub fn allows(&self, action: GroupAction) -> bool {
        match action {
            GroupAction::SendMessage => self.send_message,
            GroupAction::UploadFiles => self.upload_files,
            GroupAction::CreateTopics => self.create_topics,
            GroupAction::InviteMembers => self.invite_members,
            GroupAction::ViewMembers => self.view_members,
            GroupAction::ManageMembers => self.manage_members,
            GroupAction::ManagePermissions => self.manage_permissions,
            GroupAction::ManageTopics => self.manage_topics,
            // No flag grants group deletion; that is role-gated.
            GroupAction::DeleteGroup => false,
        }
    }

    /// Overlay the flags named in a partial update onto this set.
    pub fn apply(&mut self, patch: &PermissionUpdate) {
        if let Some(v) = patch.send_message {
            self.send_message = v;
        }
        if let Some(v) = patch.upload_files {
            self.upload_files = v;
        }
        if let Some(v) = patch.create_topics {
            self.create_topics = v;
        }
        if let Some(v) = patch.invite_members {
            self.invite_members = v;
        }
        if let Some(v) = patch.view_members {
            self.view_members = v;
        }
        if let Some(v) = patch.manage_members {
            self.manage_members = v;
        }
        if let Some(v) = patch.manage_permissions {
            self.manage_permissions = v;
        }
        if let Some(v) = patch.manage_topics {
            self.manage_topics = v;
        }
    }
}

/// Partial permission update: only the named flags change.
///
/// `deny_unknown_fields` rejects payloads that are not a flat map over the
/// known flags, and serde rejects non-boolean values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PermissionUpdate {
    pub send_message: Option<bool>,
    pub upload_files: Option<bool>,
    pub create_topics: Option<bool>,
    pub invite_members: Option<bool>,
    pub view_members: Option<bool>,
    pub manage_members: Option<bool>,
    pub manage_permissions: Option<bool>,
    pub manage_topics: Option<bool>,
}

/// The creator holds every capability.
pub const CREATOR_PERMISSIONS: PermissionSet = PermissionSet {
    send_message: true,
    upload_files: true,
    create_topics: true,
    invite_members: true,
    view_members: true,
    manage_members: true,
    manage_permissions: true,
    manage_topics: true,
};

/// Admins hold every flag; group deletion is still denied by role in
/// [`can_perform`].
pub const ADMIN_PERMISSIONS: PermissionSet = CREATOR_PERMISSIONS;

/// Template for plain members: chat and invite, no management.
pub const DEFAULT_MEMBER_PERMISSIONS: PermissionSet = PermissionSet {
    send_message: true,
    upload_files: true,
    create_topics: false,
    invite_members: true,
    view_members: true,
    manage_members: false,
    manage_permissions: false,
    manage_topics: false,
};

/// Decide whether a member may perform an action.
///
/// CREATOR: always allowed. ADMIN: everything except `DeleteGroup`.
/// MEMBER: whatever their flags grant.
pub fn can_perform(role: Role, permissions: &PermissionSet, action: GroupAction) -> bool {
    match role {
        Role::Creator => true,
        Role::Admin => !matches!(action, GroupAction::DeleteGroup),
        Role::Member => permissions.allows(action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [GroupAction; 9] = [
        GroupAction::SendMessage,
        GroupAction::UploadFiles,
        GroupAction::CreateTopics,
        GroupAction::InviteMembers,
        GroupAction::ViewMembers,
        GroupAction::ManageMembers,
        GroupAction::ManagePermissions,
        GroupAction::ManageTopics,
        GroupAction::DeleteGroup,
    ];

    #[test]
    fn creator_can_do_everything() {
        for action in ALL_ACTIONS {
            assert!(can_perform(Role::Creator, &CREATOR_PERMISSIONS, action));
        }
        // Even with an all-false set: creator is decided by role alone.
        let none = PermissionSet {
            send_message: false,
            upload_files: false,
            create_topics: false,
            invite_members: false,
            view_members: false,
            manage_members: false,
            manage_permissions: false,
            manage_topics: false,
        };
        for action in ALL_ACTIONS {
            assert!(can_perform(Role::Creator, &none, action));
        }
    }

    #[test]
    fn admin_can_do_everything_except_delete_group() {
        for action in ALL_ACTIONS {
            let allowed = can_perform(Role::Admin, &ADMIN_PERMISSIONS, action);
            assert_eq!(allowed, action != GroupAction::DeleteGroup, "{action:?}");
        }
    }

    #[test]
    fn member_is_gated_by_flags() {
        let perms = DEFAULT_MEMBER_PERMISSIONS;
        assert!(can_perform(Role::Member, &perms, GroupAction::SendMessage));
        assert!(can_perform(Role::Member, &perms, GroupAction::InviteMembers));
        assert!(!can_perform(Role::Member, &perms, GroupAction::ManageMembers));
        assert!(!can_perform(Role::Member, &perms, GroupAction::ManageTopics));
        assert!(!can_perform(Role::Member, &perms, GroupAction::DeleteGroup));
    }

    #[test]
    fn member_with_all_flags_still_cannot_delete_group() {
        assert!(!can_perform(
            Role::Member,
            &CREATOR_PERMISSIONS,
            GroupAction::DeleteGroup
        ));
    }

    #[test]
    fn evaluator_is_total() {
        for role in [Role::Creator, Role::Admin, Role::Member] {
            for action in ALL_ACTIONS {
                // Must yield a boolean for every pair without panicking.
                let _ = can_perform(role, &DEFAULT_MEMBER_PERMISSIONS, action);
            }
        }
    }

    #[test]
    fn permission_update_overlays_only_named_flags() {
        let mut perms = DEFAULT_MEMBER_PERMISSIONS;
        let patch: PermissionUpdate =
            serde_json::from_str(r#"{"manageTopics": true, "sendMessage": false}"#).unwrap();
        perms.apply(&patch);
        assert!(perms.manage_topics);
        assert!(!perms.send_message);
        // Untouched flags keep their template values.
        assert!(perms.upload_files);
        assert!(!perms.manage_members);
    }

    #[test]
    fn permission_update_rejects_unknown_or_non_boolean_fields() {
        assert!(serde_json::from_str::<PermissionUpdate>(r#"{"launchMissiles": true}"#).is_err());
        assert!(serde_json::from_str::<PermissionUpdate>(r#"{"sendMessage": "yes"}"#).is_err());
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Creator, Role::Admin, Role::Member] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("OWNER"), None);
    }

    #[test]
    fn permission_set_round_trips_through_json() {
        let json = serde_json::to_string(&DEFAULT_MEMBER_PERMISSIONS).unwrap();
        assert!(json.contains("\"sendMessage\":true"));
        let back: PermissionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DEFAULT_MEMBER_PERMISSIONS);
    }
}
