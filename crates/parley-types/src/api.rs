use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::perms::{PermissionSet, Role};

// -- JWT Claims --

/// JWT claims shared between parley-api (REST middleware) and parley-gateway
/// (WebSocket Identify). Canonical definition lives here in parley-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Join by group id, slug, or invite code. First match wins.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinGroupRequest {
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub invite_code: String,
    pub is_private: bool,
    pub created_by: Uuid,
    pub member_count: usize,
    /// Whether the requesting user can manage this group.
    pub is_admin: bool,
    pub members: Vec<MemberResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Members --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub user_id: Uuid,
    pub group_id: Uuid,
    pub role: Role,
    pub permissions: PermissionSet,
    pub name: String,
    pub email: String,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

// -- Topics --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTopicRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTopicRequest {
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub kind: String,
    pub reply_to: Option<Uuid>,
    pub media_url: Option<String>,
    pub deleted: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reactions: Vec<ReactionGroup>,
    pub seen_by: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}
