//! Database row types — these map directly to SQLite rows.
//! Distinct from parley-types API models to keep the DB layer independent.

use parley_types::perms::{PermissionSet, Role};
use tracing::warn;

use crate::error::StoreError;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub invite_code: String,
    pub is_private: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Membership row, joined with the user's name and email for listings.
#[derive(Debug)]
pub struct MemberRow {
    pub user_id: String,
    pub group_id: String,
    pub role: Role,
    pub permissions: PermissionSet,
    pub user_name: String,
    pub user_email: String,
    pub created_at: String,
}

pub struct TopicRow {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub created_by: String,
    pub created_at: String,
}

/// Message row, joined with the sender's name.
pub struct MessageRow {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub kind: String,
    pub reply_to: Option<String>,
    pub media_url: Option<String>,
    pub deleted: bool,
    pub created_at: String,
}

pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}

pub struct SeenRow {
    pub user_id: String,
    pub message_id: String,
    pub seen_at: String,
}

pub(crate) fn decode_role(raw: &str) -> Result<Role, StoreError> {
    Role::parse(raw).ok_or_else(|| StoreError::Corrupt(format!("unknown role '{raw}'")))
}

pub(crate) fn decode_permissions(raw: &str) -> Result<PermissionSet, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn encode_permissions(perms: &PermissionSet) -> Result<String, StoreError> {
    Ok(serde_json::to_string(perms)?)
}

/// Timestamps are written as RFC 3339; tolerate SQLite's bare
/// "YYYY-MM-DD HH:MM:SS" form for rows from older databases.
pub fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            chrono::DateTime::default()
        })
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
