use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use parley_db::models::{parse_timestamp, MessageRow};
use parley_types::api::{
    Claims, MessageResponse, ReactionGroup, ReactionRequest, SendMessageRequest,
    UpdateMessageRequest,
};
use parley_types::events::GatewayEvent;
use parley_types::perms::{can_perform, GroupAction};

use crate::auth::AppState;
use crate::error::{parse_id, ApiError, ApiResult};
use crate::members::{authorize, require_membership};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

const MESSAGE_KINDS: [&str; 4] = ["TEXT", "IMAGE", "VIDEO", "FILE"];

/// Clients send lowercase kinds like 'text'; anything unrecognized is TEXT.
fn normalize_kind(raw: Option<&str>) -> String {
    let upper = raw.unwrap_or("TEXT").to_ascii_uppercase();
    if MESSAGE_KINDS.contains(&upper.as_str()) {
        upper
    } else {
        "TEXT".to_string()
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let membership = authorize(&state, claims.sub, group_id, GroupAction::SendMessage)?;

    if req.media_url.is_some()
        && !can_perform(
            membership.role,
            &membership.permissions,
            GroupAction::UploadFiles,
        )
    {
        return Err(ApiError::Forbidden(
            "you do not have permission to upload files".into(),
        ));
    }

    let message_id = Uuid::new_v4();
    let kind = normalize_kind(req.kind.as_deref());

    state.db.insert_message(
        &message_id.to_string(),
        &group_id.to_string(),
        &claims.sub.to_string(),
        &req.content,
        &kind,
        req.reply_to.map(|id| id.to_string()).as_deref(),
        req.media_url.as_deref(),
    )?;

    let now = chrono::Utc::now();

    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        id: message_id,
        group_id,
        sender_id: claims.sub,
        sender_name: claims.name.clone(),
        content: req.content.clone(),
        kind: kind.clone(),
        reply_to: req.reply_to,
        timestamp: now,
    });

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            group_id,
            sender_id: claims.sub,
            sender_name: claims.name.clone(),
            content: req.content,
            kind,
            reply_to: req.reply_to,
            media_url: req.media_url,
            deleted: false,
            created_at: now,
            reactions: vec![],
            seen_by: vec![],
        }),
    ))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;

    // Run the blocking DB queries off the async runtime
    let db = state.clone();
    let gid = group_id.to_string();
    let limit = query.limit.min(200);
    let before = query.before;

    let (rows, reaction_rows, seen_rows) = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_messages(&gid, limit, before.as_deref())?;

        let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reaction_rows = db.db.reactions_for_messages(&message_ids)?;
        let seen_rows = db.db.seen_for_messages(&message_ids)?;

        Ok::<_, parley_db::StoreError>((rows, reaction_rows, seen_rows))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("task join failed"))
    })??;

    // Group reactions by message_id -> emoji -> user_ids
    let mut reaction_map: HashMap<String, HashMap<String, Vec<Uuid>>> = HashMap::new();
    for r in &reaction_rows {
        let emoji_map = reaction_map.entry(r.message_id.clone()).or_default();
        let user_ids = emoji_map.entry(r.emoji.clone()).or_default();
        if let Ok(uid) = r.user_id.parse::<Uuid>() {
            user_ids.push(uid);
        }
    }

    let mut seen_map: HashMap<String, Vec<Uuid>> = HashMap::new();
    for s in &seen_rows {
        if let Ok(uid) = s.user_id.parse::<Uuid>() {
            seen_map.entry(s.message_id.clone()).or_default().push(uid);
        }
    }

    let messages = rows
        .iter()
        .map(|row| message_response(row, &reaction_map, &seen_map))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(messages))
}

/// Edit a message. Sender only.
pub async fn update_message(
    State(state): State<AppState>,
    Path((group_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;
    let message = require_message(&state, group_id, message_id)?;

    if message.sender_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "only the sender can edit a message".into(),
        ));
    }

    state
        .db
        .update_message_content(&message.id, &req.content)?;

    state.dispatcher.broadcast(GatewayEvent::MessageUpdate {
        id: message_id,
        group_id,
        content: req.content.clone(),
    });

    Ok(Json(serde_json::json!({ "updated": true })))
}

/// Soft-delete a message. Sender, or a member holding `manageMembers`.
pub async fn delete_message(
    State(state): State<AppState>,
    Path((group_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let membership = require_membership(&state, claims.sub, group_id)?;
    let message = require_message(&state, group_id, message_id)?;

    let moderates = can_perform(
        membership.role,
        &membership.permissions,
        GroupAction::ManageMembers,
    );
    if message.sender_id != claims.sub.to_string() && !moderates {
        return Err(ApiError::Forbidden(
            "you cannot delete this message".into(),
        ));
    }

    state.db.soft_delete_message(&message.id)?;

    state.dispatcher.broadcast(GatewayEvent::MessageDelete {
        id: message_id,
        group_id,
    });

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// React to a message. Idempotent per (user, message, emoji).
pub async fn react_to_message(
    State(state): State<AppState>,
    Path((group_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;
    require_message(&state, group_id, message_id)?;

    let added = state
        .db
        .add_reaction(&message_id.to_string(), &claims.sub.to_string(), &req.emoji)?;

    if added {
        state.dispatcher.broadcast(GatewayEvent::ReactionAdd {
            group_id,
            message_id,
            user_id: claims.sub,
            emoji: req.emoji,
        });
    }

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "added": added }))))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Path((group_id, message_id, emoji)): Path<(Uuid, Uuid, String)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;

    let removed =
        state
            .db
            .remove_reaction(&message_id.to_string(), &claims.sub.to_string(), &emoji)?;

    if removed {
        state.dispatcher.broadcast(GatewayEvent::ReactionRemove {
            group_id,
            message_id,
            user_id: claims.sub,
            emoji,
        });
    }

    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// Mark a message as seen. A repeat marking refreshes the timestamp.
pub async fn mark_seen(
    State(state): State<AppState>,
    Path((group_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;
    require_message(&state, group_id, message_id)?;

    state
        .db
        .mark_seen(&message_id.to_string(), &claims.sub.to_string())?;

    state.dispatcher.broadcast(GatewayEvent::MessageSeen {
        group_id,
        message_id,
        user_id: claims.sub,
    });

    Ok(Json(serde_json::json!({ "seen": true })))
}

fn require_message(state: &AppState, group_id: Uuid, message_id: Uuid) -> ApiResult<MessageRow> {
    let message = state
        .db
        .get_message(&message_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("message not found".into()))?;
    if message.group_id != group_id.to_string() {
        return Err(ApiError::NotFound("message not found".into()));
    }
    Ok(message)
}

fn message_response(
    row: &MessageRow,
    reaction_map: &HashMap<String, HashMap<String, Vec<Uuid>>>,
    seen_map: &HashMap<String, Vec<Uuid>>,
) -> ApiResult<MessageResponse> {
    let reactions = reaction_map
        .get(&row.id)
        .map(|emoji_map| {
            emoji_map
                .iter()
                .map(|(emoji, user_ids)| ReactionGroup {
                    emoji: emoji.clone(),
                    count: user_ids.len(),
                    user_ids: user_ids.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    let reply_to = match &row.reply_to {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    Ok(MessageResponse {
        id: parse_id(&row.id)?,
        group_id: parse_id(&row.group_id)?,
        sender_id: parse_id(&row.sender_id)?,
        sender_name: row.sender_name.clone(),
        content: row.content.clone(),
        kind: row.kind.clone(),
        reply_to,
        media_url: row.media_url.clone(),
        deleted: row.deleted,
        created_at: parse_timestamp(&row.created_at),
        reactions,
        seen_by: seen_map.get(&row.id).cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_kind;

    #[test]
    fn message_kinds_are_normalized() {
        assert_eq!(normalize_kind(None), "TEXT");
        assert_eq!(normalize_kind(Some("text")), "TEXT");
        assert_eq!(normalize_kind(Some("Image")), "IMAGE");
        assert_eq!(normalize_kind(Some("carrier-pigeon")), "TEXT");
    }
}
