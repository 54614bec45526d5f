use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use parley_db::models::{parse_timestamp, TopicRow};
use parley_types::api::{Claims, CreateTopicRequest, TopicResponse, UpdateTopicRequest};
use parley_types::perms::{can_perform, GroupAction};

use crate::auth::AppState;
use crate::error::{parse_id, ApiError, ApiResult};
use crate::members::require_membership;

pub async fn create_topic(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTopicRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("topic title is required".into()));
    }

    let membership = require_membership(&state, claims.sub, group_id)?;
    if !can_perform(
        membership.role,
        &membership.permissions,
        GroupAction::ManageTopics,
    ) {
        return Err(ApiError::Forbidden(
            "you do not have permission to manage topics".into(),
        ));
    }

    let topic = state.db.create_topic(
        &group_id.to_string(),
        req.title.trim(),
        &claims.sub.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(topic_response(&topic)?)))
}

pub async fn list_topics(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;

    let topics = state
        .db
        .list_topics(&group_id.to_string())?
        .iter()
        .map(topic_response)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(topics))
}

pub async fn update_topic(
    State(state): State<AppState>,
    Path((group_id, topic_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTopicRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::Validation("topic title is required".into()));
    }

    let topic = authorize_topic_change(&state, claims.sub, group_id, topic_id)?;
    let updated = state.db.update_topic(&topic.id, req.title.trim())?;
    Ok(Json(topic_response(&updated)?))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Path((group_id, topic_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let topic = authorize_topic_change(&state, claims.sub, group_id, topic_id)?;
    state.db.delete_topic(&topic.id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Topic updates and deletes are allowed for holders of `manageTopics` and
/// for the topic's own creator.
fn authorize_topic_change(
    state: &AppState,
    user: Uuid,
    group_id: Uuid,
    topic_id: Uuid,
) -> ApiResult<TopicRow> {
    let membership = require_membership(state, user, group_id)?;

    let topic = state
        .db
        .get_topic(&topic_id.to_string(), &group_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("topic not found".into()))?;

    let manages = can_perform(
        membership.role,
        &membership.permissions,
        GroupAction::ManageTopics,
    );
    if !manages && topic.created_by != user.to_string() {
        return Err(ApiError::Forbidden(
            "you do not have permission to manage topics".into(),
        ));
    }
    Ok(topic)
}

fn topic_response(topic: &TopicRow) -> ApiResult<TopicResponse> {
    Ok(TopicResponse {
        id: parse_id(&topic.id)?,
        group_id: parse_id(&topic.group_id)?,
        title: topic.title.clone(),
        created_by: parse_id(&topic.created_by)?,
        created_at: parse_timestamp(&topic.created_at),
    })
}
