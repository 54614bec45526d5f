use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use parley_db::models::{parse_timestamp, GroupRow, MemberRow};
use parley_types::api::{
    Claims, CreateGroupRequest, GroupResponse, JoinGroupRequest, MemberResponse,
    UpdateGroupRequest,
};
use parley_types::events::GatewayEvent;
use parley_types::perms::{can_perform, GroupAction, Role};

use crate::auth::AppState;
use crate::error::{parse_id, ApiError, ApiResult};

/// Create a group. The caller becomes its CREATOR member atomically.
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("group name is required".into()));
    }

    let group = state.db.create_group(
        &claims.sub.to_string(),
        req.name.trim(),
        req.description.as_deref(),
        req.is_private,
    )?;

    let response = group_response(&state, &group, claims.sub)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Groups the caller belongs to, newest first.
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let groups = state.db.list_groups_for_user(&claims.sub.to_string())?;
    let responses = groups
        .iter()
        .map(|g| group_response(&state, g, claims.sub))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(responses))
}

pub async fn list_public_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let groups = state.db.list_public_groups()?;
    let responses = groups
        .iter()
        .map(|g| group_response(&state, g, claims.sub))
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(responses))
}

/// Fetch a group by id, slug, or invite code.
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_ref): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let group = state
        .db
        .find_group_by_ref(&group_ref)?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;
    Ok(Json(group_response(&state, &group, claims.sub)?))
}

/// Update name/description/privacy. Creator only.
pub async fn update_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let group = require_group(&state, group_id)?;
    if group.created_by != claims.sub.to_string() {
        return Err(ApiError::Forbidden(
            "only the creator can update this group".into(),
        ));
    }
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("group name cannot be empty".into()));
        }
    }

    let updated = state.db.update_group(
        &group_id.to_string(),
        req.name.as_deref().map(str::trim),
        req.description.as_deref(),
        req.is_private,
    )?;
    Ok(Json(group_response(&state, &updated, claims.sub)?))
}

/// Delete a group and everything in it. Creator only, decided by the
/// permission evaluator: no role other than CREATOR passes `DeleteGroup`.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_group(&state, group_id)?;

    let membership = state
        .db
        .get_member(&claims.sub.to_string(), &group_id.to_string())?
        .ok_or_else(|| ApiError::Forbidden("you are not a member of this group".into()))?;

    if !can_perform(
        membership.role,
        &membership.permissions,
        GroupAction::DeleteGroup,
    ) {
        return Err(ApiError::Forbidden(
            "only the creator can delete this group".into(),
        ));
    }

    state.db.delete_group(&group_id.to_string())?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Join by group id, slug, or invite code.
pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let reference = req
        .group
        .as_deref()
        .or(req.code.as_deref())
        .ok_or_else(|| ApiError::Validation("group id/slug or invite code is required".into()))?;

    let group = state
        .db
        .find_group_by_ref(reference)?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))?;

    let member = state
        .db
        .insert_member(&claims.sub.to_string(), &group.id, Role::Member)?;

    state.dispatcher.broadcast(GatewayEvent::MemberJoin {
        group_id: parse_id(&group.id)?,
        user_id: claims.sub,
        name: claims.name.clone(),
    });

    Ok((StatusCode::CREATED, Json(member_response(&member)?)))
}

/// Leave a group. The creator cannot leave.
pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .remove_member(&claims.sub.to_string(), &group_id.to_string())
        .map_err(|e| match e {
            parley_db::StoreError::CreatorImmutable => {
                ApiError::Forbidden("the creator cannot leave the group".into())
            }
            other => other.into(),
        })?;

    state.dispatcher.broadcast(GatewayEvent::MemberLeave {
        group_id,
        user_id: claims.sub,
    });

    Ok(Json(serde_json::json!({ "left": true })))
}

pub(crate) fn require_group(state: &AppState, group_id: Uuid) -> ApiResult<GroupRow> {
    state
        .db
        .get_group(&group_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("group not found".into()))
}

pub(crate) fn member_response(member: &MemberRow) -> ApiResult<MemberResponse> {
    Ok(MemberResponse {
        user_id: parse_id(&member.user_id)?,
        group_id: parse_id(&member.group_id)?,
        role: member.role,
        permissions: member.permissions,
        name: member.user_name.clone(),
        email: member.user_email.clone(),
        joined_at: parse_timestamp(&member.created_at),
    })
}

fn group_response(state: &AppState, group: &GroupRow, viewer: Uuid) -> ApiResult<GroupResponse> {
    let members = state.db.list_members(&group.id)?;
    let viewer_id = viewer.to_string();

    // "Admin" for display purposes: creator, admin role, or a member holding
    // the manageMembers flag.
    let is_admin = members.iter().any(|m| {
        m.user_id == viewer_id && can_perform(m.role, &m.permissions, GroupAction::ManageMembers)
    });

    Ok(GroupResponse {
        id: parse_id(&group.id)?,
        name: group.name.clone(),
        description: group.description.clone(),
        slug: group.slug.clone(),
        invite_code: group.invite_code.clone(),
        is_private: group.is_private,
        created_by: parse_id(&group.created_by)?,
        member_count: members.len(),
        is_admin,
        members: members
            .iter()
            .map(member_response)
            .collect::<ApiResult<Vec<_>>>()?,
        created_at: parse_timestamp(&group.created_at),
    })
}
