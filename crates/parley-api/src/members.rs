use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use parley_db::models::MemberRow;
use parley_db::StoreError;
use parley_types::api::{AddMemberRequest, Claims};
use parley_types::events::GatewayEvent;
use parley_types::perms::{can_perform, GroupAction, PermissionUpdate, Role};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::groups::{member_response, require_group};

/// Load the actor's membership and check a capability, authorize-then-mutate
/// style. Non-members are rejected before the action is even considered.
pub(crate) fn authorize(
    state: &AppState,
    user: Uuid,
    group_id: Uuid,
    action: GroupAction,
) -> ApiResult<MemberRow> {
    let membership = state
        .db
        .get_member(&user.to_string(), &group_id.to_string())?
        .ok_or_else(|| ApiError::Forbidden("you are not a member of this group".into()))?;

    if !can_perform(membership.role, &membership.permissions, action) {
        return Err(ApiError::Forbidden("permission denied".into()));
    }
    Ok(membership)
}

/// Group-scoped listings hide the group's existence from non-members.
pub(crate) fn require_membership(
    state: &AppState,
    user: Uuid,
    group_id: Uuid,
) -> ApiResult<MemberRow> {
    state
        .db
        .get_member(&user.to_string(), &group_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("you are not a member of this group".into()))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    require_membership(&state, claims.sub, group_id)?;

    let members = state
        .db
        .list_members(&group_id.to_string())?
        .iter()
        .map(member_response)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(members))
}

/// Admin-driven add. The target gets the canonical template for the
/// requested role (default MEMBER).
pub async fn add_member(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    require_group(&state, group_id)?;
    authorize(&state, claims.sub, group_id, GroupAction::ManageMembers)?;

    let role = req.role.unwrap_or(Role::Member);
    if role == Role::Creator {
        return Err(ApiError::Validation(
            "a member cannot be added as creator".into(),
        ));
    }

    let member = state
        .db
        .insert_member(&req.user_id.to_string(), &group_id.to_string(), role)?;

    state.dispatcher.broadcast(GatewayEvent::MemberJoin {
        group_id,
        user_id: req.user_id,
        name: member.user_name.clone(),
    });

    Ok((StatusCode::CREATED, Json(member_response(&member)?)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    authorize(&state, claims.sub, group_id, GroupAction::ManageMembers)?;

    state
        .db
        .remove_member(&user_id.to_string(), &group_id.to_string())
        .map_err(|e| match e {
            StoreError::CreatorImmutable => {
                ApiError::Forbidden("the creator cannot be removed".into())
            }
            other => other.into(),
        })?;

    state
        .dispatcher
        .broadcast(GatewayEvent::MemberLeave { group_id, user_id });

    Ok(Json(serde_json::json!({ "removed": true })))
}

pub async fn promote_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    authorize(&state, claims.sub, group_id, GroupAction::ManageMembers)?;
    let member = set_role(&state, group_id, user_id, Role::Admin, "promoted")?;
    Ok(Json(member))
}

pub async fn demote_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    authorize(&state, claims.sub, group_id, GroupAction::ManageMembers)?;
    let member = set_role(&state, group_id, user_id, Role::Member, "demoted")?;
    Ok(Json(member))
}

fn set_role(
    state: &AppState,
    group_id: Uuid,
    user_id: Uuid,
    role: Role,
    verb: &str,
) -> ApiResult<parley_types::api::MemberResponse> {
    let member = state
        .db
        .set_member_role(&user_id.to_string(), &group_id.to_string(), role)
        .map_err(|e| match e {
            // Targeting the creator is a bad request, not a permission issue.
            StoreError::CreatorImmutable => {
                ApiError::Validation(format!("the creator cannot be {verb}"))
            }
            other => other.into(),
        })?;
    member_response(&member)
}

/// Merge individual permission flags onto a membership. The payload must be
/// a flat map of known flag names to booleans.
pub async fn update_permissions(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<impl IntoResponse> {
    authorize(&state, claims.sub, group_id, GroupAction::ManagePermissions)?;

    let patch: PermissionUpdate = serde_json::from_value(body)
        .map_err(|e| ApiError::Validation(format!("invalid permissions payload: {e}")))?;

    let member =
        state
            .db
            .update_member_permissions(&user_id.to_string(), &group_id.to_string(), &patch)?;

    Ok(Json(member_response(&member)?))
}
