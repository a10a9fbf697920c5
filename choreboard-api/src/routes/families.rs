/// Family and membership endpoints
///
/// # Endpoints
///
/// - `POST /families` - Create a family (creator becomes owner)
/// - `GET /families` - List my families with members expanded
/// - `POST /families/join` - Join a family by invite code (idempotent)
/// - `GET /families/:id` - Get one family (member only)
/// - `POST /families/:id/invite` - Generate an invite code (owner only)
/// - `PATCH /families/:familyId/members/:memberId/role` - Change a role (owner only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use choreboard_shared::{
    auth::middleware::AuthContext,
    error::DomainError,
    models::{
        family::{Family, FamilyWithMembers},
        membership::{FamilyRole, Membership},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{app::AppState, error::ApiResult};

/// Create family request
#[derive(Debug, Deserialize)]
pub struct CreateFamilyRequest {
    /// Family name
    pub name: String,
}

/// Join family request
#[derive(Debug, Deserialize)]
pub struct JoinFamilyRequest {
    /// Invite code (normalized before lookup)
    pub code: String,
}

/// Role change request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    /// New role: "owner", "admin", or "member"
    pub role: String,
}

/// Single-family response wrapper
#[derive(Debug, Serialize)]
pub struct FamilyResponse {
    pub family: FamilyWithMembers,
}

/// `POST /families`
///
/// Creates the family and the owner membership atomically.
pub async fn create_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateFamilyRequest>,
) -> ApiResult<(StatusCode, Json<FamilyResponse>)> {
    let family = Family::create_with_owner(&state.db, auth.user_id, &req.name).await?;

    tracing::info!(family_id = %family.family.id, owner_id = %auth.user_id, "Family created");

    Ok((StatusCode::CREATED, Json(FamilyResponse { family })))
}

/// `GET /families`
pub async fn list_families(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<serde_json::Value>> {
    let families = Family::list_for_user(&state.db, auth.user_id).await?;

    Ok(Json(json!({ "families": families })))
}

/// `POST /families/join`
///
/// Idempotent: joining a family the user already belongs to returns 200
/// with the existing family; a fresh join returns 201.
pub async fn join_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<JoinFamilyRequest>,
) -> ApiResult<(StatusCode, Json<FamilyResponse>)> {
    let (family, newly_joined) = Family::join_by_code(&state.db, auth.user_id, &req.code).await?;

    let status = if newly_joined {
        tracing::info!(family_id = %family.family.id, user_id = %auth.user_id, "User joined family");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(FamilyResponse { family })))
}

/// `GET /families/:id`
///
/// 404 when the family does not exist, 403 when it exists but the
/// requester is not a member.
pub async fn get_family(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<FamilyResponse>> {
    let family = Family::get_for_member(&state.db, auth.user_id, family_id).await?;

    Ok(Json(FamilyResponse { family }))
}

/// `POST /families/:id/invite`
///
/// Owner only. Regenerates and returns the shareable invite code.
pub async fn create_invite_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let code = Family::regenerate_invite_code(
        &state.db,
        auth.user_id,
        family_id,
        state.config.invite.code_length,
    )
    .await?;

    Ok(Json(json!({ "inviteCode": code })))
}

/// `PATCH /families/:familyId/members/:memberId/role`
///
/// Owner only. The owner role itself is immutable through this endpoint.
pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((family_id, member_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let role = FamilyRole::parse(&req.role).ok_or_else(|| {
        DomainError::validation("role must be one of: owner, admin, member")
    })?;

    let member =
        Membership::update_member_role(&state.db, auth.user_id, family_id, member_id, role).await?;

    tracing::info!(
        family_id = %family_id,
        member_id = %member_id,
        role = role.as_str(),
        "Member role updated"
    );

    Ok(Json(json!({ "member": member })))
}
