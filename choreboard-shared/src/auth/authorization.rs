/// Authorization helpers and permission checks
///
/// Choreboard's permission model is consulted before every mutation:
///
/// 1. **Family membership**: the user must be a member of the family
/// 2. **Role-based permissions**: the closed role set (Owner, Admin,
///    Member) drives pure decision functions
/// 3. **Creator override**: a task's creator may delete it regardless of
///    role
///
/// Check ordering matters: resource existence is checked before permission
/// when the lookup is cheap, and an existing resource the requester cannot
/// access is reported as forbidden, never as not-found, so the API does
/// not disclose more than membership already implies.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::membership::{FamilyRole, Membership};

/// Whether a role may create tasks in the family
pub fn can_manage_tasks(role: FamilyRole) -> bool {
    role.can_manage_tasks()
}

/// Whether a user may delete a task
///
/// The creator may always delete their own task; otherwise an elevated
/// role is required.
pub fn can_delete_task(role: FamilyRole, is_creator: bool) -> bool {
    is_creator || role.can_manage_tasks()
}

/// Whether a role may change other members' roles
pub fn can_change_member_role(role: FamilyRole) -> bool {
    role.can_change_member_roles()
}

/// Requires the user to be a member of the family, returning their role
///
/// # Errors
///
/// Returns a forbidden error if no membership exists. Callers that need a
/// not-found error for an absent family must check family existence first.
pub async fn require_membership(
    pool: &PgPool,
    family_id: Uuid,
    user_id: Uuid,
) -> DomainResult<FamilyRole> {
    Membership::get_role(pool, family_id, user_id)
        .await?
        .ok_or_else(|| DomainError::forbidden("you are not a member of this family"))
}

/// Requires the user to hold a role allowed to create tasks
pub async fn require_task_management(
    pool: &PgPool,
    family_id: Uuid,
    user_id: Uuid,
) -> DomainResult<FamilyRole> {
    let role = require_membership(pool, family_id, user_id).await?;

    if !can_manage_tasks(role) {
        return Err(DomainError::forbidden(
            "only the family owner or an admin can create tasks",
        ));
    }

    Ok(role)
}
