/// Membership model and database operations
///
/// This module provides the Membership model for user-family relationships
/// with role-based access control.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE family_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE memberships (
///     family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role family_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (family_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: Manages members and roles, full task control. Exactly one
///   per family, enforced by a partial unique index.
/// - **admin**: Creates and deletes tasks.
/// - **member**: Views and edits tasks, completes assignments.
///
/// The owner role is immutable through `update_member_role`: there is no
/// ownership transfer mechanism, so demoting the owner or promoting a
/// second member to owner is rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Roles within a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "family_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FamilyRole {
    /// Manages members, roles, and invite codes
    Owner,

    /// Creates and deletes tasks
    Admin,

    /// Views and edits tasks
    Member,
}

impl FamilyRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyRole::Owner => "owner",
            FamilyRole::Admin => "admin",
            FamilyRole::Member => "member",
        }
    }

    /// Parses a role from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(FamilyRole::Owner),
            "admin" => Some(FamilyRole::Admin),
            "member" => Some(FamilyRole::Member),
            _ => None,
        }
    }

    /// Can create tasks in the family
    pub fn can_manage_tasks(&self) -> bool {
        matches!(self, FamilyRole::Owner | FamilyRole::Admin)
    }

    /// Can change other members' roles
    pub fn can_change_member_roles(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }

    /// Can create or regenerate the family invite code
    pub fn can_manage_invites(&self) -> bool {
        matches!(self, FamilyRole::Owner)
    }
}

/// Membership model representing a user-family relationship with a role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Family ID
    pub family_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the family
    pub role: FamilyRole,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// Creates a new membership (adds user to family)
    pub async fn create(
        pool: &PgPool,
        family_id: Uuid,
        user_id: Uuid,
        role: FamilyRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (family_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING family_id, user_id, role, created_at
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    /// Finds a specific membership by family and user
    pub async fn find(
        pool: &PgPool,
        family_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT family_id, user_id, role, created_at
            FROM memberships
            WHERE family_id = $1 AND user_id = $2
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Gets a user's role in a family, if they are a member
    pub async fn get_role(
        pool: &PgPool,
        family_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<FamilyRole>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT role FROM memberships
            WHERE family_id = $1 AND user_id = $2
            "#,
        )
        .bind(family_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists all members of a family
    pub async fn list_by_family(pool: &PgPool, family_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT family_id, user_id, role, created_at
            FROM memberships
            WHERE family_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    /// Changes a member's role within a family
    ///
    /// Only the family owner may call this. The owner membership itself is
    /// immutable: demoting the owner, or promoting anyone else to owner,
    /// is rejected with a conflict since there is no transfer mechanism.
    ///
    /// The requester-role check and the target update run in one
    /// transaction so a concurrent role change cannot interleave.
    pub async fn update_member_role(
        pool: &PgPool,
        requester_id: Uuid,
        family_id: Uuid,
        member_id: Uuid,
        new_role: FamilyRole,
    ) -> DomainResult<Self> {
        let mut tx = pool.begin().await?;

        let requester_role: Option<FamilyRole> = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE family_id = $1 AND user_id = $2",
        )
        .bind(family_id)
        .bind(requester_id)
        .fetch_optional(&mut *tx)
        .await?;

        let requester_role = requester_role
            .ok_or_else(|| DomainError::forbidden("you are not a member of this family"))?;

        if !requester_role.can_change_member_roles() {
            return Err(DomainError::forbidden(
                "only the family owner can change member roles",
            ));
        }

        let target = sqlx::query_as::<_, Membership>(
            r#"
            SELECT family_id, user_id, role, created_at
            FROM memberships
            WHERE family_id = $1 AND user_id = $2
            "#,
        )
        .bind(family_id)
        .bind(member_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::not_found("member not found in this family"))?;

        if target.role == FamilyRole::Owner && new_role != FamilyRole::Owner {
            return Err(DomainError::conflict("the family owner cannot be demoted"));
        }
        if target.role != FamilyRole::Owner && new_role == FamilyRole::Owner {
            return Err(DomainError::conflict(
                "a family has exactly one owner; ownership cannot be transferred",
            ));
        }

        let updated = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET role = $3
            WHERE family_id = $1 AND user_id = $2
            RETURNING family_id, user_id, role, created_at
            "#,
        )
        .bind(family_id)
        .bind(member_id)
        .bind(new_role)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_role_as_str() {
        assert_eq!(FamilyRole::Owner.as_str(), "owner");
        assert_eq!(FamilyRole::Admin.as_str(), "admin");
        assert_eq!(FamilyRole::Member.as_str(), "member");
    }

    #[test]
    fn test_family_role_parse() {
        assert_eq!(FamilyRole::parse("owner"), Some(FamilyRole::Owner));
        assert_eq!(FamilyRole::parse("admin"), Some(FamilyRole::Admin));
        assert_eq!(FamilyRole::parse("member"), Some(FamilyRole::Member));
        assert_eq!(FamilyRole::parse("viewer"), None);
        assert_eq!(FamilyRole::parse("OWNER"), None);
    }

    #[test]
    fn test_role_permissions() {
        assert!(FamilyRole::Owner.can_manage_tasks());
        assert!(FamilyRole::Owner.can_change_member_roles());
        assert!(FamilyRole::Owner.can_manage_invites());

        assert!(FamilyRole::Admin.can_manage_tasks());
        assert!(!FamilyRole::Admin.can_change_member_roles());
        assert!(!FamilyRole::Admin.can_manage_invites());

        assert!(!FamilyRole::Member.can_manage_tasks());
        assert!(!FamilyRole::Member.can_change_member_roles());
        assert!(!FamilyRole::Member.can_manage_invites());
    }
}
