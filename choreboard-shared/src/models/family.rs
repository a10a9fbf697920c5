/// Family model and database operations
///
/// A family is a named group of users collaborating on shared tasks. Every
/// family has exactly one owner, who always holds an active membership with
/// the `owner` role, and an optional invite code that lets other users join
/// without prior membership.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE families (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     owner_id UUID NOT NULL REFERENCES users(id),
///     invite_code VARCHAR(16) UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::error::{DomainError, DomainResult};
use crate::invite;
use crate::models::membership::{FamilyRole, Membership};
use crate::models::user::User;

/// How many fresh codes to try before giving up on a code collision.
/// With a 36^8 code space a second collision in a row is effectively
/// a sign of a broken random source, not bad luck.
const INVITE_CODE_ATTEMPTS: u32 = 4;

/// Family model representing a group of users
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    /// Unique family ID (UUID v4)
    pub id: Uuid,

    /// Family display name
    pub name: String,

    /// User who owns the family
    pub owner_id: Uuid,

    /// Shareable join code (uppercase alphanumeric), absent until generated
    pub invite_code: Option<String>,

    /// When the family was created
    pub created_at: DateTime<Utc>,

    /// When the family was last updated
    pub updated_at: DateTime<Utc>,
}

/// A family member with the user record expanded, for rendering
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    /// Role within the family
    pub role: FamilyRole,

    /// When the user joined
    pub joined_at: DateTime<Utc>,

    /// The member's user record
    pub user: User,
}

/// A family with its member list expanded
#[derive(Debug, Clone, Serialize)]
pub struct FamilyWithMembers {
    #[serde(flatten)]
    pub family: Family,

    /// All members with nested user info
    pub members: Vec<FamilyMember>,
}

/// Row shape for the member-list query
#[derive(sqlx::FromRow)]
struct MemberRow {
    family_id: Uuid,
    role: FamilyRole,
    joined_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: User,
}

const MEMBER_QUERY_COLUMNS: &str = "m.family_id, m.role, m.created_at AS joined_at, \
     u.id, u.email, u.password_hash, u.name, u.avatar_url, u.created_at, u.updated_at, u.last_login_at";

impl Family {
    /// Creates a family and its owner membership atomically
    ///
    /// The creating user becomes the owner. Fails with a validation error
    /// if the name is empty after trimming.
    pub async fn create_with_owner(
        pool: &PgPool,
        owner_id: Uuid,
        name: &str,
    ) -> DomainResult<FamilyWithMembers> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("family name is required"));
        }

        let mut tx = pool.begin().await?;

        let family = sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (name, owner_id)
            VALUES ($1, $2)
            RETURNING id, name, owner_id, invite_code, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO memberships (family_id, user_id, role) VALUES ($1, $2, 'owner')")
            .bind(family.id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Self::with_members(pool, family).await
    }

    /// Finds a family by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Family>(
            "SELECT id, name, owner_id, invite_code, created_at, updated_at FROM families WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Joins a family by invite code
    ///
    /// The code is normalized (trimmed, uppercased) before lookup. Joining
    /// is idempotent: if the user is already a member the existing family is
    /// returned and the second element of the result is `false`.
    pub async fn join_by_code(
        pool: &PgPool,
        user_id: Uuid,
        code: &str,
    ) -> DomainResult<(FamilyWithMembers, bool)> {
        let code = invite::normalize_code(code);
        if code.is_empty() {
            return Err(DomainError::validation("invite code is required"));
        }

        let family = sqlx::query_as::<_, Family>(
            "SELECT id, name, owner_id, invite_code, created_at, updated_at FROM families WHERE invite_code = $1",
        )
        .bind(&code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DomainError::not_found("no family with that invite code"))?;

        // ON CONFLICT DO NOTHING makes concurrent duplicate joins converge
        // on a single membership row without surfacing an error.
        let result = sqlx::query(
            r#"
            INSERT INTO memberships (family_id, user_id, role)
            VALUES ($1, $2, 'member')
            ON CONFLICT (family_id, user_id) DO NOTHING
            "#,
        )
        .bind(family.id)
        .bind(user_id)
        .execute(pool)
        .await?;

        let newly_joined = result.rows_affected() > 0;

        let family = Self::with_members(pool, family).await?;
        Ok((family, newly_joined))
    }

    /// Generates a fresh invite code for a family
    ///
    /// Only the family owner may invoke this. Retries on the unlikely
    /// unique-constraint collision with another family's code.
    pub async fn regenerate_invite_code(
        pool: &PgPool,
        requester_id: Uuid,
        family_id: Uuid,
        code_length: usize,
    ) -> DomainResult<String> {
        let family = Self::find_by_id(pool, family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family not found"))?;

        let role = Membership::get_role(pool, family.id, requester_id)
            .await?
            .ok_or_else(|| DomainError::forbidden("you are not a member of this family"))?;

        if !role.can_manage_invites() {
            return Err(DomainError::forbidden(
                "only the family owner can create invite codes",
            ));
        }

        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = invite::generate_code(code_length);

            let result = sqlx::query(
                "UPDATE families SET invite_code = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(family.id)
            .bind(&code)
            .execute(pool)
            .await;

            match result {
                Ok(_) => return Ok(code),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::conflict(
            "could not generate a unique invite code",
        ))
    }

    /// Lists all families a user belongs to, with members expanded
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<FamilyWithMembers>, sqlx::Error> {
        let families = sqlx::query_as::<_, Family>(
            r#"
            SELECT f.id, f.name, f.owner_id, f.invite_code, f.created_at, f.updated_at
            FROM families f
            JOIN memberships m ON m.family_id = f.id
            WHERE m.user_id = $1
            ORDER BY f.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Self::expand_members(pool, families).await
    }

    /// Fetches a family for a requesting member
    ///
    /// Resource existence is checked before permission: an absent family is
    /// a not-found error, while an existing family the requester does not
    /// belong to is forbidden.
    pub async fn get_for_member(
        pool: &PgPool,
        user_id: Uuid,
        family_id: Uuid,
    ) -> DomainResult<FamilyWithMembers> {
        let family = Self::find_by_id(pool, family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family not found"))?;

        Membership::get_role(pool, family.id, user_id)
            .await?
            .ok_or_else(|| DomainError::forbidden("you are not a member of this family"))?;

        Ok(Self::with_members(pool, family).await?)
    }

    /// Loads the member list for a single family
    async fn with_members(pool: &PgPool, family: Family) -> DomainResult<FamilyWithMembers> {
        let mut expanded = Self::expand_members(pool, vec![family]).await?;
        // expand_members returns exactly one entry per input family
        Ok(expanded.remove(0))
    }

    /// Loads member lists for a batch of families in one query
    async fn expand_members(
        pool: &PgPool,
        families: Vec<Family>,
    ) -> Result<Vec<FamilyWithMembers>, sqlx::Error> {
        let family_ids: Vec<Uuid> = families.iter().map(|f| f.id).collect();

        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            r#"
            SELECT {MEMBER_QUERY_COLUMNS}
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.family_id = ANY($1)
            ORDER BY m.created_at ASC
            "#
        ))
        .bind(&family_ids)
        .fetch_all(pool)
        .await?;

        let mut result: Vec<FamilyWithMembers> = families
            .into_iter()
            .map(|family| FamilyWithMembers {
                family,
                members: Vec::new(),
            })
            .collect();

        for row in rows {
            if let Some(entry) = result.iter_mut().find(|f| f.family.id == row.family_id) {
                entry.members.push(FamilyMember {
                    role: row.role,
                    joined_at: row.joined_at,
                    user: row.user,
                });
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_serializes_camel_case() {
        let family = Family {
            id: Uuid::new_v4(),
            name: "Smith".to_string(),
            owner_id: Uuid::new_v4(),
            invite_code: Some("AB12CD34".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&family).unwrap();
        assert!(json.get("ownerId").is_some());
        assert!(json.get("inviteCode").is_some());
        assert!(json.get("owner_id").is_none());
    }

    #[test]
    fn test_family_with_members_flattens_family_fields() {
        let family = Family {
            id: Uuid::new_v4(),
            name: "Smith".to_string(),
            owner_id: Uuid::new_v4(),
            invite_code: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let with_members = FamilyWithMembers {
            family,
            members: Vec::new(),
        };

        let json = serde_json::to_value(&with_members).unwrap();
        assert!(json.get("name").is_some());
        assert!(json.get("members").is_some());
        assert!(json.get("family").is_none());
    }
}
