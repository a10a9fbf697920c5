/// Comment and reaction models
///
/// Comments belong to a task; reactions target either a task or a comment
/// (exactly one, enforced by a CHECK constraint). Reactions use toggle
/// semantics: reacting twice with the same emoji removes the reaction.
///
/// Both feed the extensible notification kinds: commenting notifies the
/// task's creator and assignees, reacting notifies the target's author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::task::Task;
use crate::models::user::User;

/// Comment on a task
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Unique comment ID
    pub id: Uuid,

    /// Task the comment belongs to
    pub task_id: Uuid,

    /// Comment author
    pub user_id: Uuid,

    /// Comment text
    pub body: String,

    /// When the comment was created
    pub created_at: DateTime<Utc>,
}

/// Reaction on a task or a comment
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Unique reaction ID
    pub id: Uuid,

    /// Target task (mutually exclusive with `comment_id`)
    pub task_id: Option<Uuid>,

    /// Target comment (mutually exclusive with `task_id`)
    pub comment_id: Option<Uuid>,

    /// Reacting user
    pub user_id: Uuid,

    /// Emoji shortcode or literal
    pub emoji: String,

    /// When the reaction was created
    pub created_at: DateTime<Utc>,
}

/// What a reaction is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Task(Uuid),
    Comment(Uuid),
}

/// A comment with its author and reactions expanded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithReactions {
    #[serde(flatten)]
    pub comment: Comment,

    /// Comment author
    pub user: User,

    /// Reactions on this comment
    pub reactions: Vec<Reaction>,
}

// Comment columns are aliased so the flattened user columns keep their
// natural names for sqlx's name-based decoding.
#[derive(sqlx::FromRow)]
struct CommentRow {
    comment_id: Uuid,
    task_id: Uuid,
    author_id: Uuid,
    body: String,
    commented_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: User,
}

impl Comment {
    /// Creates a comment and the notifications it triggers, atomically
    ///
    /// Notifies the task's creator and every assignee (except the author)
    /// with a `comment` notification, inside the same transaction.
    pub async fn create(
        pool: &PgPool,
        task: &Task,
        author_id: Uuid,
        body: &str,
    ) -> DomainResult<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(DomainError::validation("comment body is required"));
        }

        let mut tx = pool.begin().await?;

        let comment = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (task_id, user_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, task_id, user_id, body, created_at
            "#,
        )
        .bind(task.id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&mut *tx)
        .await?;

        let mut recipients: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM assignments WHERE task_id = $1",
        )
        .bind(task.id)
        .fetch_all(&mut *tx)
        .await?;
        recipients.push(task.created_by);
        recipients.sort_unstable();
        recipients.dedup();

        for recipient in recipients {
            if recipient == author_id {
                continue;
            }
            Notification::insert(&mut tx, recipient, NotificationKind::Comment, Some(task.id))
                .await?;
        }

        tx.commit().await?;

        Ok(comment)
    }

    /// Lists a task's comments with authors and reactions expanded
    pub async fn list_for_task(
        pool: &PgPool,
        task_id: Uuid,
    ) -> Result<Vec<CommentWithReactions>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id AS comment_id, c.task_id, c.user_id AS author_id,
                   c.body, c.created_at AS commented_at,
                   u.id, u.email, u.password_hash, u.name, u.avatar_url,
                   u.created_at, u.updated_at, u.last_login_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await?;

        let comment_ids: Vec<Uuid> = rows.iter().map(|r| r.comment_id).collect();

        let reactions = sqlx::query_as::<_, Reaction>(
            r#"
            SELECT id, task_id, comment_id, user_id, emoji, created_at
            FROM reactions
            WHERE comment_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&comment_ids)
        .fetch_all(pool)
        .await?;

        let mut result: Vec<CommentWithReactions> = rows
            .into_iter()
            .map(|row| CommentWithReactions {
                comment: Comment {
                    id: row.comment_id,
                    task_id: row.task_id,
                    user_id: row.author_id,
                    body: row.body,
                    created_at: row.commented_at,
                },
                user: row.user,
                reactions: Vec::new(),
            })
            .collect();

        for reaction in reactions {
            if let Some(comment_id) = reaction.comment_id {
                if let Some(entry) = result.iter_mut().find(|c| c.comment.id == comment_id) {
                    entry.reactions.push(reaction);
                }
            }
        }

        Ok(result)
    }

    /// Finds a comment by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, task_id, user_id, body, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

impl Reaction {
    /// Toggles a reaction on a task or comment
    ///
    /// Returns the created reaction when adding, or `None` when an
    /// identical reaction existed and was removed instead. Adding notifies
    /// the target's author in the same transaction.
    pub async fn toggle(
        pool: &PgPool,
        user_id: Uuid,
        target: ReactionTarget,
        emoji: &str,
        target_author: Uuid,
        task_id_for_notification: Uuid,
    ) -> DomainResult<Option<Reaction>> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(DomainError::validation("emoji is required"));
        }

        let (task_id, comment_id) = match target {
            ReactionTarget::Task(id) => (Some(id), None),
            ReactionTarget::Comment(id) => (None, Some(id)),
        };

        let mut tx = pool.begin().await?;

        let removed: Option<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM reactions
            WHERE task_id IS NOT DISTINCT FROM $1
              AND comment_id IS NOT DISTINCT FROM $2
              AND user_id = $3 AND emoji = $4
            RETURNING id
            "#,
        )
        .bind(task_id)
        .bind(comment_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_optional(&mut *tx)
        .await?;

        if removed.is_some() {
            tx.commit().await?;
            return Ok(None);
        }

        let reaction = sqlx::query_as::<_, Reaction>(
            r#"
            INSERT INTO reactions (task_id, comment_id, user_id, emoji)
            VALUES ($1, $2, $3, $4)
            RETURNING id, task_id, comment_id, user_id, emoji, created_at
            "#,
        )
        .bind(task_id)
        .bind(comment_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&mut *tx)
        .await?;

        if target_author != user_id {
            Notification::insert(
                &mut tx,
                target_author,
                NotificationKind::Reaction,
                Some(task_id_for_notification),
            )
            .await?;
        }

        tx.commit().await?;

        Ok(Some(reaction))
    }

    /// Lists reactions attached directly to a task
    pub async fn list_for_task(pool: &PgPool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reaction>(
            r#"
            SELECT id, task_id, comment_id, user_id, emoji, created_at
            FROM reactions
            WHERE task_id = $1 AND comment_id IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}
