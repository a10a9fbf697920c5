/// Notification model and database operations
///
/// Notifications are generated by the system, never created directly by a
/// client. Assignment notifications are written synchronously inside the
/// task-creation transaction; overdue notifications are computed lazily
/// when a user reads their notification list.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE notification_kind AS ENUM ('assigned', 'overdue', 'comment', 'reaction');
///
/// CREATE TABLE notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id),
///     kind notification_kind NOT NULL,
///     task_id UUID REFERENCES tasks(id),
///     is_read BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// A partial unique index on `(user_id, task_id) WHERE kind = 'overdue'`
/// enforces at most one overdue notification per user and task, so the
/// lazy generation on read is idempotent across repeated reads and
/// concurrent readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// How many notifications a single list read returns at most.
const LIST_LIMIT: i64 = 50;

/// Kinds of system-generated notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A task was assigned to the user
    Assigned,

    /// A task assigned to the user passed its due date while incomplete
    Overdue,

    /// Someone commented on a task the user is involved in
    Comment,

    /// Someone reacted to the user's task or comment
    Reaction,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assigned => "assigned",
            NotificationKind::Overdue => "overdue",
            NotificationKind::Comment => "comment",
            NotificationKind::Reaction => "reaction",
        }
    }
}

/// Notification model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique notification ID
    pub id: Uuid,

    /// User the notification is addressed to
    pub user_id: Uuid,

    /// What happened
    pub kind: NotificationKind,

    /// Task the notification refers to, if any
    pub task_id: Option<Uuid>,

    /// Whether the user has read it
    pub is_read: bool,

    /// When the notification was created
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Inserts a notification inside an open transaction
    ///
    /// Used by task creation (assigned), comments, and reactions so the
    /// notification commits or rolls back together with its cause.
    pub async fn insert(
        conn: &mut PgConnection,
        user_id: Uuid,
        kind: NotificationKind,
        task_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO notifications (user_id, kind, task_id) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(kind)
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Lists a user's notifications, generating missing overdue entries
    ///
    /// As a side effect of the read, scans tasks assigned to the user whose
    /// due date has passed while the task is not done, and inserts an
    /// overdue notification for each one that does not have one yet. The
    /// partial unique index makes the insert a no-op for duplicates, so two
    /// consecutive reads produce the same single overdue row.
    ///
    /// Returns the combined list, newest first, capped at 50 entries.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, task_id)
            SELECT a.user_id, 'overdue', t.id
            FROM tasks t
            JOIN assignments a ON a.task_id = t.id
            WHERE a.user_id = $1
              AND t.due_date IS NOT NULL
              AND t.due_date < $2
              AND t.status <> 'done'
            ON CONFLICT (user_id, task_id) WHERE kind = 'overdue' DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, kind, task_id, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(LIST_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(notifications)
    }

    /// Marks a notification as read
    ///
    /// Scoped to rows owned by the caller and idempotent: an unknown ID or
    /// an already-read notification succeeds silently.
    pub async fn mark_read(
        pool: &PgPool,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_as_str() {
        assert_eq!(NotificationKind::Assigned.as_str(), "assigned");
        assert_eq!(NotificationKind::Overdue.as_str(), "overdue");
        assert_eq!(NotificationKind::Comment.as_str(), "comment");
        assert_eq!(NotificationKind::Reaction.as_str(), "reaction");
    }

    #[test]
    fn test_notification_serializes_camel_case() {
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::Overdue,
            task_id: Some(Uuid::new_v4()),
            is_read: false,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "overdue");
        assert!(json.get("isRead").is_some());
        assert!(json.get("taskId").is_some());
    }
}
