/// Assignment model: task-to-user delegation records
///
/// A task can be delegated to any number of family members. Assignments
/// are replaced wholesale when a task update carries an assignee list
/// (delete-all-then-recreate), so the helpers here take a transaction
/// connection and are composed by the task operations.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE assignments (
///     task_id UUID NOT NULL REFERENCES tasks(id),
///     user_id UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (task_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Assignment model recording who a task is delegated to
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Task being delegated
    pub task_id: Uuid,

    /// User the task is delegated to
    pub user_id: Uuid,

    /// When the assignment was created
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Inserts assignments for a task inside an open transaction
    ///
    /// Duplicate user IDs in the input collapse to one row.
    pub async fn insert_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        assignee_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        for user_id in assignee_ids {
            sqlx::query(
                r#"
                INSERT INTO assignments (task_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT (task_id, user_id) DO NOTHING
                "#,
            )
            .bind(task_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Replaces the full assignment set of a task inside an open transaction
    pub async fn replace_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
        assignee_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM assignments WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        Self::insert_for_task(conn, task_id, assignee_ids).await
    }

    /// Deletes all assignments of a task inside an open transaction
    pub async fn delete_for_task(
        conn: &mut PgConnection,
        task_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM assignments WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
