/// Task model and database operations
///
/// Tasks are the core entity of Choreboard. Each task belongs to exactly
/// one family and may be delegated to any number of members.
///
/// # Status
///
/// Status is a free-form field, not a strict state machine: any authorized
/// caller may set it directly to `todo`, `in_progress`, or `done` without
/// transition validation.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('todo', 'in_progress', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'normal', 'high');
///
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     family_id UUID NOT NULL REFERENCES families(id),
///     created_by UUID NOT NULL REFERENCES users(id),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority task_priority NOT NULL DEFAULT 'normal',
///     status task_status NOT NULL DEFAULT 'todo',
///     due_date TIMESTAMPTZ,
///     image_url VARCHAR(512),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Atomicity
///
/// Create-with-assignees, update-with-reassignment, and the cascade delete
/// each run inside one transaction. Transient serialization failures are
/// retried once at the transaction boundary; everything else rolls back
/// fully, so no partial mutation is ever observable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::is_transient;
use crate::error::{DomainError, DomainResult};
use crate::models::assignment::Assignment;
use crate::models::comment::{Comment, CommentWithReactions, Reaction};
use crate::models::family::Family;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::user::User;

/// Task completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Completed
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Parses a status from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
        }
    }
}

/// Task model representing a household task
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Family the task belongs to
    pub family_id: Uuid,

    /// User who created the task
    #[serde(rename = "createdById")]
    pub created_by: Uuid,

    /// Task title
    pub title: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Priority, defaults to normal
    pub priority: TaskPriority,

    /// Status, defaults to todo
    pub status: TaskStatus,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Optional attached image URL
    pub image_url: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

/// A task with its assignees expanded
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithAssignees {
    #[serde(flatten)]
    pub task: Task,

    /// Users the task is delegated to
    pub assignees: Vec<User>,
}

/// A task with everything expanded, for the detail endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,

    /// The family the task belongs to
    pub family: Family,

    /// Users the task is delegated to
    pub assignees: Vec<User>,

    /// Comments with their authors and reactions
    pub comments: Vec<CommentWithReactions>,

    /// Reactions attached directly to the task
    pub reactions: Vec<Reaction>,
}

/// Input for creating a new task
#[derive(Debug, Clone, Default)]
pub struct CreateTaskData {
    /// Task title (required)
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Priority (defaults to normal)
    pub priority: Option<TaskPriority>,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Users to delegate the task to
    pub assignee_ids: Vec<Uuid>,

    /// Optional image URL
    pub image_url: Option<String>,
}

/// Input for updating a task (merge-patch semantics)
///
/// Outer `None` means "keep the current value". For nullable columns the
/// inner option distinguishes "set to a value" from "clear". A present
/// `assignee_ids` replaces the entire assignment set.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub image_url: Option<Option<String>>,
    pub assignee_ids: Option<Vec<Uuid>>,
}

impl UpdateTaskData {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.image_url.is_none()
            && self.assignee_ids.is_none()
    }
}

/// Equality filters for task listings
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Uuid>,
}

const TASK_COLUMNS: &str = "id, family_id, created_by, title, description, priority, status, \
     due_date, image_url, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AssigneeRow {
    task_id: Uuid,
    #[sqlx(flatten)]
    user: User,
}

impl Task {
    /// Creates a task with its assignments and notifications, atomically
    ///
    /// One `assigned` notification is enqueued per assignee in the same
    /// transaction, so the notifications exist by the time the creation
    /// response reaches the client.
    pub async fn create(
        pool: &PgPool,
        family_id: Uuid,
        created_by: Uuid,
        data: CreateTaskData,
    ) -> DomainResult<TaskWithAssignees> {
        if data.title.trim().is_empty() {
            return Err(DomainError::validation("task title is required"));
        }

        let task = match Self::try_create(pool, family_id, created_by, &data).await {
            Ok(task) => task,
            Err(e) if is_transient(&e) => Self::try_create(pool, family_id, created_by, &data).await?,
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_assignees(pool, task).await?)
    }

    async fn try_create(
        pool: &PgPool,
        family_id: Uuid,
        created_by: Uuid,
        data: &CreateTaskData,
    ) -> Result<Task, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (family_id, created_by, title, description, priority, due_date, image_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(family_id)
        .bind(created_by)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(data.priority.unwrap_or(TaskPriority::Normal))
        .bind(data.due_date)
        .bind(&data.image_url)
        .fetch_one(&mut *tx)
        .await?;

        Assignment::insert_for_task(&mut tx, task.id, &data.assignee_ids).await?;

        let mut notified: Vec<Uuid> = Vec::new();
        for assignee in &data.assignee_ids {
            if notified.contains(assignee) {
                continue;
            }
            notified.push(*assignee);
            Notification::insert(&mut tx, *assignee, NotificationKind::Assigned, Some(task.id))
                .await?;
        }

        tx.commit().await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Applies a merge-patch update to a task
    ///
    /// Unset fields keep their current value. A present assignee list
    /// replaces the whole assignment set (delete-all-then-recreate) in the
    /// same transaction as the field update.
    pub async fn update(
        pool: &PgPool,
        task_id: Uuid,
        data: UpdateTaskData,
    ) -> DomainResult<TaskWithAssignees> {
        if let Some(title) = &data.title {
            if title.trim().is_empty() {
                return Err(DomainError::validation("task title cannot be empty"));
            }
        }

        let task = match Self::try_update(pool, task_id, &data).await {
            Ok(task) => task,
            Err(DomainError::Database(e)) if is_transient(&e) => {
                Self::try_update(pool, task_id, &data).await?
            }
            Err(e) => return Err(e),
        };

        Ok(Self::with_assignees(pool, task).await?)
    }

    async fn try_update(
        pool: &PgPool,
        task_id: Uuid,
        data: &UpdateTaskData,
    ) -> DomainResult<Task> {
        let mut tx = pool.begin().await?;

        let task = if data.is_empty() || Self::only_assignees(data) {
            Self::fetch_in_tx(&mut tx, task_id).await?
        } else {
            // Build the UPDATE dynamically so untouched columns keep their
            // values, following the same bind-counting pattern as the rest
            // of the dynamic queries in this crate.
            let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
            let mut bind_count = 1;

            if data.title.is_some() {
                bind_count += 1;
                query.push_str(&format!(", title = ${bind_count}"));
            }
            if data.description.is_some() {
                bind_count += 1;
                query.push_str(&format!(", description = ${bind_count}"));
            }
            if data.priority.is_some() {
                bind_count += 1;
                query.push_str(&format!(", priority = ${bind_count}"));
            }
            if data.status.is_some() {
                bind_count += 1;
                query.push_str(&format!(", status = ${bind_count}"));
            }
            if data.due_date.is_some() {
                bind_count += 1;
                query.push_str(&format!(", due_date = ${bind_count}"));
            }
            if data.image_url.is_some() {
                bind_count += 1;
                query.push_str(&format!(", image_url = ${bind_count}"));
            }

            query.push_str(&format!(" WHERE id = $1 RETURNING {TASK_COLUMNS}"));

            let mut q = sqlx::query_as::<_, Task>(&query).bind(task_id);

            if let Some(title) = &data.title {
                q = q.bind(title.trim().to_string());
            }
            if let Some(description) = &data.description {
                q = q.bind(description.clone());
            }
            if let Some(priority) = data.priority {
                q = q.bind(priority);
            }
            if let Some(status) = data.status {
                q = q.bind(status);
            }
            if let Some(due_date) = &data.due_date {
                q = q.bind(*due_date);
            }
            if let Some(image_url) = &data.image_url {
                q = q.bind(image_url.clone());
            }

            q.fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DomainError::not_found("task not found"))?
        };

        if let Some(assignee_ids) = &data.assignee_ids {
            Assignment::replace_for_task(&mut tx, task.id, assignee_ids).await?;
        }

        tx.commit().await?;

        Ok(task)
    }

    fn only_assignees(data: &UpdateTaskData) -> bool {
        data.assignee_ids.is_some()
            && data.title.is_none()
            && data.description.is_none()
            && data.priority.is_none()
            && data.status.is_none()
            && data.due_date.is_none()
            && data.image_url.is_none()
    }

    async fn fetch_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        task_id: Uuid,
    ) -> DomainResult<Task> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(task_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| DomainError::not_found("task not found"))
    }

    /// Sets the task status directly
    ///
    /// No predecessor-state validation: status is a free-form field.
    pub async fn set_status(
        pool: &PgPool,
        task_id: Uuid,
        status: TaskStatus,
    ) -> DomainResult<TaskWithAssignees> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {TASK_COLUMNS}"
        ))
        .bind(task_id)
        .bind(status)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DomainError::not_found("task not found"))?;

        Ok(Self::with_assignees(pool, task).await?)
    }

    /// Deletes a task and everything referencing it, atomically
    ///
    /// Deletion order: reactions on the task, reactions on its comments,
    /// comments, notifications referencing the task, assignments, then the
    /// task row itself. Any failure rolls back the whole transaction, so a
    /// partial deletion is never observable.
    pub async fn delete_cascade(pool: &PgPool, task_id: Uuid) -> DomainResult<()> {
        match Self::try_delete_cascade(pool, task_id).await {
            Ok(()) => Ok(()),
            Err(e) if is_transient(&e) => Ok(Self::try_delete_cascade(pool, task_id).await?),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_delete_cascade(pool: &PgPool, task_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM reactions WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM reactions WHERE comment_id IN (SELECT id FROM comments WHERE task_id = $1)",
        )
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM comments WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM notifications WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        Assignment::delete_for_task(&mut tx, task_id).await?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Lists a family's tasks with optional equality filters
    ///
    /// Ordered by due date ascending with tasks lacking a due date last.
    pub async fn list_for_family(
        pool: &PgPool,
        family_id: Uuid,
        filter: TaskFilter,
    ) -> Result<Vec<TaskWithAssignees>, sqlx::Error> {
        let mut query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE family_id = $1");
        let mut bind_count = 1;

        if filter.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND status = ${bind_count}"));
        }
        if filter.assignee_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM assignments a WHERE a.task_id = tasks.id AND a.user_id = ${bind_count})"
            ));
        }

        query.push_str(" ORDER BY due_date ASC NULLS LAST, created_at ASC");

        let mut q = sqlx::query_as::<_, Task>(&query).bind(family_id);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(assignee_id) = filter.assignee_id {
            q = q.bind(assignee_id);
        }

        let tasks = q.fetch_all(pool).await?;

        Self::expand_assignees(pool, tasks).await
    }

    /// Lists tasks assigned to a user across all their families
    pub async fn list_assigned_to(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<TaskStatus>,
        family_id: Option<Uuid>,
    ) -> Result<Vec<TaskWithAssignees>, sqlx::Error> {
        let mut query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE EXISTS (SELECT 1 FROM assignments a WHERE a.task_id = tasks.id AND a.user_id = $1)"
        );
        let mut bind_count = 1;

        if status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND status = ${bind_count}"));
        }
        if family_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND family_id = ${bind_count}"));
        }

        query.push_str(" ORDER BY due_date ASC NULLS LAST, created_at ASC");

        let mut q = sqlx::query_as::<_, Task>(&query).bind(user_id);
        if let Some(status) = status {
            q = q.bind(status);
        }
        if let Some(family_id) = family_id {
            q = q.bind(family_id);
        }

        let tasks = q.fetch_all(pool).await?;

        Self::expand_assignees(pool, tasks).await
    }

    /// Fetches a task with family, assignees, and comments expanded
    pub async fn detail(pool: &PgPool, task_id: Uuid) -> DomainResult<TaskDetail> {
        let task = Self::find_by_id(pool, task_id)
            .await?
            .ok_or_else(|| DomainError::not_found("task not found"))?;

        let family = Family::find_by_id(pool, task.family_id)
            .await?
            .ok_or_else(|| DomainError::not_found("family not found"))?;

        let assignees = Self::with_assignees(pool, task).await?;
        let comments = Comment::list_for_task(pool, task_id).await?;
        let reactions = Reaction::list_for_task(pool, task_id).await?;

        Ok(TaskDetail {
            task: assignees.task,
            family,
            assignees: assignees.assignees,
            comments,
            reactions,
        })
    }

    /// Loads the assignee list for a single task
    pub async fn with_assignees(pool: &PgPool, task: Task) -> Result<TaskWithAssignees, sqlx::Error> {
        let mut expanded = Self::expand_assignees(pool, vec![task]).await?;
        Ok(expanded.remove(0))
    }

    /// Loads assignee lists for a batch of tasks in one query
    async fn expand_assignees(
        pool: &PgPool,
        tasks: Vec<Task>,
    ) -> Result<Vec<TaskWithAssignees>, sqlx::Error> {
        let task_ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();

        let rows = sqlx::query_as::<_, AssigneeRow>(
            r#"
            SELECT a.task_id,
                   u.id, u.email, u.password_hash, u.name, u.avatar_url,
                   u.created_at, u.updated_at, u.last_login_at
            FROM assignments a
            JOIN users u ON u.id = a.user_id
            WHERE a.task_id = ANY($1)
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(&task_ids)
        .fetch_all(pool)
        .await?;

        let mut result: Vec<TaskWithAssignees> = tasks
            .into_iter()
            .map(|task| TaskWithAssignees {
                task,
                assignees: Vec::new(),
            })
            .collect();

        for row in rows {
            if let Some(entry) = result.iter_mut().find(|t| t.task.id == row.task_id) {
                entry.assignees.push(row.user);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_as_str() {
        assert_eq!(TaskStatus::Todo.as_str(), "todo");
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
        assert_eq!(TaskStatus::Done.as_str(), "done");
    }

    #[test]
    fn test_task_status_parse() {
        assert_eq!(TaskStatus::parse("todo"), Some(TaskStatus::Todo));
        assert_eq!(TaskStatus::parse("in_progress"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::parse("done"), Some(TaskStatus::Done));
        assert_eq!(TaskStatus::parse("doing"), None);
    }

    #[test]
    fn test_task_priority_as_str() {
        assert_eq!(TaskPriority::Low.as_str(), "low");
        assert_eq!(TaskPriority::Normal.as_str(), "normal");
        assert_eq!(TaskPriority::High.as_str(), "high");
    }

    #[test]
    fn test_update_data_emptiness() {
        assert!(UpdateTaskData::default().is_empty());

        let with_title = UpdateTaskData {
            title: Some("new title".to_string()),
            ..Default::default()
        };
        assert!(!with_title.is_empty());

        let only_assignees = UpdateTaskData {
            assignee_ids: Some(vec![Uuid::new_v4()]),
            ..Default::default()
        };
        assert!(Task::only_assignees(&only_assignees));
        assert!(!Task::only_assignees(&with_title));
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task {
            id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            title: "Buy milk".to_string(),
            description: None,
            priority: TaskPriority::Normal,
            status: TaskStatus::Todo,
            due_date: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("familyId").is_some());
        assert!(json.get("createdById").is_some());
        assert!(json.get("dueDate").is_some());
        assert_eq!(json["status"], "todo");
        assert_eq!(json["priority"], "normal");
    }
}
