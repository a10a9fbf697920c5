/// Task lifecycle endpoints
///
/// Every mutation consults the authorization guard before touching state,
/// runs its persistence inside one transaction, and publishes a realtime
/// event to the family channel only after commit.
///
/// # Endpoints
///
/// - `GET /families/:familyId/tasks?memberId=&status=` - List family tasks
/// - `POST /families/:familyId/tasks` - Create task (owner/admin only)
/// - `GET /tasks/my?status=&familyId=` - Tasks assigned to me
/// - `GET /tasks/:taskId` - Task detail with family, assignees, comments
/// - `PUT /tasks/:taskId` - Merge-patch update (any member)
/// - `PATCH /tasks/:taskId/status` - Set status directly (any member)
/// - `DELETE /tasks/:taskId` - Cascade delete (creator or owner/admin)
/// - `GET|POST /tasks/:taskId/comments` - Comments
/// - `POST /tasks/:taskId/reactions` - Toggle a reaction

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use choreboard_shared::{
    auth::{authorization, middleware::AuthContext},
    error::DomainError,
    models::{
        comment::{Comment, Reaction, ReactionTarget},
        membership::FamilyRole,
        task::{CreateTaskData, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTaskData},
    },
    realtime::{FamilyEvent, TaskDeleted},
};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};

/// Create task request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Task title (required)
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Priority, defaults to normal
    pub priority: Option<TaskPriority>,

    /// Optional due date
    pub due_date: Option<DateTime<Utc>>,

    /// Users to delegate the task to
    #[serde(default)]
    pub assignee_ids: Vec<Uuid>,

    /// Optional image URL
    pub image_url: Option<String>,
}

/// Update task request (merge-patch)
///
/// Absent fields keep their current value; explicit `null` clears nullable
/// fields. A present `assigneeIds` replaces the whole assignment set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub priority: Option<TaskPriority>,

    pub status: Option<TaskStatus>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,

    pub assignee_ids: Option<Vec<Uuid>>,
}

// Distinguishes an absent field (outer None) from an explicit null
// (Some(None)) during deserialization.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// New status: "todo", "in_progress", or "done"
    pub status: String,
}

/// Query filters for the family task listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyTaskQuery {
    /// Filter by assignee
    pub member_id: Option<Uuid>,

    /// Filter by status
    pub status: Option<String>,
}

/// Query filters for the cross-family "my tasks" listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyTaskQuery {
    pub status: Option<String>,
    pub family_id: Option<Uuid>,
}

/// Comment creation request
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    /// Comment text
    pub body: String,
}

/// Reaction toggle request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReactionRequest {
    /// Emoji shortcode or literal
    pub emoji: String,

    /// React to a comment instead of the task itself
    pub comment_id: Option<Uuid>,
}

fn parse_status(status: Option<&str>) -> ApiResult<Option<TaskStatus>> {
    match status {
        None | Some("") => Ok(None),
        Some(s) => TaskStatus::parse(s).map(Some).ok_or_else(|| {
            DomainError::validation("status must be one of: todo, in_progress, done").into()
        }),
    }
}

/// Loads a task and verifies the requester belongs to its family
///
/// An absent task is 404; an existing task in a family the requester does
/// not belong to is 403.
async fn load_task_for_member(
    state: &AppState,
    user_id: Uuid,
    task_id: Uuid,
) -> ApiResult<(Task, FamilyRole)> {
    let task = Task::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;

    let role = authorization::require_membership(&state.db, task.family_id, user_id).await?;

    Ok((task, role))
}

/// `GET /families/:familyId/tasks`
pub async fn list_family_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
    Query(query): Query<FamilyTaskQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    authorization::require_membership(&state.db, family_id, auth.user_id).await?;

    let filter = TaskFilter {
        status: parse_status(query.status.as_deref())?,
        assignee_id: query.member_id,
    };

    let tasks = Task::list_for_family(&state.db, family_id, filter).await?;

    Ok(Json(json!({ "tasks": tasks })))
}

/// `POST /families/:familyId/tasks`
///
/// Requires an owner or admin role. Creates the task, its assignments, and
/// one `assigned` notification per assignee in a single transaction, then
/// emits `task_created` on the family channel.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(family_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    authorization::require_task_management(&state.db, family_id, auth.user_id).await?;

    let task = Task::create(
        &state.db,
        family_id,
        auth.user_id,
        CreateTaskData {
            title: req.title,
            description: req.description,
            priority: req.priority,
            due_date: req.due_date,
            assignee_ids: req.assignee_ids,
            image_url: req.image_url,
        },
    )
    .await?;

    tracing::info!(task_id = %task.task.id, family_id = %family_id, "Task created");

    state
        .channels
        .publish(family_id, FamilyEvent::TaskCreated(task.clone()));

    Ok((StatusCode::CREATED, Json(json!({ "task": task }))))
}

/// `GET /tasks/my`
pub async fn my_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<MyTaskQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let status = parse_status(query.status.as_deref())?;

    let tasks = Task::list_assigned_to(&state.db, auth.user_id, status, query.family_id).await?;

    Ok(Json(json!({ "tasks": tasks })))
}

/// `GET /tasks/:taskId`
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    load_task_for_member(&state, auth.user_id, task_id).await?;

    let task = Task::detail(&state.db, task_id).await?;

    Ok(Json(json!({ "task": task })))
}

/// `PUT /tasks/:taskId`
///
/// Any family member may edit. Emits `task_updated` after commit.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (task, _role) = load_task_for_member(&state, auth.user_id, task_id).await?;

    let updated = Task::update(
        &state.db,
        task_id,
        UpdateTaskData {
            title: req.title,
            description: req.description,
            priority: req.priority,
            status: req.status,
            due_date: req.due_date,
            image_url: req.image_url,
            assignee_ids: req.assignee_ids,
        },
    )
    .await?;

    state
        .channels
        .publish(task.family_id, FamilyEvent::TaskUpdated(updated.clone()));

    Ok(Json(json!({ "task": updated })))
}

/// `PATCH /tasks/:taskId/status`
///
/// Membership only, no elevated role. Status is set directly without
/// predecessor-state validation.
pub async fn update_task_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (task, _role) = load_task_for_member(&state, auth.user_id, task_id).await?;

    let status = TaskStatus::parse(&req.status).ok_or_else(|| {
        ApiError::from(DomainError::validation(
            "status must be one of: todo, in_progress, done",
        ))
    })?;

    let updated = Task::set_status(&state.db, task_id, status).await?;

    state
        .channels
        .publish(task.family_id, FamilyEvent::TaskUpdated(updated.clone()));

    Ok(Json(json!({ "task": updated })))
}

/// `DELETE /tasks/:taskId`
///
/// Allowed for the task's creator, or an owner/admin of its family.
/// Deletes all dependent rows and the task in one transaction, then emits
/// `task_deleted` with just the ID.
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let (task, role) = load_task_for_member(&state, auth.user_id, task_id).await?;

    let is_creator = task.created_by == auth.user_id;
    if !authorization::can_delete_task(role, is_creator) {
        return Err(ApiError::Forbidden(
            "only the task's creator or a family owner/admin can delete it".to_string(),
        ));
    }

    Task::delete_cascade(&state.db, task_id).await?;

    tracing::info!(task_id = %task_id, family_id = %task.family_id, "Task deleted");

    state
        .channels
        .publish(task.family_id, FamilyEvent::TaskDeleted(TaskDeleted { task_id }));

    Ok(Json(json!({ "message": "task deleted" })))
}

/// `GET /tasks/:taskId/comments`
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    load_task_for_member(&state, auth.user_id, task_id).await?;

    let comments = Comment::list_for_task(&state.db, task_id).await?;

    Ok(Json(json!({ "comments": comments })))
}

/// `POST /tasks/:taskId/comments`
///
/// Any family member may comment. Notifies the task's creator and
/// assignees in the same transaction.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (task, _role) = load_task_for_member(&state, auth.user_id, task_id).await?;

    let comment = Comment::create(&state.db, &task, auth.user_id, &req.body).await?;

    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))))
}

/// `POST /tasks/:taskId/reactions`
///
/// Toggle semantics: repeating an identical reaction removes it. The
/// response carries the created reaction, or `null` when one was removed.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let (task, _role) = load_task_for_member(&state, auth.user_id, task_id).await?;

    let (target, author) = match req.comment_id {
        Some(comment_id) => {
            let comment = Comment::find_by_id(&state.db, comment_id)
                .await?
                .filter(|c| c.task_id == task_id)
                .ok_or_else(|| ApiError::NotFound("comment not found".to_string()))?;
            (ReactionTarget::Comment(comment_id), comment.user_id)
        }
        None => (ReactionTarget::Task(task_id), task.created_by),
    };

    let reaction = Reaction::toggle(
        &state.db,
        auth.user_id,
        target,
        &req.emoji,
        author,
        task_id,
    )
    .await?;

    Ok(Json(json!({ "reaction": reaction })))
}
