/// Notification endpoints
///
/// # Endpoints
///
/// - `GET /notifications` - List my notifications (lazily generates
///   overdue entries as a side effect of the read)
/// - `PATCH /notifications/:id/read` - Mark one as read (idempotent)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use choreboard_shared::{auth::middleware::AuthContext, models::notification::Notification};
use serde_json::json;
use uuid::Uuid;

use crate::{app::AppState, error::ApiResult};

/// `GET /notifications`
///
/// Overdue notifications are computed here, not by a background job: the
/// read scans the caller's assigned, past-due, incomplete tasks and inserts
/// any missing `overdue` entries before returning the combined list, newest
/// first, capped at 50.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<serde_json::Value>> {
    let notifications = Notification::list_for_user(&state.db, auth.user_id, Utc::now()).await?;

    Ok(Json(json!({ "notifications": notifications })))
}

/// `PATCH /notifications/:id/read`
///
/// Scoped to the caller's own rows. Succeeds silently for unknown IDs and
/// already-read notifications.
pub async fn mark_as_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    Notification::mark_read(&state.db, auth.user_id, notification_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
