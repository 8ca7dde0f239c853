use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chorus_shared::errors::{AppError, AppResult};
use chorus_shared::types::api::ApiResponse;
use chorus_shared::types::auth::AuthUser;
use chorus_shared::types::pagination::{default_page, default_per_page, Paginated, PaginationParams};

use crate::models::Notification;
use crate::services::grouping::{self, NotificationGroup};
use crate::services::NotificationFilter;
use crate::AppState;

pub const GROUPS_BUILT_TOTAL: &str = "notification_groups_built_total";

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    /// Another user's feed; admins only.
    pub user_id: Option<Uuid>,
}

impl NotificationQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    fn filter(&self) -> NotificationFilter {
        NotificationFilter {
            category: self.category.clone().filter(|c| !c.is_empty()),
            notification_type: self.notification_type.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

impl CategoryQuery {
    fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

fn target_user(auth_user: &AuthUser, requested: Option<Uuid>) -> AppResult<Uuid> {
    auth_user.resolve_target(requested).ok_or_else(|| {
        tracing::warn!(
            caller_id = %auth_user.id,
            role = %auth_user.role,
            requested_id = ?requested,
            "denied access to another user's notifications"
        );
        AppError::forbidden("cannot read another user's notifications")
    })
}

fn fetch_page(
    state: &AppState,
    user_id: Uuid,
    query: &NotificationQuery,
) -> AppResult<(Vec<Notification>, i64, PaginationParams)> {
    let params = query.pagination();
    let offset = params
        .offset()
        .ok_or_else(|| AppError::Validation(format!("page {} is out of range", query.page)))?;
    let limit = i64::try_from(params.limit())
        .map_err(|_| AppError::Validation(format!("per_page {} is out of range", query.per_page)))?;

    let (items, total) = state.store.list(user_id, &query.filter(), limit, offset)?;

    Ok((items, total, params))
}

/// GET /notifications
/// Flat, newest-first page of notifications.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Notification>>>> {
    let user_id = target_user(&auth_user, query.user_id)?;
    let (items, total, params) = fetch_page(&state, user_id, &query)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &params))))
}

#[derive(Debug, Serialize)]
pub struct GroupedNotificationsResponse {
    pub groups: Vec<NotificationGroup>,
    /// Unread notifications within this page's groups.
    pub unread_count: usize,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// GET /notifications/grouped
/// Same page as `GET /notifications`, collapsed into groups.
pub async fn list_grouped(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<ApiResponse<GroupedNotificationsResponse>>> {
    let user_id = target_user(&auth_user, query.user_id)?;
    let (items, total, params) = fetch_page(&state, user_id, &query)?;
    let fetched = items.len();

    let groups = grouping::group_notifications(items);
    metrics::counter!(GROUPS_BUILT_TOTAL).increment(groups.len() as u64);

    tracing::debug!(
        user_id = %user_id,
        notifications = fetched,
        groups = groups.len(),
        "grouped notifications"
    );

    Ok(Json(ApiResponse::ok(GroupedNotificationsResponse {
        unread_count: grouping::total_unread(&groups),
        groups,
        total: total as u64,
        page: params.page.max(1),
        per_page: params.limit(),
    })))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = state.store.count_unread(auth_user.id, query.category())?;

    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = state.store.mark_all_read(auth_user.id, query.category())?;

    tracing::info!(user_id = %auth_user.id, updated, "marked notifications read");

    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// POST /notifications/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = state.store.mark_read(id, auth_user.id)?;

    Ok(Json(ApiResponse::ok(notification)))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeletedResponse>>> {
    state.store.delete(id, auth_user.id)?;

    tracing::info!(notification_id = %id, user_id = %auth_user.id, "notification deleted");

    Ok(Json(ApiResponse::ok_with_message(DeletedResponse { id }, "notification deleted")))
}
