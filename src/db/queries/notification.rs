// src/db/queries/notification.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde_json::json;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::notification::{
    Notification, NotificationCountResponse, NotificationFilter, NotificationTarget,
    NotificationWithTargets,
};
use crate::middleware::auth::Claims;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::NotificationError;
use crate::utils::openapi::SecurityAddon;

fn notification_error(err: NotificationError) -> ApiResponse<()> {
    let status = match err {
        NotificationError::NotFound(_) => StatusCode::NOT_FOUND,
        NotificationError::NotDismissible(_) => StatusCode::CONFLICT,
        NotificationError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
    };
    ApiResponse::<()>::error(status, err.to_string(), None)
}

/// Get notifications relevant to the current user
#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = Vec<NotificationWithTargets>)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> ApiResponse<Vec<NotificationWithTargets>> {
    let notifications = state
        .notifications
        .for_recipient(&claims.sub, claims.approver_role, &filter)
        .await;
    ApiResponse::success(
        StatusCode::OK,
        "Notifications retrieved successfully",
        notifications,
    )
}

/// Count the current user's notifications
#[utoipa::path(
    get,
    path = "/notifications/count",
    responses(
        (status = 200, description = "Notification count retrieved", body = NotificationCountResponse)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn get_notification_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResponse<NotificationCountResponse> {
    let counts = state
        .notifications
        .count(&claims.sub, claims.approver_role)
        .await;
    ApiResponse::success(StatusCode::OK, "Notification count retrieved", counts)
}

/// Dismiss a notification for the current user
#[utoipa::path(
    post,
    path = "/notifications/{notification_id}/dismiss",
    params(("notification_id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification dismissed"),
        (status = 404, description = "Notification not found"),
        (status = 409, description = "Notification cannot be dismissed")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<Uuid>,
) -> Result<ApiResponse<serde_json::Value>, ApiResponse<()>> {
    state
        .notifications
        .dismiss(notification_id, &claims.sub, claims.approver_role)
        .await
        .map_err(notification_error)?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification dismissed",
        json!({ "notification_id": notification_id }),
    ))
}

#[derive(OpenApi)]
#[openapi(
    paths(get_notifications, get_notification_count, dismiss_notification),
    components(schemas(
        Notification,
        NotificationTarget,
        NotificationWithTargets,
        NotificationCountResponse
    )),
    tags((name = "Notifications", description = "Per-user notification feed")),
    modifiers(&SecurityAddon)
)]
pub struct NotificationDoc;
