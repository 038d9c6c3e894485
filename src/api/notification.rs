// src/api/notification.rs
use crate::app_state::AppState;
use crate::db::queries::notification::*;
use axum::{
    routing::{get, post},
    Router,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/count", get(get_notification_count))
        .route(
            "/notifications/{notification_id}/dismiss",
            post(dismiss_notification),
        )
}
