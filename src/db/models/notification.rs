// src/db/models/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::clearance::ApproverRole;

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub type_field: String, // Use type_field instead of r#type
    pub action_type: Option<String>,
    pub action_data: Option<Value>,
    pub dismissible: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Audience of a notification: one user, or everyone holding an approver role.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(tag = "scope", content = "target", rename_all = "snake_case")]
pub enum NotificationTarget {
    User(String),
    Role(ApproverRole),
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NotificationWithTargets {
    pub notification: Notification,
    pub targets: Vec<NotificationTarget>,
    pub dismissed: bool,
}

#[derive(Debug, Serialize, Deserialize, Default, IntoParams, ToSchema)]
pub struct NotificationFilter {
    pub include_dismissed: Option<bool>,
    pub include_expired: Option<bool>,
    #[serde(rename = "type")]
    pub type_field: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationCountResponse {
    pub total: i64,
    pub unread: i64,
}
