use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::clearance::{ApproverRole, ClearanceRequest};
use crate::db::models::notification::{
    Notification, NotificationCountResponse, NotificationFilter, NotificationTarget,
    NotificationWithTargets,
};

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Invalid target provided: {0}")]
    InvalidTarget(String),

    #[error("Notification {0} not found")]
    NotFound(Uuid),

    #[error("Notification {0} cannot be dismissed")]
    NotDismissible(Uuid),
}

/// Oldest notifications are dropped beyond this many.
pub const MAX_NOTIFICATIONS: usize = 5_000;

struct StoredNotification {
    notification: Notification,
    targets: Vec<NotificationTarget>,
}

impl StoredNotification {
    fn reaches(&self, user_id: &str, role: Option<ApproverRole>) -> bool {
        self.targets.iter().any(|target| match target {
            NotificationTarget::User(id) => id == user_id,
            NotificationTarget::Role(r) => Some(*r) == role,
        })
    }
}

/// In-process notification feed.
#[derive(Default)]
pub struct NotificationCenter {
    notifications: RwLock<Vec<StoredNotification>>,
    dismissals: RwLock<HashSet<(Uuid, String)>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn push(&self, stored: StoredNotification) -> Uuid {
        let id = stored.notification.id;
        let mut notifications = self.notifications.write().await;
        notifications.push(stored);
        if notifications.len() > MAX_NOTIFICATIONS {
            let overflow = notifications.len() - MAX_NOTIFICATIONS;
            let dropped: HashSet<Uuid> = notifications
                .drain(..overflow)
                .map(|n| n.notification.id)
                .collect();
            self.dismissals
                .write()
                .await
                .retain(|(notification_id, _)| !dropped.contains(notification_id));
        }
        id
    }

    /// Notifications visible to a user, newest first.
    pub async fn for_recipient(
        &self,
        user_id: &str,
        role: Option<ApproverRole>,
        filter: &NotificationFilter,
    ) -> Vec<NotificationWithTargets> {
        let now = Utc::now();
        let notifications = self.notifications.read().await;
        let dismissals = self.dismissals.read().await;

        notifications
            .iter()
            .rev()
            .filter(|n| n.reaches(user_id, role))
            .filter(|n| {
                filter.include_expired.unwrap_or(false)
                    || n.notification.expires_at.map_or(true, |at| at > now)
            })
            .filter(|n| {
                filter
                    .type_field
                    .as_ref()
                    .map_or(true, |t| &n.notification.type_field == t)
            })
            .map(|n| NotificationWithTargets {
                notification: n.notification.clone(),
                targets: n.targets.clone(),
                dismissed: dismissals.contains(&(n.notification.id, user_id.to_string())),
            })
            .filter(|n| filter.include_dismissed.unwrap_or(false) || !n.dismissed)
            .skip(filter.offset.unwrap_or(0) as usize)
            .take(filter.limit.map_or(usize::MAX, |l| l as usize))
            .collect()
    }

    pub async fn dismiss(
        &self,
        notification_id: Uuid,
        user_id: &str,
        role: Option<ApproverRole>,
    ) -> NotificationResult<()> {
        let notifications = self.notifications.read().await;
        let stored = notifications
            .iter()
            .find(|n| n.notification.id == notification_id && n.reaches(user_id, role))
            .ok_or(NotificationError::NotFound(notification_id))?;
        if !stored.notification.dismissible {
            return Err(NotificationError::NotDismissible(notification_id));
        }
        self.dismissals
            .write()
            .await
            .insert((notification_id, user_id.to_string()));
        Ok(())
    }

    /// Live (unexpired) notifications for a user, and how many are not yet dismissed.
    pub async fn count(&self, user_id: &str, role: Option<ApproverRole>) -> NotificationCountResponse {
        let filter = NotificationFilter {
            include_dismissed: Some(true),
            ..Default::default()
        };
        let visible = self.for_recipient(user_id, role, &filter).await;
        NotificationCountResponse {
            total: visible.len() as i64,
            unread: visible.iter().filter(|n| !n.dismissed).count() as i64,
        }
    }
}

/// Notification builder for creating system notifications
pub struct NotificationBuilder {
    title: String,
    body: Option<String>,
    notification_type: String,
    targets: Vec<NotificationTarget>,
    action_type: Option<String>,
    action_data: Option<Value>,
    dismissible: bool,
    expires_in_days: Option<i64>,
}

impl NotificationBuilder {
    /// Create a new notification builder with required fields
    pub fn new(title: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            notification_type: notification_type.into(),
            targets: Vec::new(),
            action_type: None,
            action_data: None,
            dismissible: true,
            expires_in_days: Some(30),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn target_user(mut self, user_id: impl Into<String>) -> Self {
        self.targets.push(NotificationTarget::User(user_id.into()));
        self
    }

    /// Everyone acting as `role` sees the notification.
    pub fn target_role(mut self, role: ApproverRole) -> Self {
        self.targets.push(NotificationTarget::Role(role));
        self
    }

    /// Set the action type and data for when notification is clicked
    pub fn action(mut self, action_type: impl Into<String>, action_data: Value) -> Self {
        self.action_type = Some(action_type.into());
        self.action_data = Some(action_data);
        self
    }

    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    /// Set expiration time in days (None means no expiration)
    pub fn expires_in_days(mut self, days: Option<i64>) -> Self {
        self.expires_in_days = days;
        self
    }

    pub async fn send(self, center: &NotificationCenter) -> NotificationResult<Uuid> {
        if self.targets.is_empty() {
            return Err(NotificationError::InvalidTarget(
                "At least one target is required".to_string(),
            ));
        }

        let created_at = Utc::now();
        let expires_at = self
            .expires_in_days
            .map(|days| created_at + chrono::Duration::days(days));

        let stored = StoredNotification {
            notification: Notification {
                id: Uuid::new_v4(),
                title: self.title,
                body: self.body,
                type_field: self.notification_type,
                action_type: self.action_type,
                action_data: self.action_data,
                dismissible: self.dismissible,
                created_at,
                expires_at,
            },
            targets: self.targets,
        };
        Ok(center.push(stored).await)
    }
}

/// Common notification types for clearance events
pub mod notification_types {
    pub const APPROVAL_NEEDED: &str = "approval_needed";
    pub const STEP_APPROVED: &str = "step_approved";
    pub const CLEARANCE_COMPLETED: &str = "clearance_completed";
    pub const CLEARANCE_REJECTED: &str = "clearance_rejected";
    pub const INFO_REQUESTED: &str = "info_requested";
    pub const REJECTION_UNDONE: &str = "rejection_undone";
    pub const INFO_PROVIDED: &str = "info_provided";
}

fn view_request(request: &ClearanceRequest) -> Value {
    json!({ "request_id": request.id, "type": request.clearance_type.label() })
}

/// A request entered the queue of `role`.
pub async fn notify_approval_needed(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    role: ApproverRole,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} awaiting review", request.clearance_type),
        notification_types::APPROVAL_NEEDED,
    )
    .body(format!(
        "{} submitted a {} that now needs {} approval",
        request.user_name, request.clearance_type, role
    ))
    .target_role(role)
    .action("review_request", view_request(request))
    .dismissible(false)
    .expires_in_days(None)
    .send(center)
    .await
}

pub async fn notify_step_approved(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    approved_by: ApproverRole,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} approved your {}", approved_by, request.clearance_type),
        notification_types::STEP_APPROVED,
    )
    .target_user(&request.user_id)
    .action("view_request", view_request(request))
    .send(center)
    .await
}

pub async fn notify_completed(
    center: &NotificationCenter,
    request: &ClearanceRequest,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} completed", request.clearance_type),
        notification_types::CLEARANCE_COMPLETED,
    )
    .body("Every office in the approval chain has signed off.")
    .target_user(&request.user_id)
    .action("view_request", view_request(request))
    .expires_in_days(None)
    .send(center)
    .await
}

pub async fn notify_rejected(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    rejected_by: ApproverRole,
    reason: &str,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} rejected by {}", request.clearance_type, rejected_by),
        notification_types::CLEARANCE_REJECTED,
    )
    .body(format!("Reason: {reason}"))
    .target_user(&request.user_id)
    .action("view_request", view_request(request))
    .expires_in_days(None)
    .send(center)
    .await
}

pub async fn notify_info_requested(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    requested_by: ApproverRole,
    documents_needed: &str,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} needs more information", requested_by),
        notification_types::INFO_REQUESTED,
    )
    .body(format!("Please provide: {documents_needed}"))
    .target_user(&request.user_id)
    .action("provide_info", view_request(request))
    .dismissible(false)
    .expires_in_days(None)
    .send(center)
    .await
}

pub async fn notify_rejection_undone(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    role: ApproverRole,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} reopened your {}", role, request.clearance_type),
        notification_types::REJECTION_UNDONE,
    )
    .body("The rejection was withdrawn and the request is pending again.")
    .target_user(&request.user_id)
    .action("view_request", view_request(request))
    .send(center)
    .await
}

pub async fn notify_info_provided(
    center: &NotificationCenter,
    request: &ClearanceRequest,
    role: ApproverRole,
) -> NotificationResult<Uuid> {
    NotificationBuilder::new(
        format!("{} provided requested documents", request.user_name),
        notification_types::INFO_PROVIDED,
    )
    .target_role(role)
    .action("review_request", view_request(request))
    .send(center)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_requires_a_target() {
        let center = NotificationCenter::new();
        let err = NotificationBuilder::new("Hello", "test").send(&center).await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn role_and_user_targets_are_scoped() {
        let center = NotificationCenter::new();
        NotificationBuilder::new("For library", "test")
            .target_role(ApproverRole::Library)
            .send(&center)
            .await
            .unwrap();
        NotificationBuilder::new("For s-1", "test")
            .target_user("s-1")
            .send(&center)
            .await
            .unwrap();

        let filter = NotificationFilter::default();
        let librarian = center.for_recipient("u-9", Some(ApproverRole::Library), &filter).await;
        assert_eq!(librarian.len(), 1);
        assert_eq!(librarian[0].notification.title, "For library");

        let student = center.for_recipient("s-1", None, &filter).await;
        assert_eq!(student.len(), 1);
        assert!(center.for_recipient("s-2", None, &filter).await.is_empty());
    }

    #[tokio::test]
    async fn dismissal_is_per_user() {
        let center = NotificationCenter::new();
        let id = NotificationBuilder::new("Queue update", "test")
            .target_role(ApproverRole::Finance)
            .send(&center)
            .await
            .unwrap();

        center.dismiss(id, "f-1", Some(ApproverRole::Finance)).await.unwrap();

        let filter = NotificationFilter::default();
        assert!(center.for_recipient("f-1", Some(ApproverRole::Finance), &filter).await.is_empty());
        assert_eq!(center.for_recipient("f-2", Some(ApproverRole::Finance), &filter).await.len(), 1);

        let all = NotificationFilter { include_dismissed: Some(true), ..Default::default() };
        let seen = center.for_recipient("f-1", Some(ApproverRole::Finance), &all).await;
        assert!(seen[0].dismissed);

        let counts = center.count("f-1", Some(ApproverRole::Finance)).await;
        assert_eq!((counts.total, counts.unread), (1, 0));

        let err = center.dismiss(id, "s-1", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_their_dismissals() {
        let center = NotificationCenter::new();
        let oldest = NotificationBuilder::new("First", "test")
            .target_user("s-1")
            .send(&center)
            .await
            .unwrap();
        center.dismiss(oldest, "s-1", None).await.unwrap();
        assert_eq!(center.dismissals.read().await.len(), 1);

        for i in 0..MAX_NOTIFICATIONS {
            NotificationBuilder::new(format!("Update {i}"), "test")
                .target_user("s-1")
                .send(&center)
                .await
                .unwrap();
        }

        assert_eq!(center.notifications.read().await.len(), MAX_NOTIFICATIONS);
        assert!(center.dismissals.read().await.is_empty());
        let err = center.dismiss(oldest, "s-1", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn sticky_notifications_cannot_be_dismissed() {
        let center = NotificationCenter::new();
        let id = NotificationBuilder::new("Action needed", "test")
            .target_user("s-1")
            .dismissible(false)
            .send(&center)
            .await
            .unwrap();
        let err = center.dismiss(id, "s-1", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::NotDismissible(_)));
    }
}
