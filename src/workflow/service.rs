//! The request repository: the only place a stored request is ever changed.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::clearance::{
    ApproverRole, ClearanceAction, ClearanceRequest, ClearanceStatus, NewClearanceRequest,
    RequestState, StatusSummary,
};
use crate::db::store::{RequestStore, StoreError};
use crate::middleware::auth::{Claims, UserRole};
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::{self, NotificationCenter, NotificationResult};
use crate::workflow::catalog::WorkflowCatalog;
use crate::workflow::filters;
use crate::workflow::lifecycle::{self, WorkflowError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("clearance request {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    Forbidden(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<WorkflowError> for ServiceError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => ServiceError::Validation(msg),
            WorkflowError::InvalidTransition(msg) => ServiceError::InvalidTransition(msg),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::InvalidTransition(_) => "InvalidTransition",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::Storage(_) => "StorageError",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // Storage details stay in the logs.
        let message = match &self {
            ServiceError::Storage(_) => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        };
        ApiResponse::<()>::error(self.status_code(), message, Some(json!({ "kind": self.kind() })))
            .into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Which slice of the collection an approver wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueueView {
    Pending,
    Approved,
    Rejected,
    InfoRequested,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Approver queue to show; defaults to `pending`.
    pub view: Option<QueueView>,
    /// Extra status filter applied after the view.
    pub status: Option<ClearanceStatus>,
}

pub struct ClearanceService {
    store: Arc<dyn RequestStore>,
    catalog: WorkflowCatalog,
    notifications: Arc<NotificationCenter>,
    write_gate: Mutex<()>,
}

impl ClearanceService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        catalog: WorkflowCatalog,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifications,
            write_gate: Mutex::new(()),
        }
    }

    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    pub async fn ping(&self) -> ServiceResult<()> {
        Ok(self.store.ping().await?)
    }

    pub async fn submit(
        &self,
        claims: &Claims,
        payload: NewClearanceRequest,
    ) -> ServiceResult<ClearanceRequest> {
        let submitter = claims.submitter().ok_or_else(|| {
            ServiceError::Forbidden("Only students and teachers can submit clearance requests".into())
        })?;
        let definition = self.catalog.get(payload.clearance_type).ok_or_else(|| {
            ServiceError::Validation(format!(
                "No approval workflow is configured for {}",
                payload.clearance_type
            ))
        })?;

        let request = lifecycle::open(Uuid::new_v4(), &submitter, definition, payload, Utc::now())
            .inspect_err(|e| warn!("Rejected submission from {}: {}", submitter.user_id, e))?;

        {
            let _gate = self.write_gate.lock().await;
            self.store.insert(&request).await.inspect_err(|e| {
                error!("Failed to store clearance request {}: {}", request.id, e)
            })?;
        }
        info!(
            "Clearance request {} ({}) submitted by {}",
            request.id, request.clearance_type, request.user_id
        );

        if let Some(role) = request.current_approver() {
            log_notify(notification::notify_approval_needed(&self.notifications, &request, role).await);
        }
        Ok(request)
    }

    pub async fn get(&self, claims: &Claims, id: Uuid) -> ServiceResult<ClearanceRequest> {
        let request = self.load(id).await?;
        if !can_view(claims, &request) {
            // Hide existence from users with no stake in the request.
            return Err(ServiceError::NotFound(id));
        }
        Ok(request)
    }

    pub async fn list(&self, claims: &Claims, query: &ListQuery) -> ServiceResult<Vec<ClearanceRequest>> {
        let all = self.store.list().await?;
        let mut visible = match claims.role {
            UserRole::Admin => all,
            UserRole::Student | UserRole::Teacher => filters::submitted_by(&all, &claims.sub),
            UserRole::Approver => {
                let role = require_approver(claims)?;
                match query.view.unwrap_or(QueueView::Pending) {
                    QueueView::Pending => filters::pending_for(&all, role),
                    QueueView::Approved => filters::approved_by(&all, role),
                    QueueView::Rejected => filters::rejected_by(&all, role),
                    QueueView::InfoRequested => filters::info_requested_by(&all, role),
                }
            }
        };
        if let Some(status) = query.status {
            visible = filters::with_status(&visible, status);
        }
        filters::sort_for_display(&mut visible);
        Ok(visible)
    }

    pub async fn summary(&self, claims: &Claims) -> ServiceResult<StatusSummary> {
        if claims.role != UserRole::Admin {
            return Err(ServiceError::Forbidden("Only administrators can view the summary".into()));
        }
        Ok(filters::status_summary(&self.store.list().await?))
    }

    /// Applies an approver action, persisting the result.
    pub async fn act(
        &self,
        claims: &Claims,
        id: Uuid,
        action: ClearanceAction,
    ) -> ServiceResult<ClearanceRequest> {
        let actor = require_approver(claims)?;

        let (before, after) = {
            let _gate = self.write_gate.lock().await;
            let before = self.load(id).await?;
            let after = lifecycle::apply(&before, actor, action, Utc::now()).inspect_err(|e| {
                warn!("{} ({}) refused on request {}: {}", actor, claims.username, id, e)
            })?;
            self.store.replace(&after).await.inspect_err(|e| {
                error!("Failed to persist request {}: {}", id, e)
            })?;
            (before, after)
        };

        info!(
            "Request {} moved {:?} -> {:?} by {} ({})",
            id,
            before.status(),
            after.status(),
            actor,
            claims.username
        );
        self.announce(&before, &after, actor).await;
        Ok(after)
    }

    /// Submitter attaches the documents an approver asked for.
    pub async fn provide_info(
        &self,
        claims: &Claims,
        id: Uuid,
        documents: Vec<String>,
    ) -> ServiceResult<ClearanceRequest> {
        let after = {
            let _gate = self.write_gate.lock().await;
            let before = self.load(id).await?;
            if before.user_id != claims.sub {
                return Err(ServiceError::Forbidden(
                    "Only the submitter can provide requested information".into(),
                ));
            }
            let after = lifecycle::provide_info(&before, &documents)?;
            self.store.replace(&after).await.inspect_err(|e| {
                error!("Failed to persist request {}: {}", id, e)
            })?;
            after
        };

        info!("Submitter {} answered information request on {}", claims.sub, id);
        if let Some(role) = after.current_approver() {
            log_notify(notification::notify_info_provided(&self.notifications, &after, role).await);
        }
        Ok(after)
    }

    async fn load(&self, id: Uuid) -> ServiceResult<ClearanceRequest> {
        self.store.get(id).await?.ok_or(ServiceError::NotFound(id))
    }

    async fn announce(&self, before: &ClearanceRequest, after: &ClearanceRequest, actor: ApproverRole) {
        let center = &self.notifications;
        let sent = match (&before.state, &after.state) {
            (RequestState::Pending { .. }, RequestState::Completed) => {
                notification::notify_completed(center, after).await
            }
            (RequestState::Pending { .. }, RequestState::Pending { current }) => {
                log_notify(notification::notify_step_approved(center, after, actor).await);
                notification::notify_approval_needed(center, after, *current).await
            }
            (_, RequestState::Rejected { reason, .. }) => {
                notification::notify_rejected(center, after, actor, reason).await
            }
            (_, RequestState::InfoRequested { documents_needed, .. }) => {
                notification::notify_info_requested(center, after, actor, documents_needed).await
            }
            (RequestState::Rejected { .. }, RequestState::Pending { .. }) => {
                notification::notify_rejection_undone(center, after, actor).await
            }
            _ => return,
        };
        log_notify(sent);
    }
}

fn log_notify(result: NotificationResult<Uuid>) {
    if let Err(e) = result {
        warn!("Failed to queue notification: {}", e);
    }
}

fn require_approver(claims: &Claims) -> ServiceResult<ApproverRole> {
    match (&claims.role, claims.approver_role) {
        (UserRole::Approver, Some(role)) => Ok(role),
        _ => Err(ServiceError::Forbidden(
            "Only approvers can act on clearance requests".into(),
        )),
    }
}

fn can_view(claims: &Claims, request: &ClearanceRequest) -> bool {
    match claims.role {
        UserRole::Admin => true,
        UserRole::Student | UserRole::Teacher => request.user_id == claims.sub,
        UserRole::Approver => claims
            .approver_role
            .is_some_and(|role| request.approval_chain.contains(&role)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::clearance::{ClearanceType, Decision, Priority};
    use crate::db::models::notification::NotificationFilter;
    use crate::db::store::MemoryStore;
    use tokio_test::assert_ok;

    fn claims(sub: &str, role: UserRole, approver_role: Option<ApproverRole>) -> Claims {
        Claims {
            sub: sub.into(),
            username: format!("user-{sub}"),
            role,
            approver_role,
            program: Some("Civil Engineering".into()),
            exp: usize::MAX,
        }
    }

    fn student() -> Claims {
        claims("s-1", UserRole::Student, None)
    }

    fn approver(role: ApproverRole) -> Claims {
        claims(&format!("a-{role}"), UserRole::Approver, Some(role))
    }

    fn service() -> (ClearanceService, Arc<NotificationCenter>) {
        let notifications = Arc::new(NotificationCenter::new());
        let service = ClearanceService::new(
            Arc::new(MemoryStore::new()),
            WorkflowCatalog::default(),
            notifications.clone(),
        );
        (service, notifications)
    }

    fn graduation() -> NewClearanceRequest {
        NewClearanceRequest {
            clearance_type: ClearanceType::GraduationClearance,
            user_program: None,
            documents: vec!["transcript.pdf".into()],
            priority: Some(Priority::High),
            reason: None,
        }
    }

    #[tokio::test]
    async fn graduation_runs_through_whole_chain() {
        let (service, _) = service();
        let request = service.submit(&student(), graduation()).await.unwrap();
        assert_eq!(request.current_approver(), Some(ApproverRole::DepartmentHead));
        assert_eq!(request.user_program.as_deref(), Some("Civil Engineering"));

        let mut latest = request.clone();
        for role in [
            ApproverRole::DepartmentHead,
            ApproverRole::Library,
            ApproverRole::Finance,
            ApproverRole::Registrar,
        ] {
            latest = service
                .act(&approver(role), request.id, ClearanceAction::Approve { comment: None })
                .await
                .unwrap();
        }
        assert_eq!(latest.status(), ClearanceStatus::Completed);
        assert_eq!(latest.current_approver(), None);

        let stored = service.get(&student(), request.id).await.unwrap();
        assert_eq!(stored, latest);
    }

    #[tokio::test]
    async fn refused_actions_leave_store_untouched() {
        let (service, _) = service();
        let request = service.submit(&student(), graduation()).await.unwrap();

        let err = service
            .act(
                &approver(ApproverRole::Library),
                request.id,
                ClearanceAction::Approve { comment: None },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err = service
            .act(
                &approver(ApproverRole::DepartmentHead),
                request.id,
                ClearanceAction::Reject { reason: "  ".into() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let stored = service.get(&student(), request.id).await.unwrap();
        assert_eq!(stored, request);
    }

    #[tokio::test]
    async fn concurrent_approvals_apply_once() {
        let (service, _) = service();
        let service = Arc::new(service);
        let request = service.submit(&student(), graduation()).await.unwrap();
        let id = request.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .act(
                            &approver(ApproverRole::DepartmentHead),
                            id,
                            ClearanceAction::Approve { comment: None },
                        )
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);

        let stored = service.get(&student(), request.id).await.unwrap();
        let approved = stored.approvals.iter().filter(|a| a.status == Decision::Approved).count();
        assert_eq!(approved, 1);
        assert_eq!(stored.current_approver(), Some(ApproverRole::Library));
    }

    #[tokio::test]
    async fn reject_undo_and_info_flow_notify_the_submitter() {
        let (service, notifications) = service();
        let request = service.submit(&student(), graduation()).await.unwrap();
        let head = approver(ApproverRole::DepartmentHead);

        service
            .act(&head, request.id, ClearanceAction::Reject { reason: "Incomplete documentation".into() })
            .await
            .unwrap();
        let reopened = service
            .act(&head, request.id, ClearanceAction::UndoRejection)
            .await
            .unwrap();
        assert_eq!(reopened.state, RequestState::Pending { current: ApproverRole::DepartmentHead });
        assert!(reopened.approvals.is_empty());

        service
            .act(
                &head,
                request.id,
                ClearanceAction::RequestInfo { documents_needed: "Signed thesis form".into() },
            )
            .await
            .unwrap();

        let other = claims("s-2", UserRole::Student, None);
        let err = service
            .provide_info(&other, request.id, vec!["thesis-form.pdf".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let answered = service
            .provide_info(&student(), request.id, vec!["thesis-form.pdf".into()])
            .await
            .unwrap();
        assert_eq!(answered.status(), ClearanceStatus::Pending);
        assert_eq!(answered.documents, vec!["transcript.pdf", "thesis-form.pdf"]);

        let inbox = notifications
            .for_recipient("s-1", None, &NotificationFilter::default())
            .await;
        let kinds: Vec<_> = inbox.iter().map(|n| n.notification.type_field.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                notification::notification_types::INFO_REQUESTED,
                notification::notification_types::REJECTION_UNDONE,
                notification::notification_types::CLEARANCE_REJECTED,
            ]
        );

        let queue = notifications
            .for_recipient("a-1", Some(ApproverRole::DepartmentHead), &NotificationFilter::default())
            .await;
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn listing_is_scoped_by_role() {
        let (service, _) = service();
        let mine = service.submit(&student(), graduation()).await.unwrap();
        let other = claims("s-2", UserRole::Student, None);
        service.submit(&other, graduation()).await.unwrap();

        let own = service.list(&student(), &ListQuery::default()).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, mine.id);

        let head = approver(ApproverRole::DepartmentHead);
        assert_eq!(service.list(&head, &ListQuery::default()).await.unwrap().len(), 2);
        assert!(service
            .list(&approver(ApproverRole::Library), &ListQuery::default())
            .await
            .unwrap()
            .is_empty());

        assert_ok!(
            service
                .act(&head, mine.id, ClearanceAction::Approve { comment: None })
                .await
        );
        let approved = service
            .list(&head, &ListQuery { view: Some(QueueView::Approved), status: None })
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);

        let admin = claims("root", UserRole::Admin, None);
        let summary = service.summary(&admin).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.pending, 2);
        assert!(matches!(service.summary(&head).await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn outsiders_cannot_see_requests() {
        let (service, _) = service();
        let request = service.submit(&student(), graduation()).await.unwrap();

        let err = service
            .get(&claims("s-2", UserRole::Student, None), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = service
            .get(&approver(ApproverRole::HumanResources), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        assert_ok!(service.get(&approver(ApproverRole::Finance), request.id).await);
    }

    #[tokio::test]
    async fn only_submitters_submit_and_only_approvers_act() {
        let (service, _) = service();
        let err = service
            .submit(&approver(ApproverRole::Library), graduation())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let request = service.submit(&student(), graduation()).await.unwrap();
        let err = service
            .act(&student(), request.id, ClearanceAction::Approve { comment: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let teacher = claims("t-1", UserRole::Teacher, None);
        let err = service.submit(&teacher, graduation()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
