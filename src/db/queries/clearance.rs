// src/db/queries/clearance.rs
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::models::catalog::{WorkflowDefinition, WorkflowQuery};
use crate::db::models::clearance::{
    ApprovalEntry, ApprovePayload, ApproverRole, ClearanceAction, ClearanceRecord, ClearanceStatus,
    ClearanceType, Decision, NewClearanceRequest, ProvideInfoPayload, RejectPayload,
    RequestInfoPayload, StatusSummary, SubmitterKind,
};
use crate::middleware::auth::Claims;
use crate::utils::api_response::ApiResponse;
use crate::utils::openapi::SecurityAddon;
use crate::workflow::service::{ListQuery, QueueView, ServiceError};

type HandlerResult<T> = Result<ApiResponse<T>, ServiceError>;

/// Submit a new clearance request
#[utoipa::path(
    post,
    path = "/clearance/submit-request",
    request_body = NewClearanceRequest,
    responses(
        (status = 201, description = "Clearance request submitted", body = ClearanceRecord),
        (status = 400, description = "Invalid submission"),
        (status = 403, description = "Caller cannot submit requests")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewClearanceRequest>,
) -> HandlerResult<ClearanceRecord> {
    let request = state.service.submit(&claims, payload).await?;
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Clearance request submitted successfully",
        request.into(),
    ))
}

/// List the requests visible to the caller.
///
/// Submitters see their own requests, approvers one of their queues and
/// administrators everything.
#[utoipa::path(
    get,
    path = "/clearance/requests",
    params(ListQuery),
    responses(
        (status = 200, description = "Requests retrieved successfully", body = Vec<ClearanceRecord>),
        (status = 403, description = "Approver token without an approver role")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> HandlerResult<Vec<ClearanceRecord>> {
    let requests = state.service.list(&claims, &query).await?;
    debug!("{} requests listed for {}", requests.len(), claims.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved successfully",
        requests.into_iter().map(ClearanceRecord::from).collect(),
    ))
}

/// Get one clearance request by ID
#[utoipa::path(
    get,
    path = "/clearance/requests/{id}",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    responses(
        (status = 200, description = "Request retrieved successfully", body = ClearanceRecord),
        (status = 404, description = "Request not found")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> HandlerResult<ClearanceRecord> {
    let request = state.service.get(&claims, id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved successfully",
        request.into(),
    ))
}

async fn act(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
    action: ClearanceAction,
    message: &str,
) -> HandlerResult<ClearanceRecord> {
    let request = state.service.act(claims, id, action).await?;
    Ok(ApiResponse::success(StatusCode::OK, message, request.into()))
}

/// Approve the current step
#[utoipa::path(
    post,
    path = "/clearance/requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    request_body(content = ApprovePayload, description = "Optional approval comment"),
    responses(
        (status = 200, description = "Step approved", body = ClearanceRecord),
        (status = 403, description = "Caller is not an approver"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not pending at the caller's role")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> HandlerResult<ClearanceRecord> {
    // The body is optional; an empty POST approves without a comment.
    let comment = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<ApprovePayload>(&body)
            .map_err(|e| ServiceError::Validation(format!("Invalid approval body: {e}")))?
            .comment
    };
    act(&state, &claims, id, ClearanceAction::Approve { comment }, "Step approved").await
}

/// Reject the request at the current step
#[utoipa::path(
    post,
    path = "/clearance/requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Request rejected", body = ClearanceRecord),
        (status = 400, description = "Missing rejection reason"),
        (status = 409, description = "Request is not pending at the caller's role")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> HandlerResult<ClearanceRecord> {
    let action = ClearanceAction::Reject { reason: payload.reason };
    act(&state, &claims, id, action, "Request rejected").await
}

/// Ask the submitter for more documents
#[utoipa::path(
    post,
    path = "/clearance/requests/{id}/request-info",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    request_body = RequestInfoPayload,
    responses(
        (status = 200, description = "Information requested", body = ClearanceRecord),
        (status = 400, description = "Missing description of needed documents"),
        (status = 409, description = "Request is not pending at the caller's role")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn request_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestInfoPayload>,
) -> HandlerResult<ClearanceRecord> {
    let action = ClearanceAction::RequestInfo {
        documents_needed: payload.documents_needed,
    };
    act(&state, &claims, id, action, "Additional information requested").await
}

/// Withdraw the caller's own rejection
#[utoipa::path(
    post,
    path = "/clearance/requests/{id}/undo-rejection",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    responses(
        (status = 200, description = "Rejection withdrawn", body = ClearanceRecord),
        (status = 409, description = "Request is not rejected, or was rejected by another role")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn undo_rejection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> HandlerResult<ClearanceRecord> {
    act(&state, &claims, id, ClearanceAction::UndoRejection, "Rejection withdrawn").await
}

/// Attach the documents an approver asked for
#[utoipa::path(
    post,
    path = "/clearance/requests/{id}/provide-info",
    params(("id" = Uuid, Path, description = "Clearance request ID")),
    request_body = ProvideInfoPayload,
    responses(
        (status = 200, description = "Request returned to the approver", body = ClearanceRecord),
        (status = 400, description = "No documents given"),
        (status = 403, description = "Caller is not the submitter"),
        (status = 409, description = "No information was requested")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn provide_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProvideInfoPayload>,
) -> HandlerResult<ClearanceRecord> {
    let request = state
        .service
        .provide_info(&claims, id, payload.documents)
        .await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requested information provided",
        request.into(),
    ))
}

/// Count requests per status (admin only)
#[utoipa::path(
    get,
    path = "/clearance/summary",
    responses(
        (status = 200, description = "Summary computed", body = StatusSummary),
        (status = 403, description = "Administrators only")
    ),
    tag = "Clearance",
    security(("bearerAuth" = []))
)]
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<StatusSummary> {
    let summary = state.service.summary(&claims).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Summary computed", summary))
}

/// Approval workflow for a clearance type
#[utoipa::path(
    get,
    path = "/clearance/workflow",
    params(WorkflowQuery),
    responses(
        (status = 200, description = "Workflow retrieved", body = WorkflowDefinition),
        (status = 400, description = "Unknown clearance type")
    ),
    tag = "Clearance Catalog",
    security(("bearerAuth" = []))
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
) -> HandlerResult<WorkflowDefinition> {
    let clearance_type: ClearanceType = query.form_type.parse().map_err(ServiceError::Validation)?;
    let definition = state.service.catalog().get(clearance_type).ok_or_else(|| {
        ServiceError::Validation(format!("No approval workflow is configured for {clearance_type}"))
    })?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Workflow retrieved",
        definition.clone(),
    ))
}

/// Every configured workflow, in a stable order
#[utoipa::path(
    get,
    path = "/clearance/workflows",
    responses((status = 200, description = "Workflows retrieved", body = Vec<WorkflowDefinition>)),
    tag = "Clearance Catalog",
    security(("bearerAuth" = []))
)]
pub async fn list_workflows(State(state): State<AppState>) -> ApiResponse<Vec<WorkflowDefinition>> {
    let definitions = state
        .service
        .catalog()
        .definitions()
        .into_iter()
        .cloned()
        .collect();
    ApiResponse::success(StatusCode::OK, "Workflows retrieved", definitions)
}

/// Reasons a termination may be filed under
#[utoipa::path(
    get,
    path = "/clearance/termination-reasons",
    responses((status = 200, description = "Reasons retrieved", body = Vec<String>)),
    tag = "Clearance Catalog",
    security(("bearerAuth" = []))
)]
pub async fn termination_reasons(State(state): State<AppState>) -> ApiResponse<Vec<String>> {
    ApiResponse::success(
        StatusCode::OK,
        "Reasons retrieved",
        state.service.catalog().reasons(ClearanceType::Termination),
    )
}

/// Reasons an ID card may be replaced for
#[utoipa::path(
    get,
    path = "/clearance/id-replacement-reasons",
    responses((status = 200, description = "Reasons retrieved", body = Vec<String>)),
    tag = "Clearance Catalog",
    security(("bearerAuth" = []))
)]
pub async fn id_replacement_reasons(State(state): State<AppState>) -> ApiResponse<Vec<String>> {
    ApiResponse::success(
        StatusCode::OK,
        "Reasons retrieved",
        state.service.catalog().reasons(ClearanceType::IdReplacement),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        submit_request,
        list_requests,
        get_request,
        approve_request,
        reject_request,
        request_info,
        undo_rejection,
        provide_info,
        get_summary,
        get_workflow,
        list_workflows,
        termination_reasons,
        id_replacement_reasons
    ),
    components(schemas(
        ClearanceRecord,
        ClearanceType,
        ClearanceStatus,
        ApproverRole,
        ApprovalEntry,
        Decision,
        NewClearanceRequest,
        ApprovePayload,
        RejectPayload,
        RequestInfoPayload,
        ProvideInfoPayload,
        StatusSummary,
        WorkflowDefinition,
        SubmitterKind,
        QueueView
    )),
    tags(
        (name = "Clearance", description = "Submitting clearance requests and moving them through their approval chain"),
        (name = "Clearance Catalog", description = "Clearance types, approval chains and selectable reasons")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ClearanceDoc;
