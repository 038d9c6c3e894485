//! Lifecycle transitions for clearance requests.
//!
//! Every function here is pure: it takes the current request by reference and
//! returns the next value, or the reason the action was refused. A refused
//! action never changes anything, so callers may simply drop the error.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::catalog::WorkflowDefinition;
use crate::db::models::clearance::{
    validate_chain, ApprovalEntry, ApproverRole, ClearanceAction, ClearanceRequest, Decision,
    NewClearanceRequest, RequestState, Submitter,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// The action does not apply to the request's state or actor.
    #[error("{0}")]
    InvalidTransition(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Builds a freshly submitted request, waiting on the first role of the chain.
pub fn open(
    id: Uuid,
    submitter: &Submitter,
    definition: &WorkflowDefinition,
    payload: NewClearanceRequest,
    now: DateTime<Utc>,
) -> WorkflowResult<ClearanceRequest> {
    if payload.clearance_type != definition.clearance_type {
        return Err(WorkflowError::Validation(format!(
            "workflow for {} cannot open a {} request",
            definition.clearance_type, payload.clearance_type
        )));
    }
    if !definition.eligible_submitters.contains(&submitter.kind) {
        return Err(WorkflowError::Validation(format!(
            "{:?} accounts cannot submit {}",
            submitter.kind, payload.clearance_type
        )));
    }
    validate_chain(&definition.approval_chain)
        .map_err(|e| WorkflowError::Validation(e.to_string()))?;

    let reason = match payload.reason.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => {
            if !definition.reasons.is_empty() && !definition.reasons.iter().any(|r| r == reason) {
                return Err(WorkflowError::Validation(format!(
                    "'{reason}' is not a listed reason for {}",
                    payload.clearance_type
                )));
            }
            Some(reason.to_string())
        }
        _ if !definition.reasons.is_empty() => {
            return Err(WorkflowError::Validation(format!(
                "a reason is required for {}",
                payload.clearance_type
            )));
        }
        _ => None,
    };

    let first = definition.approval_chain[0];
    Ok(ClearanceRequest {
        id,
        clearance_type: payload.clearance_type,
        user_id: submitter.user_id.clone(),
        user_name: submitter.user_name.clone(),
        user_program: payload
            .user_program
            .filter(|p| !p.trim().is_empty())
            .or_else(|| submitter.program.clone()),
        submitted_at: now,
        state: RequestState::Pending { current: first },
        approval_chain: definition.approval_chain.clone(),
        approvals: Vec::new(),
        documents: merge_documents(&[], &payload.documents)?,
        priority: payload.priority,
        reason,
    })
}

/// Dispatches an approver action to its transition.
pub fn apply(
    request: &ClearanceRequest,
    actor: ApproverRole,
    action: ClearanceAction,
    now: DateTime<Utc>,
) -> WorkflowResult<ClearanceRequest> {
    match action {
        ClearanceAction::Approve { comment } => approve(request, actor, comment, now),
        ClearanceAction::Reject { reason } => reject(request, actor, &reason, now),
        ClearanceAction::RequestInfo { documents_needed } => {
            request_info(request, actor, &documents_needed, now)
        }
        ClearanceAction::UndoRejection => undo_rejection(request, actor),
    }
}

pub fn approve(
    request: &ClearanceRequest,
    actor: ApproverRole,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> WorkflowResult<ClearanceRequest> {
    require_turn(request, actor)?;
    let index = request
        .approval_chain
        .iter()
        .position(|role| *role == actor)
        .ok_or_else(|| {
            WorkflowError::InvalidTransition(format!(
                "{actor} is not part of the approval chain of request {}",
                request.id
            ))
        })?;

    let mut next = request.clone();
    next.approvals.push(ApprovalEntry {
        role: actor,
        status: Decision::Approved,
        timestamp: now,
        comment: comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    });
    next.state = match request.approval_chain.get(index + 1) {
        Some(role) => RequestState::Pending { current: *role },
        None => RequestState::Completed,
    };
    Ok(next)
}

/// Rejects the request; the current approver stays recorded on it.
pub fn reject(
    request: &ClearanceRequest,
    actor: ApproverRole,
    reason: &str,
    now: DateTime<Utc>,
) -> WorkflowResult<ClearanceRequest> {
    let reason = required_text(reason, "rejection reason")?;
    require_turn(request, actor)?;

    let mut next = request.clone();
    next.approvals.push(ApprovalEntry {
        role: actor,
        status: Decision::Rejected,
        timestamp: now,
        comment: Some(reason.clone()),
    });
    next.state = RequestState::Rejected { current: actor, reason };
    Ok(next)
}

pub fn request_info(
    request: &ClearanceRequest,
    actor: ApproverRole,
    documents_needed: &str,
    now: DateTime<Utc>,
) -> WorkflowResult<ClearanceRequest> {
    let documents_needed = required_text(documents_needed, "requested documents")?;
    require_turn(request, actor)?;

    let mut next = request.clone();
    next.approvals.push(ApprovalEntry {
        role: actor,
        status: Decision::InfoRequested,
        timestamp: now,
        comment: Some(documents_needed.clone()),
    });
    next.state = RequestState::InfoRequested {
        current: actor,
        documents_needed,
    };
    Ok(next)
}

/// Withdraws the latest rejection and hands the request back to the actor.
///
/// Only the role that issued the live rejection may undo it.
pub fn undo_rejection(
    request: &ClearanceRequest,
    actor: ApproverRole,
) -> WorkflowResult<ClearanceRequest> {
    let rejected_by = match request.state {
        RequestState::Rejected { current, .. } => current,
        _ => {
            return Err(WorkflowError::InvalidTransition(format!(
                "request {} is {:?}, only rejected requests can be reopened",
                request.id,
                request.status()
            )))
        }
    };
    let no_rejection = || {
        WorkflowError::InvalidTransition(format!(
            "{actor} has no rejection on request {} to undo",
            request.id
        ))
    };
    if rejected_by != actor {
        return Err(no_rejection());
    }
    let position = request
        .approvals
        .iter()
        .rposition(|e| e.status == Decision::Rejected)
        .filter(|&i| request.approvals[i].role == actor)
        .ok_or_else(no_rejection)?;

    let mut next = request.clone();
    next.approvals.remove(position);
    next.state = RequestState::Pending { current: actor };
    Ok(next)
}

/// Submitter answers an information request by attaching documents.
///
/// The request goes back to the approver who asked.
pub fn provide_info(
    request: &ClearanceRequest,
    documents: &[String],
) -> WorkflowResult<ClearanceRequest> {
    if documents.is_empty() {
        return Err(WorkflowError::Validation(
            "at least one document is required".to_string(),
        ));
    }
    let current = match request.state {
        RequestState::InfoRequested { current, .. } => current,
        _ => {
            return Err(WorkflowError::InvalidTransition(format!(
                "request {} is {:?}, no information was requested",
                request.id,
                request.status()
            )))
        }
    };

    let mut next = request.clone();
    next.documents = merge_documents(&request.documents, documents)?;
    next.state = RequestState::Pending { current };
    Ok(next)
}

fn require_turn(request: &ClearanceRequest, actor: ApproverRole) -> WorkflowResult<()> {
    match request.state {
        RequestState::Pending { current } if current == actor => Ok(()),
        RequestState::Pending { current } => Err(WorkflowError::InvalidTransition(format!(
            "request {} is waiting on {current}, not {actor}",
            request.id
        ))),
        _ => Err(WorkflowError::InvalidTransition(format!(
            "request {} is {:?}, not Pending",
            request.id,
            request.status()
        ))),
    }
}

fn required_text(value: &str, field: &str) -> WorkflowResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Appends new references in first-seen order, skipping ones already attached.
fn merge_documents(existing: &[String], added: &[String]) -> WorkflowResult<Vec<String>> {
    let mut merged = existing.to_vec();
    for document in added {
        let document = required_text(document, "document reference")?;
        if !merged.contains(&document) {
            merged.push(document);
        }
    }
    Ok(merged)
}
