// src/db/models/clearance.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of clearance a submitter can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ClearanceType {
    #[serde(rename = "Graduation Clearance")]
    GraduationClearance,
    #[serde(rename = "Transfer Clearance")]
    TransferClearance,
    #[serde(rename = "Library Clearance")]
    LibraryClearance,
    #[serde(rename = "Leave Clearance")]
    LeaveClearance,
    #[serde(rename = "Termination")]
    Termination,
    #[serde(rename = "ID Replacement")]
    IdReplacement,
    #[serde(rename = "Teacher Clearance")]
    TeacherClearance,
}

impl ClearanceType {
    pub const ALL: [ClearanceType; 7] = [
        ClearanceType::GraduationClearance,
        ClearanceType::TransferClearance,
        ClearanceType::LibraryClearance,
        ClearanceType::LeaveClearance,
        ClearanceType::Termination,
        ClearanceType::IdReplacement,
        ClearanceType::TeacherClearance,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ClearanceType::GraduationClearance => "Graduation Clearance",
            ClearanceType::TransferClearance => "Transfer Clearance",
            ClearanceType::LibraryClearance => "Library Clearance",
            ClearanceType::LeaveClearance => "Leave Clearance",
            ClearanceType::Termination => "Termination",
            ClearanceType::IdReplacement => "ID Replacement",
            ClearanceType::TeacherClearance => "Teacher Clearance",
        }
    }
}

impl fmt::Display for ClearanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ClearanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClearanceType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown clearance type '{s}'"))
    }
}

/// Office whose sign-off is required somewhere in an approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ApproverRole {
    DepartmentHead,
    Library,
    Finance,
    Registrar,
    Dormitory,
    StudentAffairs,
    HumanResources,
}

impl ApproverRole {
    pub const ALL: [ApproverRole; 7] = [
        ApproverRole::DepartmentHead,
        ApproverRole::Library,
        ApproverRole::Finance,
        ApproverRole::Registrar,
        ApproverRole::Dormitory,
        ApproverRole::StudentAffairs,
        ApproverRole::HumanResources,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverRole::DepartmentHead => "DepartmentHead",
            ApproverRole::Library => "Library",
            ApproverRole::Finance => "Finance",
            ApproverRole::Registrar => "Registrar",
            ApproverRole::Dormitory => "Dormitory",
            ApproverRole::StudentAffairs => "StudentAffairs",
            ApproverRole::HumanResources => "HumanResources",
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApproverRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApproverRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown approver role '{s}'"))
    }
}

/// Request status as it appears on the wire.
///
/// `Approved` is a per-step outcome; a stored request is never left in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ClearanceStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    #[serde(rename = "Info Requested")]
    InfoRequested,
}

/// Outcome recorded in the approvals log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Decision {
    Approved,
    Rejected,
    #[serde(rename = "Info Requested")]
    InfoRequested,
}

/// Display ordering hint: 1 = High, 2 = Medium, 3 = Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(format!("priority must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority as u8
    }
}

/// One entry of the approvals log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEntry {
    pub role: ApproverRole,
    pub status: Decision,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Lifecycle position of a request.
///
/// Every non-terminal variant names the role the request is waiting on;
/// `Completed` has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Pending { current: ApproverRole },
    InfoRequested { current: ApproverRole, documents_needed: String },
    Rejected { current: ApproverRole, reason: String },
    Completed,
}

impl RequestState {
    pub fn status(&self) -> ClearanceStatus {
        match self {
            RequestState::Pending { .. } => ClearanceStatus::Pending,
            RequestState::InfoRequested { .. } => ClearanceStatus::InfoRequested,
            RequestState::Rejected { .. } => ClearanceStatus::Rejected,
            RequestState::Completed => ClearanceStatus::Completed,
        }
    }

    pub fn current_approver(&self) -> Option<ApproverRole> {
        match self {
            RequestState::Pending { current }
            | RequestState::InfoRequested { current, .. }
            | RequestState::Rejected { current, .. } => Some(*current),
            RequestState::Completed => None,
        }
    }
}

/// Ways a stored record can break the request invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("approval chain is empty")]
    EmptyChain,
    #[error("approval chain lists {0} more than once")]
    DuplicateRole(ApproverRole),
    #[error("status '{0:?}' is not a resting state")]
    TransientStatus(ClearanceStatus),
    #[error("current approver is missing for a {0:?} request")]
    MissingApprover(ClearanceStatus),
    #[error("completed request still names {0} as current approver")]
    CompletedWithApprover(ApproverRole),
    #[error("approval by {0} is out of chain order")]
    OutOfOrderApproval(ApproverRole),
    #[error("current approver {found} does not match next chain step {expected}")]
    ApproverMismatch { expected: ApproverRole, found: ApproverRole },
    #[error("request is completed but only {approved} of {required} steps are approved")]
    IncompleteChain { approved: usize, required: usize },
    #[error("every step is approved but the request is not completed")]
    ChainExhausted,
    #[error("{0:?} request has no detail text")]
    MissingDetail(ClearanceStatus),
}

/// A clearance request with its full approval history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ClearanceRecord", into = "ClearanceRecord")]
pub struct ClearanceRequest {
    pub id: Uuid,
    pub clearance_type: ClearanceType,
    pub user_id: String,
    pub user_name: String,
    pub user_program: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub state: RequestState,
    pub approval_chain: Vec<ApproverRole>,
    pub approvals: Vec<ApprovalEntry>,
    pub documents: Vec<String>,
    pub priority: Option<Priority>,
    pub reason: Option<String>,
}

impl ClearanceRequest {
    pub fn status(&self) -> ClearanceStatus {
        self.state.status()
    }

    pub fn current_approver(&self) -> Option<ApproverRole> {
        self.state.current_approver()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match &self.state {
            RequestState::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn requested_documents(&self) -> Option<&str> {
        match &self.state {
            RequestState::InfoRequested { documents_needed, .. } => Some(documents_needed),
            _ => None,
        }
    }

    /// Number of chain steps already approved, in chain order.
    pub fn approved_steps(&self) -> Result<usize, RecordError> {
        let mut progress = 0;
        for entry in self.approvals.iter().filter(|e| e.status == Decision::Approved) {
            if self.approval_chain.get(progress) != Some(&entry.role) {
                return Err(RecordError::OutOfOrderApproval(entry.role));
            }
            progress += 1;
        }
        Ok(progress)
    }

    /// Checks every structural invariant of a request.
    pub fn validate(&self) -> Result<(), RecordError> {
        validate_chain(&self.approval_chain)?;
        let approved = self.approved_steps()?;
        let required = self.approval_chain.len();

        match self.state.current_approver() {
            None if approved == required => Ok(()),
            None => Err(RecordError::IncompleteChain { approved, required }),
            Some(_) if approved == required => Err(RecordError::ChainExhausted),
            Some(found) => {
                let expected = self.approval_chain[approved];
                if found == expected {
                    Ok(())
                } else {
                    Err(RecordError::ApproverMismatch { expected, found })
                }
            }
        }
    }
}

/// Chains must be non-empty and name each role at most once.
pub fn validate_chain(chain: &[ApproverRole]) -> Result<(), RecordError> {
    if chain.is_empty() {
        return Err(RecordError::EmptyChain);
    }
    for (i, role) in chain.iter().enumerate() {
        if chain[..i].contains(role) {
            return Err(RecordError::DuplicateRole(*role));
        }
    }
    Ok(())
}

/// Flat JSON layout of a request, as persisted and served.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub clearance_type: ClearanceType,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_program: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: ClearanceStatus,
    pub approval_chain: Vec<ApproverRole>,
    /// Role awaited next, or the string `"None"` once completed.
    #[serde(with = "current_approver")]
    #[schema(value_type = String, example = "Library")]
    pub current_approver: Option<ApproverRole>,
    #[serde(default)]
    pub approvals: Vec<ApprovalEntry>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<u8>, minimum = 1, maximum = 3)]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_documents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<ClearanceRequest> for ClearanceRecord {
    fn from(request: ClearanceRequest) -> Self {
        let status = request.status();
        let current_approver = request.current_approver();
        let (rejection_reason, requested_documents) = match request.state {
            RequestState::Rejected { reason, .. } => (Some(reason), None),
            RequestState::InfoRequested { documents_needed, .. } => (None, Some(documents_needed)),
            RequestState::Pending { .. } | RequestState::Completed => (None, None),
        };

        ClearanceRecord {
            id: request.id,
            clearance_type: request.clearance_type,
            user_id: request.user_id,
            user_name: request.user_name,
            user_program: request.user_program,
            submitted_at: request.submitted_at,
            status,
            approval_chain: request.approval_chain,
            current_approver,
            approvals: request.approvals,
            documents: request.documents,
            priority: request.priority,
            rejection_reason,
            requested_documents,
            reason: request.reason,
        }
    }
}

impl TryFrom<ClearanceRecord> for ClearanceRequest {
    type Error = RecordError;

    fn try_from(record: ClearanceRecord) -> Result<Self, Self::Error> {
        // Detail fields fall back to the latest matching log entry.
        let latest_comment = |decision: Decision| {
            record
                .approvals
                .iter()
                .rev()
                .find(|e| e.status == decision)
                .and_then(|e| e.comment.clone())
        };
        let require_approver = || {
            record
                .current_approver
                .ok_or(RecordError::MissingApprover(record.status))
        };

        let state = match record.status {
            ClearanceStatus::Pending => RequestState::Pending {
                current: require_approver()?,
            },
            ClearanceStatus::InfoRequested => RequestState::InfoRequested {
                current: require_approver()?,
                documents_needed: record
                    .requested_documents
                    .clone()
                    .or_else(|| latest_comment(Decision::InfoRequested))
                    .ok_or(RecordError::MissingDetail(record.status))?,
            },
            ClearanceStatus::Rejected => RequestState::Rejected {
                current: require_approver()?,
                reason: record
                    .rejection_reason
                    .clone()
                    .or_else(|| latest_comment(Decision::Rejected))
                    .ok_or(RecordError::MissingDetail(record.status))?,
            },
            ClearanceStatus::Completed => match record.current_approver {
                Some(role) => return Err(RecordError::CompletedWithApprover(role)),
                None => RequestState::Completed,
            },
            ClearanceStatus::Approved => return Err(RecordError::TransientStatus(record.status)),
        };

        let request = ClearanceRequest {
            id: record.id,
            clearance_type: record.clearance_type,
            user_id: record.user_id,
            user_name: record.user_name,
            user_program: record.user_program,
            submitted_at: record.submitted_at,
            state,
            approval_chain: record.approval_chain,
            approvals: record.approvals,
            documents: record.documents,
            priority: record.priority,
            reason: record.reason,
        };
        request.validate()?;
        Ok(request)
    }
}

mod current_approver {
    use super::ApproverRole;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    const NONE: &str = "None";

    pub fn serialize<S: Serializer>(
        value: &Option<ApproverRole>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(role) => role.serialize(serializer),
            None => serializer.serialize_str(NONE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ApproverRole>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NONE {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(de::Error::custom)
    }
}

/// Who is submitting: drives catalog eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SubmitterKind {
    Student,
    Teacher,
}

/// Identity of the submitter as known from the auth token.
#[derive(Debug, Clone)]
pub struct Submitter {
    pub user_id: String,
    pub user_name: String,
    pub program: Option<String>,
    pub kind: SubmitterKind,
}

/// Body of a new clearance submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewClearanceRequest {
    #[serde(rename = "type")]
    pub clearance_type: ClearanceType,
    #[serde(default)]
    pub user_program: Option<String>,
    /// Opaque document references (file names or upload ids).
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Option<u8>, minimum = 1, maximum = 3)]
    pub priority: Option<Priority>,
    /// Required for types whose workflow lists reasons.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Approver or submitter action on an existing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClearanceAction {
    Approve {
        #[serde(default)]
        comment: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Reject { reason: String },
    #[serde(rename_all = "camelCase")]
    RequestInfo { documents_needed: String },
    UndoRejection,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApprovePayload {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPayload {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfoPayload {
    pub documents_needed: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProvideInfoPayload {
    pub documents: Vec<String>,
}

/// Request counts per resting status.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub info_requested: usize,
    pub rejected: usize,
    pub completed: usize,
}
