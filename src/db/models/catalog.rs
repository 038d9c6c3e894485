// src/db/models/catalog.rs
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::clearance::{ApproverRole, ClearanceType, SubmitterKind};

/// How a clearance type is processed: who signs off, in which order,
/// which reasons a submitter may pick and who may submit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub clearance_type: ClearanceType,
    pub approval_chain: Vec<ApproverRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
    pub eligible_submitters: Vec<SubmitterKind>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowQuery {
    /// Clearance type label, e.g. `Graduation Clearance`.
    pub form_type: String,
}
