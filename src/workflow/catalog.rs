//! Approval chains and submission rules per clearance type.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::db::models::catalog::WorkflowDefinition;
use crate::db::models::clearance::{
    validate_chain, ApproverRole, ClearanceType, RecordError, SubmitterKind,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid approval chain for {clearance_type}: {source}")]
    InvalidChain {
        clearance_type: ClearanceType,
        source: RecordError,
    },
    #[error("{0} is defined more than once")]
    Duplicate(ClearanceType),
    #[error("{0} has no eligible submitters")]
    NoSubmitters(ClearanceType),
}

#[derive(Debug, Clone)]
pub struct WorkflowCatalog {
    definitions: HashMap<ClearanceType, WorkflowDefinition>,
}

pub const TERMINATION_REASONS: [&str; 5] = [
    "Academic dismissal",
    "Financial reasons",
    "Health reasons",
    "Personal reasons",
    "Transfer to another institution",
];

pub const ID_REPLACEMENT_REASONS: [&str; 4] = ["Lost", "Damaged", "Stolen", "Name change"];

impl WorkflowCatalog {
    pub fn new(definitions: Vec<WorkflowDefinition>) -> Result<Self, CatalogError> {
        let mut map = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            validate_chain(&definition.approval_chain).map_err(|source| {
                CatalogError::InvalidChain {
                    clearance_type: definition.clearance_type,
                    source,
                }
            })?;
            if definition.eligible_submitters.is_empty() {
                return Err(CatalogError::NoSubmitters(definition.clearance_type));
            }
            let clearance_type = definition.clearance_type;
            if map.insert(clearance_type, definition).is_some() {
                return Err(CatalogError::Duplicate(clearance_type));
            }
        }
        Ok(Self { definitions: map })
    }

    /// Reads a JSON array of workflow definitions.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let definitions: Vec<WorkflowDefinition> = serde_json::from_str(&raw)?;
        let catalog = Self::new(definitions)?;
        info!("Loaded {} workflow definitions from {}", catalog.definitions.len(), path.display());
        Ok(catalog)
    }

    pub fn get(&self, clearance_type: ClearanceType) -> Option<&WorkflowDefinition> {
        self.definitions.get(&clearance_type)
    }

    pub fn reasons(&self, clearance_type: ClearanceType) -> Vec<String> {
        self.get(clearance_type)
            .map(|d| d.reasons.clone())
            .unwrap_or_default()
    }

    /// Definitions in the stable order of `ClearanceType::ALL`.
    pub fn definitions(&self) -> Vec<&WorkflowDefinition> {
        ClearanceType::ALL
            .iter()
            .filter_map(|t| self.definitions.get(t))
            .collect()
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        use ApproverRole::*;
        use SubmitterKind::*;

        let def = |clearance_type: ClearanceType, chain: &[ApproverRole], reasons: &[&str], who: &[SubmitterKind]| {
            WorkflowDefinition {
                clearance_type,
                approval_chain: chain.to_vec(),
                reasons: reasons.iter().map(|r| r.to_string()).collect(),
                eligible_submitters: who.to_vec(),
            }
        };

        let definitions = HashMap::from([
            (
                ClearanceType::GraduationClearance,
                def(
                    ClearanceType::GraduationClearance,
                    &[DepartmentHead, Library, Finance, Registrar],
                    &[],
                    &[Student],
                ),
            ),
            (
                ClearanceType::TransferClearance,
                def(
                    ClearanceType::TransferClearance,
                    &[DepartmentHead, Library, Finance, Registrar],
                    &[],
                    &[Student],
                ),
            ),
            (
                ClearanceType::LibraryClearance,
                def(ClearanceType::LibraryClearance, &[Library], &[], &[Student, Teacher]),
            ),
            (
                ClearanceType::LeaveClearance,
                def(
                    ClearanceType::LeaveClearance,
                    &[DepartmentHead, Dormitory, Finance, Registrar],
                    &[],
                    &[Student],
                ),
            ),
            (
                ClearanceType::Termination,
                def(
                    ClearanceType::Termination,
                    &[DepartmentHead, Library, Dormitory, Finance, StudentAffairs, Registrar],
                    &TERMINATION_REASONS,
                    &[Student],
                ),
            ),
            (
                ClearanceType::IdReplacement,
                def(
                    ClearanceType::IdReplacement,
                    &[StudentAffairs, Registrar],
                    &ID_REPLACEMENT_REASONS,
                    &[Student, Teacher],
                ),
            ),
            (
                ClearanceType::TeacherClearance,
                def(
                    ClearanceType::TeacherClearance,
                    &[DepartmentHead, Library, Finance, HumanResources],
                    &[],
                    &[Teacher],
                ),
            ),
        ]);
        Self { definitions }
    }
}
