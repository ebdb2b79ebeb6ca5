//! The workflow error taxonomy surfaced to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for workflow execution.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Which validation tier rejected the payload.
///
/// `Input` is the request-level shape schema; `Domain` is the entity-level
/// invariant schema run against the record about to be persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationTier {
    Input,
    Domain,
}

impl std::fmt::Display for ValidationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Domain => write!(f, "domain"),
        }
    }
}

/// One schema constraint violation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON pointer into the rejected value.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Violated constraint parameters, e.g. `{"minimum": 0}`.
    pub params: Value,
}

/// Failures a workflow invocation can surface.
///
/// `Ledger` deliberately does not imply rollback of the same invocation's
/// persisted record; callers observing it must treat the record as
/// persisted-but-unconfirmed.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{tier} validation failed with {} violation(s)", violations.len())]
    Validation {
        tier: ValidationTier,
        violations: Vec<SchemaViolation>,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("ledger failure: {message}")]
    Ledger {
        message: String,
        transaction_id: Option<String>,
    },

    #[error("invalid compliance event: {0}")]
    InvalidComplianceEvent(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),
}

impl WorkflowError {
    /// Stable taxonomy tag for the controller layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_failure",
            Self::Persistence(_) => "persistence_failure",
            Self::Ledger { .. } => "ledger_failure",
            Self::InvalidComplianceEvent(_) => "invalid_compliance_event",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::UnknownWorkflow(_) => "unknown_workflow",
        }
    }

    /// HTTP-equivalent status hint for the controller layer.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::InvalidComplianceEvent(_) => 400,
            Self::Unauthorized(_) => 403,
            Self::NotFound(_) | Self::UnknownWorkflow(_) => 404,
            Self::Persistence(_) | Self::Ledger { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_status_hints_cover_the_taxonomy() {
        let err = WorkflowError::Validation {
            tier: ValidationTier::Input,
            violations: vec![],
        };
        assert_eq!(err.kind(), "validation_failure");
        assert_eq!(err.status_hint(), 400);

        let err = WorkflowError::Ledger {
            message: "rpc down".into(),
            transaction_id: None,
        };
        assert_eq!(err.kind(), "ledger_failure");
        assert_eq!(err.status_hint(), 500);

        assert_eq!(WorkflowError::NotFound("post".into()).status_hint(), 404);
        assert_eq!(WorkflowError::Unauthorized("owner".into()).status_hint(), 403);
    }
}
