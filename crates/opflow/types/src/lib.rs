//! Opflow domain types.
//!
//! Shared vocabulary for the workflow executor and its collaborators:
//! - actor addresses and the compliance event/audit record shapes
//! - ledger receipts
//! - the workflow error taxonomy surfaced to controllers
//! - declarative workflow definitions (steps, persist/ledger/aggregate specs)
//!
//! Definitions are immutable once registered; events and audit entries are
//! append-only and never mutated after creation.

#![deny(unsafe_code)]

mod actor;
mod definition;
mod error;
mod event;
mod receipt;

pub use actor::{ActorAddress, AddressParseError};
pub use definition::{
    ActorSpec, AggregateOutput, AggregateSpec, LedgerCallSpec, ParamSource, PersistSpec,
    ReputationGate, RewardFormula, StepKind, WorkflowDefinition, WorkflowName, WorkflowOutcome,
    WorkflowRequest, WorkflowResponse,
};
pub use error::{SchemaViolation, ValidationTier, WorkflowError, WorkflowResult};
pub use event::{
    AuditAction, AuditDetails, AuditLogEntry, AuditStatus, ComplianceEvent, EventContext,
    EventType, ModuleTag, DEFAULT_SOULBOUND_ID,
};
pub use receipt::LedgerReceipt;
