//! Ledger adapter: the external append-only ledger as an opaque collaborator.
//!
//! The executor only ever sees commit/fail receipts; contract semantics stay
//! behind this boundary. In the absence of real backing infrastructure, the
//! in-memory fallback returns deterministic synthetic receipts so workflows
//! stay testable and operable disconnected.

#![deny(unsafe_code)]

mod memory;

pub use memory::InMemoryLedger;

use async_trait::async_trait;
use opflow_types::{ComplianceEvent, LedgerReceipt};
use serde_json::Value;
use thiserror::Error;

/// Result type for ledger queries that can fail outright (as opposed to
/// submissions, whose failures travel in the receipt).
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-query errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// The external ledger surface consumed by the workflow executor.
///
/// `submit` and `log_event` never raise: rejection, timeout, and transport
/// failure all surface as `success: false` receipts, indistinguishable by
/// design.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// Invoke a domain-specific ledger method with an ordered parameter list.
    async fn submit(&self, method: &str, params: &[Value]) -> LedgerReceipt;

    /// Mirror a compliance event to the ledger's append-only event log.
    async fn log_event(&self, event: &ComplianceEvent) -> LedgerReceipt;

    /// Verify a soulbound credential for a subject.
    async fn verify_identity(&self, subject: &str, credential: &str) -> LedgerResult<bool>;

    /// Current reputation score for a subject.
    async fn get_reputation_score(&self, subject: &str) -> LedgerResult<u64>;
}
