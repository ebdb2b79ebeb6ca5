//! Compliance log: the append-only trail of business-meaningful actions.
//!
//! Two layers with different audiences:
//! - compliance events are schema-checked business records, persisted and
//!   mirrored to the external ledger;
//! - audit entries are executor-internal outcomes (validation failures,
//!   ledger submission results, error handling) and never leave the process.
//!
//! Event types, actor addresses, and module tags arrive as runtime strings
//! from callers and are validated here against the fixed enumerations; a
//! violation is itself audited before it is raised.

#![deny(unsafe_code)]

use opflow_ledger::LedgerAdapter;
use opflow_store::{Document, RecordStore};
use opflow_types::{
    ActorAddress, AuditAction, AuditDetails, AuditLogEntry, ComplianceEvent, EventContext,
    EventType, ModuleTag,
};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Collection holding persisted compliance events.
pub const EVENTS_COLLECTION: &str = "compliance_events";
/// Collection holding audit log entries.
pub const AUDIT_COLLECTION: &str = "audit_logs";

/// Compliance-layer errors.
#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("invalid compliance event: {0}")]
    InvalidEvent(String),

    #[error("failed to log event to ledger: {message}")]
    Ledger {
        message: String,
        transaction_id: Option<String>,
    },

    #[error("compliance backend error: {0}")]
    Backend(String),
}

/// Caller-supplied context for a compliance event, validated on record.
#[derive(Clone, Debug, Default)]
pub struct EventContextParams {
    pub soulbound_id: Option<String>,
    pub transaction_id: Option<String>,
    pub module: String,
}

impl EventContextParams {
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn with_soulbound_id(mut self, soulbound_id: impl Into<String>) -> Self {
        self.soulbound_id = Some(soulbound_id.into());
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// The compliance log facade.
pub struct ComplianceLog {
    store: Arc<dyn RecordStore>,
    ledger: Arc<dyn LedgerAdapter>,
}

impl ComplianceLog {
    pub fn new(store: Arc<dyn RecordStore>, ledger: Arc<dyn LedgerAdapter>) -> Self {
        Self { store, ledger }
    }

    /// Record one business event: validate its invariants, persist it,
    /// mirror it to the ledger, and audit the submission outcome.
    ///
    /// A failed ledger mirror is propagated, not swallowed; the locally
    /// persisted event stays in place.
    pub async fn record(
        &self,
        event_type: &str,
        user_id: &str,
        payload: Value,
        context: EventContextParams,
    ) -> Result<ComplianceEvent, ComplianceError> {
        let (event_type, user_id, module) =
            match self.validate_event(event_type, user_id, &context.module) {
                Ok(parts) => parts,
                Err(message) => {
                    self.audit_only(AuditAction::EventValidation, AuditDetails::failed(&message))
                        .await;
                    return Err(ComplianceError::InvalidEvent(message));
                }
            };

        let mut event_context = EventContext::new(module);
        if let Some(soulbound_id) = context.soulbound_id {
            event_context = event_context.with_soulbound_id(soulbound_id);
        }
        if let Some(transaction_id) = context.transaction_id {
            event_context = event_context.with_transaction_id(transaction_id);
        }

        let mut event = ComplianceEvent::new(event_type, user_id, payload, event_context);
        self.persist_event(&event).await?;

        let receipt = self.ledger.log_event(&event).await;
        if !receipt.success {
            let message = receipt
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            let mut details = AuditDetails::failed(&message);
            if let Some(ref transaction_id) = receipt.transaction_id {
                details = details.with_transaction_id(transaction_id.clone());
            }
            self.audit_only(AuditAction::BlockchainSubmission, details)
                .await;
            return Err(ComplianceError::Ledger {
                message,
                transaction_id: receipt.transaction_id,
            });
        }

        let transaction_id = receipt.transaction_id.unwrap_or_default();
        self.audit_only(
            AuditAction::BlockchainSubmission,
            AuditDetails::success().with_transaction_id(transaction_id.clone()),
        )
        .await;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            transaction_id = %transaction_id,
            "compliance event recorded"
        );
        if event.context.transaction_id.is_none() {
            event.context.transaction_id = Some(transaction_id);
        }
        Ok(event)
    }

    /// Append one audit entry locally. Never calls the ledger; a store
    /// failure is logged and the constructed entry still returned, so the
    /// audit path cannot mask the error it is reporting.
    pub async fn audit_only(&self, action: AuditAction, details: AuditDetails) -> AuditLogEntry {
        let entry = AuditLogEntry::new(action, details);
        match to_document(&entry) {
            Ok(document) => {
                if let Err(err) = self.store.insert(AUDIT_COLLECTION, document).await {
                    tracing::error!(action = action.as_str(), error = %err, "audit append failed");
                }
            }
            Err(err) => {
                tracing::error!(action = action.as_str(), error = %err, "audit serialization failed");
            }
        }
        entry
    }

    fn validate_event(
        &self,
        event_type: &str,
        user_id: &str,
        module: &str,
    ) -> Result<(EventType, ActorAddress, ModuleTag), String> {
        let event_type = EventType::from_str(event_type)?;
        let user_id = ActorAddress::parse(user_id)
            .map_err(|_| format!("invalid userId {user_id:?}: must be a valid Ethereum address"))?;
        let module = ModuleTag::from_str(module)?;
        Ok((event_type, user_id, module))
    }

    async fn persist_event(&self, event: &ComplianceEvent) -> Result<(), ComplianceError> {
        let document =
            to_document(event).map_err(|err| ComplianceError::Backend(err.to_string()))?;
        self.store
            .insert(EVENTS_COLLECTION, document)
            .await
            .map_err(|err| ComplianceError::Backend(err.to_string()))?;
        Ok(())
    }
}

fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected object, got {other}"
        ))),
    }
}
