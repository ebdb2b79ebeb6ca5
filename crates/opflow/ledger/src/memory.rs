//! Deterministic in-memory ledger fallback.
//!
//! Mirrors the behavior of the production adapter's disconnected test mode:
//! every submission succeeds with a synthetic transaction id derived from the
//! method name and the primary id, and submissions are retained in a map for
//! inspection. A failure toggle forces rejection receipts for exercising the
//! no-rollback path.

use crate::{LedgerAdapter, LedgerError, LedgerResult};
use async_trait::async_trait;
use opflow_types::{ComplianceEvent, LedgerReceipt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

const DEFAULT_REPUTATION: u64 = 50;

/// In-memory ledger adapter.
#[derive(Default)]
pub struct InMemoryLedger {
    storage: RwLock<HashMap<String, Value>>,
    reputation: RwLock<HashMap<String, u64>>,
    denied_identities: RwLock<HashSet<String>>,
    forced_failure: RwLock<Option<String>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force every subsequent submission to fail with this error.
    pub fn fail_submissions(&self, error: impl Into<String>) {
        if let Ok(mut guard) = self.forced_failure.write() {
            *guard = Some(error.into());
        }
    }

    /// Clear a previously forced failure.
    pub fn restore(&self) {
        if let Ok(mut guard) = self.forced_failure.write() {
            *guard = None;
        }
    }

    /// Override a subject's reputation score (default is 50).
    pub fn set_reputation(&self, subject: impl Into<String>, score: u64) {
        if let Ok(mut guard) = self.reputation.write() {
            guard.insert(subject.into(), score);
        }
    }

    /// Mark a subject's soulbound credential as unverifiable.
    pub fn deny_identity(&self, subject: impl Into<String>) {
        if let Ok(mut guard) = self.denied_identities.write() {
            guard.insert(subject.into());
        }
    }

    /// Submission recorded under `{kind}:{id}`, if any. Test helper.
    pub fn stored(&self, key: &str) -> Option<Value> {
        self.storage
            .read()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    /// Number of retained submissions. Test helper.
    pub fn submission_count(&self) -> usize {
        self.storage.read().map(|guard| guard.len()).unwrap_or(0)
    }

    fn forced_error(&self) -> Option<String> {
        self.forced_failure.read().ok().and_then(|g| g.clone())
    }

    fn retain(&self, key: String, value: Value) {
        if let Ok(mut guard) = self.storage.write() {
            guard.insert(key, value);
        }
    }
}

/// Render a parameter as the primary-id component of a synthetic tx id.
fn primary_id(params: &[Value]) -> String {
    match params.first() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    }
}

#[async_trait]
impl LedgerAdapter for InMemoryLedger {
    async fn submit(&self, method: &str, params: &[Value]) -> LedgerReceipt {
        if let Some(error) = self.forced_error() {
            tracing::warn!(method, error = %error, "ledger submission rejected");
            return LedgerReceipt::failed(error);
        }

        let id = primary_id(params);
        self.retain(
            format!("{method}:{id}"),
            Value::Array(params.to_vec()),
        );
        tracing::debug!(method, id = %id, "ledger submission committed");
        LedgerReceipt::committed(format!("tx-{method}-{id}"))
    }

    async fn log_event(&self, event: &ComplianceEvent) -> LedgerReceipt {
        if let Some(error) = self.forced_error() {
            tracing::warn!(event_id = %event.id, error = %error, "event submission rejected");
            return LedgerReceipt::failed(error);
        }

        match serde_json::to_value(event) {
            Ok(value) => {
                self.retain(format!("event:{}", event.id), value);
                LedgerReceipt::committed(format!("tx-event-{}", event.id))
            }
            Err(err) => LedgerReceipt::failed(format!("event serialization failed: {err}")),
        }
    }

    async fn verify_identity(&self, subject: &str, _credential: &str) -> LedgerResult<bool> {
        let guard = self
            .denied_identities
            .read()
            .map_err(|_| LedgerError::Backend("identity lock poisoned".to_string()))?;
        Ok(!guard.contains(subject))
    }

    async fn get_reputation_score(&self, subject: &str) -> LedgerResult<u64> {
        let guard = self
            .reputation
            .read()
            .map_err(|_| LedgerError::Backend("reputation lock poisoned".to_string()))?;
        Ok(guard.get(subject).copied().unwrap_or(DEFAULT_REPUTATION))
    }
}
