//! The workflow executor: validate, persist, call out, aggregate, record.
//!
//! Each invocation runs the declared pipeline strictly in order and suspends
//! independently at every collaborator call; there is no shared mutable
//! executor state, so any number of invocations may be in flight at once.
//! Cross-invocation ordering against the same record is the store's concern.
//!
//! Failure semantics, deliberately asymmetric:
//! - validation and persistence failures abort before/at the primary write;
//! - a ledger failure aborts the call but leaves the already-persisted
//!   record in place (persisted-but-unconfirmed, surfaced as `Ledger`);
//! - aggregate-update failures are logged and never unwind earlier steps.
//!
//! Every failed invocation is mirrored by exactly one `error_handling`
//! audit entry, written after any step-specific audit entries.

use crate::registry::WorkflowRegistry;
use opflow_compliance::{ComplianceError, ComplianceLog, EventContextParams};
use opflow_ledger::LedgerAdapter;
use opflow_schema::SchemaRegistry;
use opflow_store::{Document, Filter, Mutation, RecordStore, UpdateOptions};
use opflow_types::{
    ActorAddress, ActorSpec, AggregateOutput, AggregateSpec, AuditAction, AuditDetails,
    LedgerCallSpec, ParamSource, PersistSpec, RewardFormula, ValidationTier, WorkflowDefinition,
    WorkflowError, WorkflowOutcome, WorkflowRequest, WorkflowResponse, WorkflowResult,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// The collaborators every invocation writes through, passed explicitly.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub compliance: Arc<ComplianceLog>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn LedgerAdapter>,
        compliance: Arc<ComplianceLog>,
    ) -> Self {
        Self {
            store,
            ledger,
            compliance,
        }
    }
}

/// Executes registered workflows against input payloads.
pub struct WorkflowExecutor {
    registry: WorkflowRegistry,
    schemas: SchemaRegistry,
}

impl WorkflowExecutor {
    pub fn new(registry: WorkflowRegistry, schemas: SchemaRegistry) -> Self {
        Self { registry, schemas }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Run one workflow invocation end to end.
    ///
    /// On any failure, one `error_handling` audit entry is written before
    /// the error propagates.
    pub async fn execute(
        &self,
        name: &str,
        input: &Value,
        collaborators: &Collaborators,
    ) -> WorkflowResult<WorkflowOutcome> {
        match self.run(name, input, collaborators).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                let mut details = AuditDetails::failed(error.to_string())
                    .with_extra("workflow", json!(name))
                    .with_extra("errorKind", json!(error.kind()));
                if let Ok(definition) = self.registry.get(name) {
                    details =
                        details.with_extra("eventType", json!(definition.event_type.as_str()));
                    if let ActorSpec::Field(ref field) = definition.actor {
                        if let Some(actor) = input.get(field.as_str()) {
                            details = details.with_extra("actor", actor.clone());
                        }
                    }
                }
                collaborators
                    .compliance
                    .audit_only(AuditAction::ErrorHandling, details)
                    .await;
                tracing::warn!(workflow = name, error = %error, "workflow failed");
                Err(error)
            }
        }
    }

    /// The single invocation surface consumed by controllers.
    pub async fn handle(
        &self,
        request: WorkflowRequest,
        collaborators: &Collaborators,
    ) -> WorkflowResponse {
        match self
            .execute(&request.workflow, &request.input, collaborators)
            .await
        {
            Ok(outcome) => WorkflowResponse::from(outcome),
            Err(error) => WorkflowResponse::from(&error),
        }
    }

    async fn run(
        &self,
        name: &str,
        input: &Value,
        collaborators: &Collaborators,
    ) -> WorkflowResult<WorkflowOutcome> {
        let definition = self.registry.get(name)?;

        // Step 1: input-tier validation. Nothing else runs on failure.
        self.check_schema(
            &definition.input_schema,
            ValidationTier::Input,
            input,
            collaborators,
        )
        .await?;

        let actor = self.resolve_actor(&definition, input)?;
        self.check_gates(&definition, input, &actor, collaborators)
            .await?;

        // Step 2: derive the primary id; supplied ids are honored verbatim.
        let id_field = definition.persist.id_field();
        let supplied_id = input.get(id_field).and_then(Value::as_str);
        let record_id = match supplied_id {
            Some(id) => id.to_string(),
            None => match &definition.persist {
                PersistSpec::Create {
                    id_prefix: Some(prefix),
                    ..
                } => format!("{prefix}-{}", Uuid::new_v4()),
                _ => Uuid::new_v4().to_string(),
            },
        };

        // Step 3: persist the primary record.
        let record = self
            .persist(&definition, input, &record_id, supplied_id.is_some(), collaborators)
            .await?;

        let mut outputs = Map::new();
        outputs.insert(definition.id_output_key.clone(), json!(record_id));
        for (key, value) in &definition.extra_outputs {
            outputs.insert(key.clone(), value.clone());
        }

        // Step 4: the external ledger call, at most one per workflow.
        let transaction_id = match &definition.ledger_call {
            Some(call) => Some(
                self.call_ledger(call, input, &record_id, &record, collaborators)
                    .await?,
            ),
            None => None,
        };
        if let Some(ref transaction_id) = transaction_id {
            outputs.insert("transactionId".to_string(), json!(transaction_id));
        }

        // Step 5: aggregate updates, best-effort and in declared order.
        for aggregate in &definition.aggregates {
            self.apply_aggregate(aggregate, input, &mut outputs, collaborators)
                .await;
        }

        // Step 6: exactly one compliance event on the success path.
        let mut context = EventContextParams::module(definition.module.as_str());
        if let Some(soulbound_id) = actor.soulbound_id {
            context = context.with_soulbound_id(soulbound_id);
        }
        if let Some(transaction_id) = transaction_id {
            context = context.with_transaction_id(transaction_id);
        }
        collaborators
            .compliance
            .record(
                definition.event_type.as_str(),
                actor.address.as_str(),
                Value::Object(outputs.clone()),
                context,
            )
            .await
            .map_err(compliance_error)?;

        tracing::info!(workflow = name, record_id = %record_id, "workflow completed");
        Ok(WorkflowOutcome {
            outputs,
            success: true,
        })
    }

    async fn check_schema(
        &self,
        schema: &str,
        tier: ValidationTier,
        value: &Value,
        collaborators: &Collaborators,
    ) -> WorkflowResult<()> {
        let report = self.schemas.validate(schema, value);
        if report.valid {
            return Ok(());
        }
        let details = AuditDetails::failed(format!("{tier} validation failed"))
            .with_extra("schema", json!(schema))
            .with_extra(
                "violations",
                serde_json::to_value(&report.errors).unwrap_or_else(|_| json!([])),
            );
        collaborators
            .compliance
            .audit_only(AuditAction::EventValidation, details)
            .await;
        Err(WorkflowError::Validation {
            tier,
            violations: report.errors,
        })
    }

    fn resolve_actor(
        &self,
        definition: &WorkflowDefinition,
        input: &Value,
    ) -> WorkflowResult<ResolvedActor> {
        match &definition.actor {
            ActorSpec::Field(field) => {
                let raw = input
                    .get(field.as_str())
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        WorkflowError::InvalidComplianceEvent(format!(
                            "missing actor field {field:?}"
                        ))
                    })?;
                let address = ActorAddress::parse(raw)
                    .map_err(|err| WorkflowError::InvalidComplianceEvent(err.to_string()))?;
                Ok(ResolvedActor {
                    address,
                    soulbound_id: None,
                })
            }
            ActorSpec::System => {
                let soulbound_id = definition
                    .identity_field
                    .as_deref()
                    .and_then(|field| input.get(field))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(ResolvedActor {
                    address: ActorAddress::system(),
                    soulbound_id,
                })
            }
        }
    }

    async fn check_gates(
        &self,
        definition: &WorkflowDefinition,
        input: &Value,
        actor: &ResolvedActor,
        collaborators: &Collaborators,
    ) -> WorkflowResult<()> {
        if let Some(field) = definition.identity_field.as_deref() {
            let subject = input
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default();
            let credential = input
                .get("credentialId")
                .and_then(Value::as_str)
                .unwrap_or(subject);
            let verified = collaborators
                .ledger
                .verify_identity(subject, credential)
                .await
                .map_err(ledger_error)?;
            if !verified {
                return Err(WorkflowError::Unauthorized(format!(
                    "identity verification failed for {subject}"
                )));
            }
        }

        if let Some(gate) = definition.reputation_gate {
            let score = collaborators
                .ledger
                .get_reputation_score(actor.address.as_str())
                .await
                .map_err(ledger_error)?;
            if score < gate.minimum {
                return Err(WorkflowError::Unauthorized(format!(
                    "reputation {score} below required minimum {}",
                    gate.minimum
                )));
            }
        }
        Ok(())
    }

    async fn persist(
        &self,
        definition: &WorkflowDefinition,
        input: &Value,
        record_id: &str,
        id_supplied: bool,
        collaborators: &Collaborators,
    ) -> WorkflowResult<Document> {
        match &definition.persist {
            PersistSpec::Create {
                collection,
                id_field,
                status,
                exclude_fields,
                defaults,
                ..
            } => {
                let mut record = input
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                for field in exclude_fields {
                    record.remove(field);
                }
                record.insert(id_field.clone(), json!(record_id));
                if let Some(status) = status {
                    record.insert("status".to_string(), json!(status));
                }
                for (field, value) in defaults {
                    record.entry(field.clone()).or_insert_with(|| value.clone());
                }
                record.insert(
                    "createdAt".to_string(),
                    json!(chrono::Utc::now().to_rfc3339()),
                );

                if let Some(schema) = definition.domain_schema.as_deref() {
                    self.check_schema(
                        schema,
                        ValidationTier::Domain,
                        &Value::Object(record.clone()),
                        collaborators,
                    )
                    .await?;
                }

                // A supplied id means upsert discipline: an existing record
                // with that id is updated, not duplicated.
                let stored = if id_supplied {
                    let mut mutation = Mutation::default();
                    for (field, value) in &record {
                        mutation = mutation.and_set(field.clone(), value.clone());
                    }
                    collaborators
                        .store
                        .update(
                            collection,
                            &Filter::by(id_field.clone(), json!(record_id)),
                            mutation,
                            UpdateOptions::upsert(),
                        )
                        .await
                } else {
                    collaborators.store.insert(collection, record).await
                };
                stored.map_err(|err| WorkflowError::Persistence(err.to_string()))
            }
            PersistSpec::Update {
                collection,
                id_field,
                owner_field,
            } => {
                let filter = Filter::by(id_field.clone(), json!(record_id));
                let existing = collaborators
                    .store
                    .find_one(collection, &filter)
                    .await
                    .map_err(|err| WorkflowError::Persistence(err.to_string()))?
                    .ok_or_else(|| {
                        WorkflowError::NotFound(format!("{collection}/{record_id}"))
                    })?;

                if let Some(owner_field) = owner_field.as_deref() {
                    let owner = existing.get(owner_field).cloned().unwrap_or(Value::Null);
                    let claimant = input.get(owner_field).cloned().unwrap_or(Value::Null);
                    if owner != claimant {
                        return Err(WorkflowError::Unauthorized(format!(
                            "{owner_field} mismatch for {collection}/{record_id}"
                        )));
                    }
                }

                let mut mutation = Mutation::set(
                    "updatedAt".to_string(),
                    json!(chrono::Utc::now().to_rfc3339()),
                );
                let mut merged = existing.clone();
                if let Some(fields) = input.as_object() {
                    for (field, value) in fields {
                        if field == id_field {
                            continue;
                        }
                        mutation = mutation.and_set(field.clone(), value.clone());
                        merged.insert(field.clone(), value.clone());
                    }
                }

                if let Some(schema) = definition.domain_schema.as_deref() {
                    self.check_schema(
                        schema,
                        ValidationTier::Domain,
                        &Value::Object(merged),
                        collaborators,
                    )
                    .await?;
                }

                collaborators
                    .store
                    .update(collection, &filter, mutation, UpdateOptions::default())
                    .await
                    .map_err(|err| WorkflowError::Persistence(err.to_string()))
            }
        }
    }

    async fn call_ledger(
        &self,
        call: &LedgerCallSpec,
        input: &Value,
        record_id: &str,
        record: &Document,
        collaborators: &Collaborators,
    ) -> WorkflowResult<String> {
        let params: Vec<Value> = call
            .params
            .iter()
            .map(|source| match source {
                ParamSource::DerivedId => json!(record_id),
                ParamSource::InputField(path) => {
                    lookup_path(input, path).cloned().unwrap_or(Value::Null)
                }
                ParamSource::Record => Value::Object(record.clone()),
                ParamSource::PasswordHash(field) => {
                    let raw = input
                        .get(field.as_str())
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    json!(hex::encode(Sha256::digest(raw.as_bytes())))
                }
                ParamSource::Constant(value) => value.clone(),
            })
            .collect();

        let receipt = collaborators.ledger.submit(&call.method, &params).await;
        if !receipt.success {
            let message = receipt
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            let mut details = AuditDetails::failed(&message).with_extra("method", json!(call.method));
            if let Some(ref transaction_id) = receipt.transaction_id {
                details = details.with_transaction_id(transaction_id.clone());
            }
            collaborators
                .compliance
                .audit_only(AuditAction::BlockchainSubmission, details)
                .await;
            return Err(WorkflowError::Ledger {
                message,
                transaction_id: receipt.transaction_id,
            });
        }

        let transaction_id = receipt.transaction_id.unwrap_or_default();
        collaborators
            .compliance
            .audit_only(
                AuditAction::BlockchainSubmission,
                AuditDetails::success()
                    .with_transaction_id(transaction_id.clone())
                    .with_extra("method", json!(call.method)),
            )
            .await;
        Ok(transaction_id)
    }

    async fn apply_aggregate(
        &self,
        aggregate: &AggregateSpec,
        input: &Value,
        outputs: &mut Map<String, Value>,
        collaborators: &Collaborators,
    ) {
        let Some(key) = input.get(aggregate.key_field.as_str()).and_then(Value::as_str) else {
            tracing::warn!(
                collection = %aggregate.collection,
                key_field = %aggregate.key_field,
                "aggregate key missing from input, skipping"
            );
            return;
        };
        let amount = match reward_amount(&aggregate.reward, input) {
            Some(amount) => amount,
            None => {
                tracing::warn!(
                    collection = %aggregate.collection,
                    "reward field missing or non-numeric, skipping aggregate"
                );
                return;
            }
        };

        let result = collaborators
            .store
            .increment(
                &aggregate.collection,
                &Filter::by(aggregate.key_field.clone(), json!(key)),
                &aggregate.score_field,
                amount,
                UpdateOptions::upsert(),
            )
            .await;
        match result {
            Ok(record) => {
                if let Some((output_key, binding)) = &aggregate.output {
                    let value = match binding {
                        AggregateOutput::Amount => json!(amount),
                        AggregateOutput::Total => record
                            .get(aggregate.score_field.as_str())
                            .cloned()
                            .unwrap_or(Value::Null),
                    };
                    outputs.insert(output_key.clone(), value);
                }
            }
            // Best-effort: an aggregate failure never unwinds the invocation.
            Err(err) => {
                tracing::warn!(
                    collection = %aggregate.collection,
                    key = key,
                    error = %err,
                    "aggregate update failed"
                );
            }
        }
    }
}

struct ResolvedActor {
    address: ActorAddress,
    soulbound_id: Option<String>,
}

fn ledger_error(err: opflow_ledger::LedgerError) -> WorkflowError {
    WorkflowError::Ledger {
        message: err.to_string(),
        transaction_id: None,
    }
}

/// Deterministic reward computation; no randomness, floor on scaling.
fn reward_amount(formula: &RewardFormula, input: &Value) -> Option<i64> {
    match formula {
        RewardFormula::FromField(field) => {
            let value = lookup_path(input, field)?;
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|v| v.floor() as i64))
        }
        RewardFormula::ScaledFloor { field, factor } => {
            let value = lookup_path(input, field)?.as_f64()?;
            Some((value * factor).floor() as i64)
        }
    }
}

/// Resolve a dotted path like `quest.reward` into the payload.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

/// Map a compliance failure onto the workflow error taxonomy.
fn compliance_error(err: ComplianceError) -> WorkflowError {
    match err {
        ComplianceError::InvalidEvent(message) => WorkflowError::InvalidComplianceEvent(message),
        ComplianceError::Ledger {
            message,
            transaction_id,
        } => WorkflowError::Ledger {
            message,
            transaction_id,
        },
        ComplianceError::Backend(message) => WorkflowError::Persistence(message),
    }
}
