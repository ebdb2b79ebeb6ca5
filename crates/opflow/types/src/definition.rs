//! Workflow definitions: the declarative blueprint the executor runs.
//!
//! A definition names a workflow, binds it to an input schema, and declares
//! an ordered effect pipeline: persist the primary record, optionally call
//! the external ledger, apply aggregate updates, and record the compliance
//! event. Definitions are immutable once registered; to change one, register
//! a replacement at boot.

use crate::{EventType, ModuleTag, WorkflowError};
use serde_json::{Map, Value};

// ── Identifiers ──────────────────────────────────────────────────────

/// Name of a workflow, e.g. `voucher-create`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkflowName(pub String);

impl WorkflowName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Step and effect specs ────────────────────────────────────────────

/// The step kinds a workflow pipeline is composed of, in declared order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    Validate,
    Persist,
    ExternalCall,
    AggregateUpdate,
    AuditLog,
}

/// Which input field names the acting identity for compliance purposes.
#[derive(Clone, Debug)]
pub enum ActorSpec {
    /// The input carries the actor's address in this field.
    Field(String),
    /// The workflow acts for a soulbound subject; compliance events use the
    /// system (all-zero) address and the soulbound id travels in context.
    System,
}

/// Minimum reputation the resolved actor must hold, a workflow-declared
/// constant rather than a shared policy.
#[derive(Clone, Copy, Debug)]
pub struct ReputationGate {
    pub minimum: u64,
}

/// How the primary domain record is written.
#[derive(Clone, Debug)]
pub enum PersistSpec {
    /// Insert (or upsert, when the input supplies the id) a new record.
    Create {
        collection: String,
        /// Field carrying the primary id on both input and record.
        id_field: String,
        /// Workflow tag prepended to generated ids, e.g. `voucher`.
        id_prefix: Option<String>,
        /// Initial status stamped onto the record.
        status: Option<String>,
        /// Input fields never copied into the stored record (secrets).
        exclude_fields: Vec<String>,
        /// Defaulted record fields, e.g. a baseline reputation score.
        defaults: Vec<(String, Value)>,
    },
    /// Mutate an existing record; the input must carry its id.
    Update {
        collection: String,
        id_field: String,
        /// Record field that must equal the acting input field of the same
        /// name, or the caller is not entitled to the mutation.
        owner_field: Option<String>,
    },
}

impl PersistSpec {
    pub fn collection(&self) -> &str {
        match self {
            Self::Create { collection, .. } | Self::Update { collection, .. } => collection,
        }
    }

    pub fn id_field(&self) -> &str {
        match self {
            Self::Create { id_field, .. } | Self::Update { id_field, .. } => id_field,
        }
    }
}

/// Where one ledger-call parameter comes from.
#[derive(Clone, Debug)]
pub enum ParamSource {
    /// The primary record id derived for this invocation.
    DerivedId,
    /// A dotted path into the input payload.
    InputField(String),
    /// The full persisted record as JSON metadata.
    Record,
    /// SHA-256 hex digest of the named input field (never the raw value).
    PasswordHash(String),
    Constant(Value),
}

/// One external ledger call, at most one per workflow.
#[derive(Clone, Debug)]
pub struct LedgerCallSpec {
    pub method: String,
    pub params: Vec<ParamSource>,
}

/// Deterministic reward computation for an aggregate update.
#[derive(Clone, Debug)]
pub enum RewardFormula {
    /// Take the integer value at this dotted input path.
    FromField(String),
    /// `floor(input[field] × factor)`.
    ScaledFloor { field: String, factor: f64 },
}

/// Which value an aggregate update contributes to the outputs.
#[derive(Clone, Copy, Debug)]
pub enum AggregateOutput {
    /// The amount applied by this invocation.
    Amount,
    /// The aggregate total after the increment.
    Total,
}

/// One increment-or-create-at-zero aggregate mutation.
#[derive(Clone, Debug)]
pub struct AggregateSpec {
    pub collection: String,
    /// Input field whose value keys the aggregate record.
    pub key_field: String,
    /// Numeric record field receiving the increment.
    pub score_field: String,
    pub reward: RewardFormula,
    /// Optional output binding: key plus which value to expose.
    pub output: Option<(String, AggregateOutput)>,
}

// ── Workflow definition ──────────────────────────────────────────────

/// A named, schema-validated workflow with an ordered effect pipeline.
#[derive(Clone, Debug)]
pub struct WorkflowDefinition {
    pub name: WorkflowName,
    pub description: String,
    pub module: ModuleTag,
    /// Event type recorded on the success path.
    pub event_type: EventType,
    pub actor: ActorSpec,
    /// Input field carrying a soulbound id to verify against the ledger.
    pub identity_field: Option<String>,
    pub reputation_gate: Option<ReputationGate>,
    /// Request-level schema name (critical; registered at boot).
    pub input_schema: String,
    /// Optional entity-level schema run against the record to persist.
    pub domain_schema: Option<String>,
    pub persist: PersistSpec,
    pub ledger_call: Option<LedgerCallSpec>,
    /// Applied in declared order; not transactional with persist/ledger.
    pub aggregates: Vec<AggregateSpec>,
    /// Output key carrying the primary record id, e.g. `voucherId`.
    pub id_output_key: String,
    /// Constant outputs, e.g. `("status", "created")`.
    pub extra_outputs: Vec<(String, Value)>,
    steps: Vec<StepKind>,
}

impl WorkflowDefinition {
    pub fn new(
        name: impl Into<String>,
        module: ModuleTag,
        event_type: EventType,
        actor: ActorSpec,
        input_schema: impl Into<String>,
        persist: PersistSpec,
        id_output_key: impl Into<String>,
    ) -> Self {
        let mut def = Self {
            name: WorkflowName::new(name),
            description: String::new(),
            module,
            event_type,
            actor,
            identity_field: None,
            reputation_gate: None,
            input_schema: input_schema.into(),
            domain_schema: None,
            persist,
            ledger_call: None,
            aggregates: Vec::new(),
            id_output_key: id_output_key.into(),
            extra_outputs: Vec::new(),
            steps: Vec::new(),
        };
        def.recompute_steps();
        def
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_identity_check(mut self, field: impl Into<String>) -> Self {
        self.identity_field = Some(field.into());
        self
    }

    pub fn with_reputation_gate(mut self, minimum: u64) -> Self {
        self.reputation_gate = Some(ReputationGate { minimum });
        self
    }

    pub fn with_domain_schema(mut self, schema: impl Into<String>) -> Self {
        self.domain_schema = Some(schema.into());
        self
    }

    pub fn with_ledger_call(mut self, call: LedgerCallSpec) -> Self {
        self.ledger_call = Some(call);
        self.recompute_steps();
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateSpec) -> Self {
        self.aggregates.push(aggregate);
        self.recompute_steps();
        self
    }

    pub fn with_extra_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_outputs.push((key.into(), value));
        self
    }

    /// The declared step pipeline, in execution order.
    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    fn recompute_steps(&mut self) {
        let mut steps = vec![StepKind::Validate, StepKind::Persist];
        if self.ledger_call.is_some() {
            steps.push(StepKind::ExternalCall);
        }
        steps.extend(self.aggregates.iter().map(|_| StepKind::AggregateUpdate));
        steps.push(StepKind::AuditLog);
        self.steps = steps;
    }
}

// ── Invocation surface ───────────────────────────────────────────────

/// A successful execution.
#[derive(Clone, Debug)]
pub struct WorkflowOutcome {
    pub outputs: Map<String, Value>,
    pub success: bool,
}

/// The single invocation operation consumed by controllers.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct WorkflowRequest {
    pub workflow: String,
    pub input: Value,
}

/// Structured response handed back to controllers.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(untagged)]
pub enum WorkflowResponse {
    Success {
        success: bool,
        outputs: Map<String, Value>,
    },
    Failure {
        success: bool,
        #[serde(rename = "errorKind")]
        error_kind: &'static str,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl From<WorkflowOutcome> for WorkflowResponse {
    fn from(outcome: WorkflowOutcome) -> Self {
        Self::Success {
            success: true,
            outputs: outcome.outputs,
        }
    }
}

impl From<&WorkflowError> for WorkflowResponse {
    fn from(error: &WorkflowError) -> Self {
        let details = match error {
            WorkflowError::Validation { violations, .. } => {
                serde_json::to_value(violations).ok()
            }
            _ => None,
        };
        Self::Failure {
            success: false,
            error_kind: error.kind(),
            message: error.to_string(),
            details,
        }
    }
}
