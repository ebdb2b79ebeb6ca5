//! The built-in workflow catalog and its schemas.
//!
//! Each workflow binds an input schema (critical: the process does not come
//! up without it), an effect pipeline, and a compliance event type. Two
//! record-level schemas guard the persisted voucher and post shapes and are
//! non-critical.
//!
//! Workflows acting for a soulbound subject (donation, quest, voucher)
//! verify the subject against the ledger and record compliance events under
//! the system actor address, with the soulbound id in context.

use crate::{Collaborators, WorkflowExecutor, WorkflowRegistry};
use opflow_compliance::ComplianceLog;
use opflow_ledger::{InMemoryLedger, LedgerAdapter};
use opflow_schema::{SchemaError, SchemaRegistry};
use opflow_store::{InMemoryRecordStore, RecordStore};
use opflow_types::{
    ActorSpec, AggregateOutput, AggregateSpec, EventType, LedgerCallSpec, ModuleTag, ParamSource,
    PersistSpec, RewardFormula, WorkflowDefinition,
};
use serde_json::{json, Value};
use std::sync::Arc;

const ADDRESS_PATTERN: &str = "^(0x)?[0-9a-fA-F]{40}$";

/// All built-in workflow definitions, registered under their names.
pub fn catalog() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry.register(computing_donation());
    registry.register(pulse_quest());
    registry.register(voucher_create());
    registry.register(feed_post());
    registry.register(feed_update_post());
    registry.register(market_create());
    registry.register(casino_create_game());
    registry.register(ritual_initiate());
    registry.register(identity_register());
    registry
}

/// Compile the catalog's schemas. Input schemas are critical; the two
/// record-level schemas degrade to always-valid if they fail to compile.
pub fn schemas() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new().with_critical(
        input_schemas().iter().map(|(name, _)| name.to_string()),
    );
    for (name, schema) in input_schemas() {
        registry.load(name, &schema)?;
    }
    for (name, schema) in record_schemas() {
        registry.load(name, &schema)?;
    }
    Ok(registry)
}

/// An executor preloaded with the built-in catalog and its schemas.
pub fn executor() -> Result<WorkflowExecutor, SchemaError> {
    Ok(WorkflowExecutor::new(catalog(), schemas()?))
}

/// Collaborators backed entirely by the in-memory adapters, for tests and
/// disconnected operation.
pub fn in_memory_collaborators() -> Collaborators {
    in_memory_collaborators_with(Arc::new(InMemoryLedger::new()))
}

/// In-memory collaborators around a caller-supplied ledger, so the caller
/// can keep a handle for forcing failures or inspecting submissions.
pub fn in_memory_collaborators_with(ledger: Arc<dyn LedgerAdapter>) -> Collaborators {
    let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
    let compliance = Arc::new(ComplianceLog::new(store.clone(), ledger.clone()));
    Collaborators::new(store, ledger, compliance)
}

// ── Definitions ──────────────────────────────────────────────────────

fn computing_donation() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "computing-donation",
        ModuleTag::Oracle,
        EventType::DataSubmitted,
        ActorSpec::System,
        "computing-donation.input",
        PersistSpec::Create {
            collection: "donations".into(),
            id_field: "donationId".into(),
            id_prefix: Some("donation".into()),
            status: None,
            exclude_fields: vec![],
            defaults: vec![],
        },
        "donationId",
    )
    .with_description("Donate compute resources; pulse grows by floor(amount x 10)")
    .with_identity_check("sid")
    .with_aggregate(AggregateSpec {
        collection: "pulse".into(),
        key_field: "sid".into(),
        score_field: "pulseScore".into(),
        reward: RewardFormula::ScaledFloor {
            field: "resource.amount".into(),
            factor: 10.0,
        },
        output: Some(("pulseReward".into(), AggregateOutput::Amount)),
    })
}

fn pulse_quest() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "pulse-quest",
        ModuleTag::Oracle,
        EventType::DataValidated,
        ActorSpec::System,
        "pulse-quest.input",
        PersistSpec::Create {
            collection: "quests".into(),
            id_field: "questId".into(),
            id_prefix: Some("quest".into()),
            status: None,
            exclude_fields: vec![],
            defaults: vec![],
        },
        "questId",
    )
    .with_description("Complete a pulse quest and bank its declared reward")
    .with_identity_check("sid")
    .with_aggregate(AggregateSpec {
        collection: "pulse".into(),
        key_field: "sid".into(),
        score_field: "pulseScore".into(),
        reward: RewardFormula::FromField("quest.reward".into()),
        output: Some(("pulseScore".into(), AggregateOutput::Total)),
    })
}

fn voucher_create() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "voucher-create",
        ModuleTag::Market,
        EventType::OfferCreated,
        ActorSpec::System,
        "voucher-create.input",
        PersistSpec::Create {
            collection: "vouchers".into(),
            id_field: "voucherId".into(),
            id_prefix: Some("voucher".into()),
            status: Some("created".into()),
            exclude_fields: vec!["password".into()],
            defaults: vec![],
        },
        "voucherId",
    )
    .with_description("Create a redeemable voucher; only the password hash leaves the process")
    .with_identity_check("creatorSID")
    .with_domain_schema("voucher.record")
    .with_ledger_call(LedgerCallSpec {
        method: "createVoucher".into(),
        params: vec![
            ParamSource::DerivedId,
            ParamSource::InputField("creatorSID".into()),
            ParamSource::PasswordHash("password".into()),
            ParamSource::InputField("value.amount".into()),
        ],
    })
    .with_extra_output("status", json!("created"))
}

fn feed_post() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "feed-post",
        ModuleTag::Feed,
        EventType::PostPublished,
        ActorSpec::Field("author".into()),
        "feed-post.input",
        PersistSpec::Create {
            collection: "posts".into(),
            id_field: "postId".into(),
            id_prefix: Some("post".into()),
            status: None,
            exclude_fields: vec![],
            defaults: vec![],
        },
        "postId",
    )
    .with_description("Publish a feed post and register it on the ledger")
    .with_domain_schema("post.record")
    .with_ledger_call(LedgerCallSpec {
        method: "registerPost".into(),
        params: vec![
            ParamSource::DerivedId,
            ParamSource::InputField("author".into()),
            ParamSource::Record,
        ],
    })
}

fn feed_update_post() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "feed-update-post",
        ModuleTag::Feed,
        EventType::PostUpdated,
        ActorSpec::Field("author".into()),
        "feed-update-post.input",
        PersistSpec::Update {
            collection: "posts".into(),
            id_field: "postId".into(),
            owner_field: Some("author".into()),
        },
        "postId",
    )
    .with_description("Edit an existing post; only its author may")
    .with_domain_schema("post.record")
    .with_ledger_call(LedgerCallSpec {
        method: "updatePost".into(),
        params: vec![ParamSource::DerivedId, ParamSource::Record],
    })
}

fn market_create() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "market-create",
        ModuleTag::Market,
        EventType::MarketCreated,
        ActorSpec::Field("creator".into()),
        "market-create.input",
        PersistSpec::Create {
            collection: "markets".into(),
            id_field: "marketId".into(),
            id_prefix: Some("market".into()),
            status: Some("open".into()),
            exclude_fields: vec![],
            defaults: vec![],
        },
        "marketId",
    )
    .with_description("Open a marketplace listing; requires standing reputation")
    .with_reputation_gate(10)
    .with_ledger_call(LedgerCallSpec {
        method: "registerMarket".into(),
        params: vec![
            ParamSource::DerivedId,
            ParamSource::InputField("creator".into()),
            ParamSource::Record,
        ],
    })
}

fn casino_create_game() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "casino-create-game",
        ModuleTag::Casino,
        EventType::GameCreated,
        ActorSpec::Field("host".into()),
        "casino-create-game.input",
        PersistSpec::Create {
            collection: "games".into(),
            id_field: "gameId".into(),
            id_prefix: Some("game".into()),
            status: Some("open".into()),
            exclude_fields: vec![],
            defaults: vec![],
        },
        "gameId",
    )
    .with_description("Host a casino game")
    .with_ledger_call(LedgerCallSpec {
        method: "createGame".into(),
        params: vec![
            ParamSource::DerivedId,
            ParamSource::InputField("host".into()),
            ParamSource::InputField("gameType".into()),
        ],
    })
}

fn ritual_initiate() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "ritual-initiate",
        ModuleTag::Ritual,
        EventType::RitualInitiated,
        ActorSpec::Field("initiator".into()),
        "ritual-initiate.input",
        PersistSpec::Create {
            collection: "rituals".into(),
            id_field: "ritualId".into(),
            id_prefix: Some("ritual".into()),
            status: Some("initiated".into()),
            exclude_fields: vec![],
            defaults: vec![],
        },
        "ritualId",
    )
    .with_description("Initiate a community ritual")
    .with_ledger_call(LedgerCallSpec {
        method: "initiateRitual".into(),
        params: vec![
            ParamSource::DerivedId,
            ParamSource::InputField("initiator".into()),
            ParamSource::InputField("ritualType".into()),
        ],
    })
}

fn identity_register() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "identity-register",
        ModuleTag::Identity,
        EventType::UserRegistered,
        ActorSpec::Field("address".into()),
        "identity-register.input",
        PersistSpec::Create {
            collection: "agents".into(),
            id_field: "agentId".into(),
            id_prefix: Some("agent".into()),
            status: None,
            exclude_fields: vec![],
            defaults: vec![("reputationScore".into(), json!(50))],
        },
        "agentId",
    )
    .with_description("Register an agent identity with baseline reputation")
}

// ── Schemas ──────────────────────────────────────────────────────────

fn input_schemas() -> Vec<(&'static str, Value)> {
    vec![
        (
            "computing-donation.input",
            json!({
                "$id": "opflow://schemas/computing-donation.input",
                "type": "object",
                "required": ["sid", "resource"],
                "properties": {
                    "sid": { "type": "string", "minLength": 1 },
                    "credentialId": { "type": "string" },
                    "donationId": { "type": "string" },
                    "resource": {
                        "type": "object",
                        "required": ["amount"],
                        "properties": {
                            "amount": { "type": "number", "minimum": 0 },
                            "type": { "enum": ["cpu", "gpu", "storage"] }
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }),
        ),
        (
            "pulse-quest.input",
            json!({
                "$id": "opflow://schemas/pulse-quest.input",
                "type": "object",
                "required": ["sid", "quest"],
                "properties": {
                    "sid": { "type": "string", "minLength": 1 },
                    "credentialId": { "type": "string" },
                    "questId": { "type": "string" },
                    "quest": {
                        "type": "object",
                        "required": ["type", "reward"],
                        "properties": {
                            "type": { "enum": ["daily", "weekly", "seasonal"] },
                            "reward": { "type": "integer", "minimum": 0 }
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }),
        ),
        (
            "voucher-create.input",
            json!({
                "$id": "opflow://schemas/voucher-create.input",
                "type": "object",
                "required": ["creatorSID", "value", "password"],
                "properties": {
                    "creatorSID": { "type": "string", "minLength": 1 },
                    "credentialId": { "type": "string" },
                    "voucherId": { "type": "string" },
                    "password": { "type": "string", "minLength": 4 },
                    "value": {
                        "type": "object",
                        "required": ["amount", "assetType"],
                        "properties": {
                            "amount": { "type": ["string", "number"] },
                            "assetType": { "enum": ["ETH", "USDC", "PULSE"] }
                        },
                        "additionalProperties": false
                    }
                },
                "additionalProperties": false
            }),
        ),
        (
            "feed-post.input",
            json!({
                "$id": "opflow://schemas/feed-post.input",
                "type": "object",
                "required": ["author", "content"],
                "properties": {
                    "author": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "postId": { "type": "string" },
                    "title": { "type": "string" },
                    "content": { "type": "string", "minLength": 1 },
                    "tags": { "type": "array", "items": { "type": "string" } }
                },
                "additionalProperties": false
            }),
        ),
        (
            "feed-update-post.input",
            json!({
                "$id": "opflow://schemas/feed-update-post.input",
                "type": "object",
                "required": ["postId", "author"],
                "properties": {
                    "postId": { "type": "string", "minLength": 1 },
                    "author": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "title": { "type": "string" },
                    "content": { "type": "string", "minLength": 1 }
                },
                "additionalProperties": false
            }),
        ),
        (
            "market-create.input",
            json!({
                "$id": "opflow://schemas/market-create.input",
                "type": "object",
                "required": ["creator", "title", "price"],
                "properties": {
                    "creator": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "marketId": { "type": "string" },
                    "title": { "type": "string", "minLength": 1 },
                    "price": { "type": "number", "minimum": 0 },
                    "category": { "type": "string" }
                },
                "additionalProperties": false
            }),
        ),
        (
            "casino-create-game.input",
            json!({
                "$id": "opflow://schemas/casino-create-game.input",
                "type": "object",
                "required": ["host", "gameType", "stake"],
                "properties": {
                    "host": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "gameId": { "type": "string" },
                    "gameType": { "enum": ["dice", "cards", "wheel"] },
                    "stake": { "type": "number", "minimum": 0 }
                },
                "additionalProperties": false
            }),
        ),
        (
            "ritual-initiate.input",
            json!({
                "$id": "opflow://schemas/ritual-initiate.input",
                "type": "object",
                "required": ["initiator", "ritualType"],
                "properties": {
                    "initiator": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "ritualId": { "type": "string" },
                    "ritualType": { "type": "string", "minLength": 1 },
                    "participants": { "type": "array", "items": { "type": "string" } }
                },
                "additionalProperties": false
            }),
        ),
        (
            "identity-register.input",
            json!({
                "$id": "opflow://schemas/identity-register.input",
                "type": "object",
                "required": ["address", "name"],
                "properties": {
                    "address": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "agentId": { "type": "string" },
                    "name": { "type": "string", "minLength": 1 },
                    "bio": { "type": "string" }
                },
                "additionalProperties": false
            }),
        ),
    ]
}

fn record_schemas() -> Vec<(&'static str, Value)> {
    vec![
        (
            "voucher.record",
            json!({
                "$id": "opflow://schemas/voucher.record",
                "type": "object",
                "required": ["voucherId", "creatorSID", "value", "status", "createdAt"],
                "properties": {
                    "voucherId": { "type": "string" },
                    "creatorSID": { "type": "string" },
                    "value": { "type": "object" },
                    "status": { "enum": ["created", "verified", "redeemed"] },
                    "createdAt": { "type": "string" },
                    "password": false
                }
            }),
        ),
        (
            "post.record",
            json!({
                "$id": "opflow://schemas/post.record",
                "type": "object",
                "required": ["postId", "author", "content"],
                "properties": {
                    "postId": { "type": "string" },
                    "author": { "type": "string", "pattern": ADDRESS_PATTERN },
                    "content": { "type": "string", "minLength": 1 }
                }
            }),
        ),
    ]
}
