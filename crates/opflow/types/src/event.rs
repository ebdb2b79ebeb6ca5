//! Compliance events and audit log entries.
//!
//! Two distinct trails:
//! - `ComplianceEvent`: a business-meaningful action, mirrored to the ledger.
//! - `AuditLogEntry`: an executor-internal outcome (validation failures,
//!   ledger submission results, error handling). Never forwarded externally.

use crate::ActorAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

/// Soulbound id recorded when the caller supplies none.
pub const DEFAULT_SOULBOUND_ID: &str = "default-soulbound-id";

// ── Compliance events ────────────────────────────────────────────────

/// The fixed set of business event types a compliance event may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PostPublished,
    CommentAdded,
    ReactionAdded,
    PostUpdated,
    MarketCreated,
    OfferCreated,
    OfferVerified,
    OfferPurchased,
    UserRegistered,
    ProfileUpdated,
    DataSubmitted,
    DataValidated,
    GameCreated,
    BetPlaced,
    RitualInitiated,
    ProposalSubmitted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostPublished => "post_published",
            Self::CommentAdded => "comment_added",
            Self::ReactionAdded => "reaction_added",
            Self::PostUpdated => "post_updated",
            Self::MarketCreated => "market_created",
            Self::OfferCreated => "offer_created",
            Self::OfferVerified => "offer_verified",
            Self::OfferPurchased => "offer_purchased",
            Self::UserRegistered => "user_registered",
            Self::ProfileUpdated => "profile_updated",
            Self::DataSubmitted => "data_submitted",
            Self::DataValidated => "data_validated",
            Self::GameCreated => "game_created",
            Self::BetPlaced => "bet_placed",
            Self::RitualInitiated => "ritual_initiated",
            Self::ProposalSubmitted => "proposal_submitted",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post_published" => Ok(Self::PostPublished),
            "comment_added" => Ok(Self::CommentAdded),
            "reaction_added" => Ok(Self::ReactionAdded),
            "post_updated" => Ok(Self::PostUpdated),
            "market_created" => Ok(Self::MarketCreated),
            "offer_created" => Ok(Self::OfferCreated),
            "offer_verified" => Ok(Self::OfferVerified),
            "offer_purchased" => Ok(Self::OfferPurchased),
            "user_registered" => Ok(Self::UserRegistered),
            "profile_updated" => Ok(Self::ProfileUpdated),
            "data_submitted" => Ok(Self::DataSubmitted),
            "data_validated" => Ok(Self::DataValidated),
            "game_created" => Ok(Self::GameCreated),
            "bet_placed" => Ok(Self::BetPlaced),
            "ritual_initiated" => Ok(Self::RitualInitiated),
            "proposal_submitted" => Ok(Self::ProposalSubmitted),
            other => Err(format!("invalid event type: {other}")),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed set of modules a compliance event may originate from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleTag {
    Feed,
    Market,
    Identity,
    Oracle,
    Casino,
    Ritual,
    Governance,
}

impl ModuleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Market => "market",
            Self::Identity => "identity",
            Self::Oracle => "oracle",
            Self::Casino => "casino",
            Self::Ritual => "ritual",
            Self::Governance => "governance",
        }
    }
}

impl FromStr for ModuleTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(Self::Feed),
            "market" => Ok(Self::Market),
            "identity" => Ok(Self::Identity),
            "oracle" => Ok(Self::Oracle),
            "casino" => Ok(Self::Casino),
            "ritual" => Ok(Self::Ritual),
            "governance" => Ok(Self::Governance),
            other => Err(format!("invalid or missing context module: {other}")),
        }
    }
}

impl std::fmt::Display for ModuleTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance context attached to every compliance event.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub soulbound_id: String,
    pub transaction_id: Option<String>,
    pub module: ModuleTag,
}

impl EventContext {
    pub fn new(module: ModuleTag) -> Self {
        Self {
            soulbound_id: DEFAULT_SOULBOUND_ID.to_string(),
            transaction_id: None,
            module,
        }
    }

    pub fn with_soulbound_id(mut self, soulbound_id: impl Into<String>) -> Self {
        self.soulbound_id = soulbound_id.into();
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

/// An append-only record of a business-meaningful action.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceEvent {
    pub id: String,
    pub event_type: EventType,
    pub user_id: ActorAddress,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub context: EventContext,
}

impl ComplianceEvent {
    pub fn new(
        event_type: EventType,
        user_id: ActorAddress,
        payload: Value,
        context: EventContext,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            user_id,
            payload,
            created_at: Utc::now(),
            context,
        }
    }
}

// ── Audit log ────────────────────────────────────────────────────────

/// Executor-internal audit action kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EventValidation,
    BlockchainSubmission,
    ErrorHandling,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventValidation => "event_validation",
            Self::BlockchainSubmission => "blockchain_submission",
            Self::ErrorHandling => "error_handling",
        }
    }
}

/// Outcome recorded in an audit entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failed,
}

/// Structured detail block of an audit entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl AuditDetails {
    pub fn success() -> Self {
        Self {
            status: AuditStatus::Success,
            error: None,
            transaction_id: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: AuditStatus::Failed,
            error: Some(error.into()),
            transaction_id: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// An append-only record of an executor-internal outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    pub details: AuditDetails,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, details: AuditDetails) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
            timestamp: Utc::now(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_str() {
        for raw in [
            "post_published",
            "market_created",
            "data_submitted",
            "ritual_initiated",
        ] {
            let parsed: EventType = raw.parse().unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!("voucher_burned".parse::<EventType>().is_err());
    }

    #[test]
    fn module_tag_parses_the_fixed_set_only() {
        assert_eq!("casino".parse::<ModuleTag>().unwrap(), ModuleTag::Casino);
        assert!("computing".parse::<ModuleTag>().is_err());
    }

    #[test]
    fn event_context_defaults_soulbound_id() {
        let ctx = EventContext::new(ModuleTag::Feed);
        assert_eq!(ctx.soulbound_id, DEFAULT_SOULBOUND_ID);
        assert!(ctx.transaction_id.is_none());
    }

    #[test]
    fn compliance_event_serializes_camel_case() {
        let event = ComplianceEvent::new(
            EventType::PostPublished,
            ActorAddress::system(),
            serde_json::json!({}),
            EventContext::new(ModuleTag::Feed),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "post_published");
        assert!(json["createdAt"].is_string());
        assert_eq!(json["context"]["module"], "feed");
    }
}
