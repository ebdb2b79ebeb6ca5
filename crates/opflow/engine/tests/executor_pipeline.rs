//! End-to-end pipeline tests over the built-in catalog, running against the
//! in-memory store and ledger adapters.

use opflow_compliance::ComplianceLog;
use opflow_engine::{builtin, Collaborators, WorkflowExecutor};
use opflow_ledger::InMemoryLedger;
use opflow_store::{Filter, InMemoryRecordStore, RecordStore};
use opflow_types::{WorkflowError, WorkflowRequest};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

struct Harness {
    executor: WorkflowExecutor,
    store: Arc<InMemoryRecordStore>,
    ledger: Arc<InMemoryLedger>,
    collaborators: Collaborators,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryRecordStore::new());
    let ledger = Arc::new(InMemoryLedger::new());
    let compliance = Arc::new(ComplianceLog::new(store.clone(), ledger.clone()));
    let collaborators = Collaborators::new(store.clone(), ledger.clone(), compliance);
    Harness {
        executor: builtin::executor().expect("builtin schemas compile"),
        store,
        ledger,
        collaborators,
    }
}

async fn audits(store: &InMemoryRecordStore, action: &str) -> Vec<serde_json::Map<String, Value>> {
    store
        .find_all("audit_logs", &Filter::by("action", json!(action)))
        .await
        .unwrap()
}

#[tokio::test]
async fn donation_rewards_pulse_at_ten_per_unit() {
    let h = harness();

    let outcome = h
        .executor
        .execute(
            "computing-donation",
            &json!({"sid": "sb-1", "resource": {"amount": 5, "type": "gpu"}}),
            &h.collaborators,
        )
        .await
        .unwrap();

    assert!(outcome.success);
    let donation_id = outcome.outputs["donationId"].as_str().unwrap();
    assert!(donation_id.starts_with("donation-"));
    assert_eq!(outcome.outputs["pulseReward"], json!(50));

    let pulse = h
        .store
        .find_one("pulse", &Filter::by("sid", json!("sb-1")))
        .await
        .unwrap()
        .expect("pulse aggregate created");
    assert_eq!(pulse["pulseScore"], json!(50));

    // Exactly one compliance event, recorded under the system actor with
    // the soulbound id in context.
    let events = h
        .store
        .find_all("compliance_events", &Filter::by("eventType", json!("data_submitted")))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0]["userId"],
        json!("0x0000000000000000000000000000000000000000")
    );
    assert_eq!(events[0]["context"]["soulboundId"], json!("sb-1"));
    assert!(audits(&h.store, "error_handling").await.is_empty());
}

#[tokio::test]
async fn malformed_input_runs_no_effects() {
    let h = harness();

    let err = h
        .executor
        .execute("computing-donation", &json!({"sid": "sb-1"}), &h.collaborators)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation { .. }));

    assert_eq!(h.store.count("donations"), 0);
    assert_eq!(h.store.count("pulse"), 0);
    assert_eq!(h.store.count("compliance_events"), 0);
    assert_eq!(h.ledger.submission_count(), 0);

    assert_eq!(audits(&h.store, "event_validation").await.len(), 1);
    assert_eq!(audits(&h.store, "error_handling").await.len(), 1);
}

#[tokio::test]
async fn voucher_survives_ledger_rejection() {
    let h = harness();
    h.ledger.fail_submissions("chain unavailable");

    let err = h
        .executor
        .execute(
            "voucher-create",
            &json!({"creatorSID": "sb-7", "password": "hunter22", "value": {"amount": "1.0", "assetType": "ETH"}}),
            &h.collaborators,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Ledger { .. }));

    // The persisted voucher is left in place, unconfirmed.
    let voucher = h
        .store
        .find_one("vouchers", &Filter::by("creatorSID", json!("sb-7")))
        .await
        .unwrap()
        .expect("voucher persisted despite ledger failure");
    assert_eq!(voucher["status"], json!("created"));
    assert!(voucher.get("password").is_none());

    let submissions = audits(&h.store, "blockchain_submission").await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["details"]["status"], json!("failed"));
    assert_eq!(audits(&h.store, "error_handling").await.len(), 1);
    assert_eq!(h.store.count("compliance_events"), 0);
}

#[tokio::test]
async fn voucher_creation_hashes_the_password_on_the_wire() {
    let h = harness();

    let outcome = h
        .executor
        .execute(
            "voucher-create",
            &json!({"creatorSID": "sb-2", "password": "hunter22", "value": {"amount": "1.0", "assetType": "ETH"}}),
            &h.collaborators,
        )
        .await
        .unwrap();

    let voucher_id = outcome.outputs["voucherId"].as_str().unwrap().to_string();
    assert_eq!(outcome.outputs["status"], json!("created"));
    assert_eq!(
        outcome.outputs["transactionId"],
        json!(format!("tx-createVoucher-{voucher_id}"))
    );

    let submitted = h
        .ledger
        .stored(&format!("createVoucher:{voucher_id}"))
        .expect("ledger received the call");
    let expected_hash = hex::encode(Sha256::digest(b"hunter22"));
    assert_eq!(submitted[2], json!(expected_hash));

    let voucher = h
        .store
        .find_one("vouchers", &Filter::by("voucherId", json!(voucher_id)))
        .await
        .unwrap()
        .unwrap();
    assert!(voucher.get("password").is_none());
    assert_eq!(h.store.count("compliance_events"), 1);
}

#[tokio::test]
async fn concurrent_quests_sum_their_rewards() {
    let h = harness();
    let executor = Arc::new(h.executor);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let executor = executor.clone();
        let collaborators = h.collaborators.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(
                    "pulse-quest",
                    &json!({"sid": "sb-5", "quest": {"type": "daily", "reward": 5}}),
                    &collaborators,
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let pulse = h
        .store
        .find_one("pulse", &Filter::by("sid", json!("sb-5")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pulse["pulseScore"], json!(50));
    assert_eq!(h.store.count("quests"), 10);
    assert_eq!(h.store.count("compliance_events"), 10);
}

#[tokio::test]
async fn updating_a_missing_post_is_not_found() {
    let h = harness();

    let err = h
        .executor
        .execute(
            "feed-update-post",
            &json!({"postId": "post-missing", "author": ALICE, "content": "edited"}),
            &h.collaborators,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
    assert_eq!(audits(&h.store, "error_handling").await.len(), 1);
}

#[tokio::test]
async fn only_the_author_may_edit_a_post() {
    let h = harness();

    h.executor
        .execute(
            "feed-post",
            &json!({"postId": "post-1", "author": ALICE, "content": "original"}),
            &h.collaborators,
        )
        .await
        .unwrap();

    let err = h
        .executor
        .execute(
            "feed-update-post",
            &json!({"postId": "post-1", "author": BOB, "content": "hijacked"}),
            &h.collaborators,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));

    let post = h
        .store
        .find_one("posts", &Filter::by("postId", json!("post-1")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post["content"], json!("original"));
}

#[tokio::test]
async fn author_edit_goes_through() {
    let h = harness();

    h.executor
        .execute(
            "feed-post",
            &json!({"postId": "post-2", "author": ALICE, "content": "first draft"}),
            &h.collaborators,
        )
        .await
        .unwrap();
    let outcome = h
        .executor
        .execute(
            "feed-update-post",
            &json!({"postId": "post-2", "author": ALICE, "content": "final"}),
            &h.collaborators,
        )
        .await
        .unwrap();
    assert_eq!(outcome.outputs["postId"], json!("post-2"));

    let post = h
        .store
        .find_one("posts", &Filter::by("postId", json!("post-2")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post["content"], json!("final"));
    assert!(post.get("updatedAt").is_some());
}

#[tokio::test]
async fn market_creation_requires_reputation() {
    let h = harness();
    h.ledger.set_reputation(ALICE, 3);

    let err = h
        .executor
        .execute(
            "market-create",
            &json!({"creator": ALICE, "title": "gpu hours", "price": 10}),
            &h.collaborators,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));
    assert_eq!(h.store.count("markets"), 0);

    h.ledger.set_reputation(ALICE, 25);
    let outcome = h
        .executor
        .execute(
            "market-create",
            &json!({"creator": ALICE, "title": "gpu hours", "price": 10}),
            &h.collaborators,
        )
        .await
        .unwrap();
    assert!(outcome.outputs["marketId"].as_str().unwrap().starts_with("market-"));
    assert_eq!(h.store.count("markets"), 1);
}

#[tokio::test]
async fn denied_identity_is_unauthorized() {
    let h = harness();
    h.ledger.deny_identity("sb-bad");

    let err = h
        .executor
        .execute(
            "computing-donation",
            &json!({"sid": "sb-bad", "resource": {"amount": 2}}),
            &h.collaborators,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthorized(_)));
    assert_eq!(h.store.count("donations"), 0);
}

#[tokio::test]
async fn supplied_id_upserts_instead_of_duplicating() {
    let h = harness();

    for content in ["v1", "v2"] {
        h.executor
            .execute(
                "feed-post",
                &json!({"postId": "post-pinned", "author": ALICE, "content": content}),
                &h.collaborators,
            )
            .await
            .unwrap();
    }

    let posts = h
        .store
        .find_all("posts", &Filter::by("postId", json!("post-pinned")))
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["content"], json!("v2"));
}

#[tokio::test]
async fn registration_defaults_baseline_reputation() {
    let h = harness();

    let outcome = h
        .executor
        .execute(
            "identity-register",
            &json!({"address": ALICE, "name": "alice"}),
            &h.collaborators,
        )
        .await
        .unwrap();

    let agent_id = outcome.outputs["agentId"].as_str().unwrap();
    let agent = h
        .store
        .find_one("agents", &Filter::by("agentId", json!(agent_id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(agent["reputationScore"], json!(50));
    assert_eq!(agent["name"], json!("alice"));
}

#[tokio::test]
async fn handle_shapes_success_and_failure_responses() {
    let h = harness();

    let response = h
        .executor
        .handle(
            WorkflowRequest {
                workflow: "ritual-initiate".into(),
                input: json!({"initiator": ALICE, "ritualType": "harvest"}),
            },
            &h.collaborators,
        )
        .await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["success"], json!(true));
    assert!(value["outputs"]["ritualId"].as_str().unwrap().starts_with("ritual-"));
    assert!(value["outputs"]["transactionId"].is_string());

    let response = h
        .executor
        .handle(
            WorkflowRequest {
                workflow: "ritual-initiate".into(),
                input: json!({"initiator": "nobody", "ritualType": "harvest"}),
            },
            &h.collaborators,
        )
        .await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["errorKind"], json!("validation_failure"));
    assert!(value["details"].is_array());

    let response = h
        .executor
        .handle(
            WorkflowRequest {
                workflow: "no-such-workflow".into(),
                input: json!({}),
            },
            &h.collaborators,
        )
        .await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["errorKind"], json!("unknown_workflow"));
}

#[tokio::test]
async fn casino_game_reaches_the_ledger() {
    let h = harness();

    let outcome = h
        .executor
        .execute(
            "casino-create-game",
            &json!({"host": ALICE, "gameType": "dice", "stake": 100}),
            &h.collaborators,
        )
        .await
        .unwrap();

    let game_id = outcome.outputs["gameId"].as_str().unwrap();
    let submitted = h
        .ledger
        .stored(&format!("createGame:{game_id}"))
        .expect("ledger received the call");
    assert_eq!(submitted[1], json!(ALICE));
    assert_eq!(submitted[2], json!("dice"));
}

#[tokio::test]
async fn every_failure_mirrors_exactly_one_audit() {
    let h = harness();

    // validation failure + not-found + ledger failure, one invocation each
    let _ = h
        .executor
        .execute("pulse-quest", &json!({"sid": "sb-9"}), &h.collaborators)
        .await;
    let _ = h
        .executor
        .execute(
            "feed-update-post",
            &json!({"postId": "post-x", "author": ALICE, "content": "y"}),
            &h.collaborators,
        )
        .await;
    h.ledger.fail_submissions("down");
    let _ = h
        .executor
        .execute(
            "ritual-initiate",
            &json!({"initiator": ALICE, "ritualType": "harvest"}),
            &h.collaborators,
        )
        .await;

    assert_eq!(audits(&h.store, "error_handling").await.len(), 3);
}
