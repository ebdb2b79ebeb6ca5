#![deny(unsafe_code)]
//! Self-contained demo: runs a handful of built-in workflows against the
//! in-memory store and ledger, including a forced ledger outage to show the
//! persisted-but-unconfirmed failure path. No external services required.

use opflow_engine::builtin;
use opflow_ledger::InMemoryLedger;
use opflow_types::WorkflowRequest;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ledger = Arc::new(InMemoryLedger::new());
    let collaborators = builtin::in_memory_collaborators_with(ledger.clone());
    let executor = builtin::executor()?;

    let requests = vec![
        WorkflowRequest {
            workflow: "identity-register".into(),
            input: json!({
                "address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "name": "alice",
            }),
        },
        WorkflowRequest {
            workflow: "computing-donation".into(),
            input: json!({"sid": "sb-demo", "resource": {"amount": 5, "type": "gpu"}}),
        },
        WorkflowRequest {
            workflow: "feed-post".into(),
            input: json!({
                "author": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "content": "hello opflow",
            }),
        },
        // Malformed on purpose: amount is required.
        WorkflowRequest {
            workflow: "computing-donation".into(),
            input: json!({"sid": "sb-demo"}),
        },
    ];

    for request in requests {
        let workflow = request.workflow.clone();
        let response = executor.handle(request, &collaborators).await;
        println!("{workflow}: {}", serde_json::to_string_pretty(&response)?);
    }

    // Take the ledger down and show that the voucher still persists.
    ledger.fail_submissions("chain unavailable");
    let response = executor
        .handle(
            WorkflowRequest {
                workflow: "voucher-create".into(),
                input: json!({
                    "creatorSID": "sb-demo",
                    "password": "hunter22",
                    "value": {"amount": "1.0", "assetType": "ETH"},
                }),
            },
            &collaborators,
        )
        .await;
    println!(
        "voucher-create (ledger down): {}",
        serde_json::to_string_pretty(&response)?
    );

    Ok(())
}
