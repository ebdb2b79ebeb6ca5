//! The opflow workflow executor.
//!
//! A workflow is a declarative pipeline: validate the input against its
//! schema, persist the primary record, optionally call the external ledger,
//! apply aggregate updates, and record one compliance event. The executor
//! runs registered [`opflow_types::WorkflowDefinition`]s against payloads
//! with explicit collaborators and typed partial-failure semantics.

#![deny(unsafe_code)]

pub mod builtin;
mod executor;
mod registry;

pub use executor::{Collaborators, WorkflowExecutor};
pub use registry::WorkflowRegistry;
