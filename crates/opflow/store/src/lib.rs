//! Opflow persistence abstractions.
//!
//! This crate defines the record-store contract the workflow executor writes
//! through:
//! - primary domain records (insert/upsert)
//! - derived aggregates (increment-or-create-at-zero)
//! - append-only compliance/audit collections
//!
//! Design stance:
//! - The store is an explicit, injected collaborator, never module state.
//! - The in-memory adapter is the deterministic reference; a transactional
//!   backend can implement the same traits for production.

#![deny(unsafe_code)]

mod error;
pub mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use traits::{Document, Filter, Mutation, RecordStore, UpdateOptions};
