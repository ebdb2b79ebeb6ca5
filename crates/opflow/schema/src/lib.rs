//! Registry of compiled JSON Schema validators.
//!
//! Schemas are loaded once at startup and compiled eagerly; `validate` is
//! read-only afterwards and safe to call from any number of concurrent
//! invocations. Registration is keyed by the schema's `$id` when it carries
//! one, otherwise by the name it was loaded under; loading the same key
//! twice is a warning and a no-op (first registration wins).
//!
//! A schema named in the registry's critical set must compile or startup
//! aborts. Any other schema that fails to compile degrades to an
//! always-valid validator with a warning, so one malformed optional schema
//! cannot take the whole catalog down. That fallback is load-bearing for
//! operators: it trades a startup failure for unvalidated traffic on that
//! one workflow, and the warning is the only signal.

#![deny(unsafe_code)]

use jsonschema::{error::ValidationErrorKind, Validator};
use opflow_types::SchemaViolation;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Schema registry errors. Only critical schemas produce one.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("critical schema {name:?} failed to compile: {reason}")]
    CriticalCompile { name: String, reason: String },
}

/// Outcome of validating a value against a named schema.
#[derive(Clone, Debug)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<SchemaViolation>,
}

impl ValidationReport {
    fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Compiled validators, keyed by registration name.
///
/// An entry holding `None` is the always-valid fallback left behind by a
/// non-critical compile failure.
pub struct SchemaRegistry {
    validators: HashMap<String, Option<Validator>>,
    registered_ids: HashSet<String>,
    critical: HashSet<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
            registered_ids: HashSet::new(),
            critical: HashSet::new(),
        }
    }

    /// Mark schema names whose compile failure must abort startup.
    pub fn with_critical<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical.extend(names.into_iter().map(Into::into));
        self
    }

    /// Compile and register one schema under `name`.
    pub fn load(&mut self, name: &str, schema: &Value) -> Result<(), SchemaError> {
        let key = schema
            .get("$id")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();
        if !self.registered_ids.insert(key.clone()) {
            tracing::warn!(schema = %key, "schema already registered, keeping first");
            return Ok(());
        }

        match jsonschema::validator_for(schema) {
            Ok(validator) => {
                self.validators.insert(name.to_string(), Some(validator));
                tracing::debug!(schema = name, id = %key, "schema compiled");
                Ok(())
            }
            Err(err) if self.critical.contains(name) => Err(SchemaError::CriticalCompile {
                name: name.to_string(),
                reason: err.to_string(),
            }),
            Err(err) => {
                tracing::warn!(schema = name, error = %err, "schema failed to compile, validator degraded to always-valid");
                self.validators.insert(name.to_string(), None);
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Validate `value` against the schema registered under `name`.
    ///
    /// An unregistered name validates as always-valid, matching the
    /// degraded-schema fallback.
    pub fn validate(&self, name: &str, value: &Value) -> ValidationReport {
        let validator = match self.validators.get(name) {
            Some(Some(validator)) => validator,
            Some(None) => return ValidationReport::valid(),
            None => {
                tracing::warn!(schema = name, "no schema registered, skipping validation");
                return ValidationReport::valid();
            }
        };

        let errors: Vec<SchemaViolation> = validator
            .iter_errors(value)
            .map(|err| SchemaViolation {
                path: err.instance_path().to_string(),
                message: err.to_string(),
                params: constraint_params(err.kind()),
            })
            .collect();
        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the violated constraint's parameters for the error payload.
fn constraint_params(kind: &ValidationErrorKind) -> Value {
    match kind {
        ValidationErrorKind::Required { property } => json!({ "required": property }),
        ValidationErrorKind::Minimum { limit } => json!({ "minimum": limit }),
        ValidationErrorKind::Maximum { limit } => json!({ "maximum": limit }),
        ValidationErrorKind::MinLength { limit } => json!({ "minLength": limit }),
        ValidationErrorKind::MaxLength { limit } => json!({ "maxLength": limit }),
        ValidationErrorKind::Enum { options } => json!({ "enum": options }),
        ValidationErrorKind::Pattern { pattern } => json!({ "pattern": pattern }),
        ValidationErrorKind::Format { format } => json!({ "format": format }),
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            json!({ "additionalProperties": unexpected })
        }
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer_schema() -> Value {
        json!({
            "$id": "opflow://schemas/offer",
            "type": "object",
            "required": ["title", "price"],
            "properties": {
                "title": { "type": "string", "minLength": 1 },
                "price": { "type": "number", "minimum": 0 },
                "category": { "enum": ["compute", "storage", "data"] }
            },
            "additionalProperties": false
        })
    }

    #[test]
    fn valid_payload_passes() {
        let mut registry = SchemaRegistry::new();
        registry.load("offer", &offer_schema()).unwrap();

        let report = registry.validate("offer", &json!({"title": "gpu hours", "price": 12.5}));
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn violations_carry_path_and_constraint_params() {
        let mut registry = SchemaRegistry::new();
        registry.load("offer", &offer_schema()).unwrap();

        let report = registry.validate(
            "offer",
            &json!({"title": "gpu hours", "price": -3, "category": "gpus"}),
        );
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);

        let minimum = report
            .errors
            .iter()
            .find(|e| e.path == "/price")
            .expect("minimum violation");
        assert_eq!(minimum.params["minimum"], json!(0));

        let enumeration = report
            .errors
            .iter()
            .find(|e| e.path == "/category")
            .expect("enum violation");
        assert!(enumeration.params.get("enum").is_some());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut registry = SchemaRegistry::new();
        registry.load("offer", &offer_schema()).unwrap();

        let report = registry.validate("offer", &json!({"price": 1}));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.message.contains("title")));
    }

    #[test]
    fn duplicate_id_keeps_first_registration() {
        let mut registry = SchemaRegistry::new();
        registry.load("offer", &offer_schema()).unwrap();

        // Same $id, laxer body: must be ignored.
        let relaxed = json!({ "$id": "opflow://schemas/offer", "type": "object" });
        registry.load("offer-relaxed", &relaxed).unwrap();
        assert!(!registry.contains("offer-relaxed"));

        let report = registry.validate("offer", &json!({}));
        assert!(!report.valid);
    }

    #[test]
    fn non_critical_compile_failure_degrades_to_always_valid() {
        let mut registry = SchemaRegistry::new();
        let broken = json!({ "type": "object", "properties": { "x": { "type": 17 } } });
        registry.load("sidecar", &broken).unwrap();

        let report = registry.validate("sidecar", &json!({"x": []}));
        assert!(report.valid);
    }

    #[test]
    fn critical_compile_failure_aborts() {
        let mut registry = SchemaRegistry::new().with_critical(["offer"]);
        let broken = json!({ "type": "object", "properties": { "x": { "type": 17 } } });
        let err = registry.load("offer", &broken);
        assert!(matches!(err, Err(SchemaError::CriticalCompile { .. })));
    }

    #[test]
    fn unregistered_schema_validates_as_always_valid() {
        let registry = SchemaRegistry::new();
        assert!(registry.validate("nothing", &json!({"anything": true})).valid);
    }
}
