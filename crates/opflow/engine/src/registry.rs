//! Immutable name-to-definition lookup for workflows.

use opflow_types::{WorkflowDefinition, WorkflowError, WorkflowResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Workflow definitions keyed by name. Populated once at boot, read-only
/// afterwards; duplicate registration keeps the first definition.
#[derive(Default)]
pub struct WorkflowRegistry {
    definitions: HashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: WorkflowDefinition) {
        let name = definition.name.as_str().to_string();
        if self.definitions.contains_key(&name) {
            tracing::warn!(workflow = %name, "workflow already registered, keeping first");
            return;
        }
        tracing::debug!(workflow = %name, steps = definition.steps().len(), "workflow registered");
        self.definitions.insert(name, Arc::new(definition));
    }

    pub fn get(&self, name: &str) -> WorkflowResult<Arc<WorkflowDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflow_types::{ActorSpec, EventType, ModuleTag, PersistSpec};

    fn definition(name: &str, collection: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(
            name,
            ModuleTag::Feed,
            EventType::PostPublished,
            ActorSpec::Field("author".into()),
            format!("{name}.input"),
            PersistSpec::Create {
                collection: collection.into(),
                id_field: "postId".into(),
                id_prefix: None,
                status: None,
                exclude_fields: vec![],
                defaults: vec![],
            },
            "postId",
        )
    }

    #[test]
    fn unknown_name_is_a_typed_error() {
        let registry = WorkflowRegistry::new();
        let err = registry.get("no-such-workflow").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownWorkflow(_)));
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let mut registry = WorkflowRegistry::new();
        registry.register(definition("feed-post", "posts"));
        registry.register(definition("feed-post", "posts_v2"));

        assert_eq!(registry.len(), 1);
        let def = registry.get("feed-post").unwrap();
        assert_eq!(def.persist.collection(), "posts");
    }
}
