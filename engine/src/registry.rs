//! Local schema registry.

use crate::schema::SchemaDefinition;
use crate::ClassName;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Locally declared schemas, keyed by class name.
///
/// Built during startup and read by every reconciliation pass. Registration
/// replaces any earlier definition of the same class; there is no merge and no
/// removal.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<BTreeMap<ClassName, SchemaDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition, returning the one it replaced.
    pub fn register(&self, definition: impl Into<SchemaDefinition>) -> Option<SchemaDefinition> {
        let definition = definition.into();
        tracing::debug!(class = %definition.class_name, "schema registered");
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.class_name.clone(), definition)
    }

    /// All definitions, ordered by class name.
    pub fn all(&self) -> Vec<SchemaDefinition> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, class_name: &str) -> Option<SchemaDefinition> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    pub fn class_names(&self) -> Vec<ClassName> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
