//! The remote schema store seam.
//!
//! The engine never speaks a wire protocol. Everything it needs from the
//! remote side goes through [`SchemaStore`], one class at a time. Field and
//! index mutations are staged on a [`ClassChanges`] batch and flushed with a
//! single [`SchemaStore::commit`] call.

use crate::error::Result;
use crate::schema::{FieldSpec, IndexSpec, RemoteSchema, SchemaDefinition};
use crate::{ClassName, FieldName, IndexName};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Pending field and index mutations for one class.
///
/// Staging is local and infallible; nothing reaches the store until the batch
/// is committed. Each batch is an independent value, so concurrent chains on
/// the same class never share pending state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassChanges {
    class_name: ClassName,
    added_fields: BTreeMap<FieldName, FieldSpec>,
    deleted_fields: BTreeSet<FieldName>,
    added_indexes: BTreeMap<IndexName, IndexSpec>,
    deleted_indexes: BTreeSet<IndexName>,
}

impl ClassChanges {
    pub fn new(class_name: impl Into<ClassName>) -> Self {
        Self {
            class_name: class_name.into(),
            added_fields: BTreeMap::new(),
            deleted_fields: BTreeSet::new(),
            added_indexes: BTreeMap::new(),
            deleted_indexes: BTreeSet::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn add_field(&mut self, name: impl Into<FieldName>, spec: FieldSpec) -> &mut Self {
        self.added_fields.insert(name.into(), spec);
        self
    }

    pub fn delete_field(&mut self, name: impl Into<FieldName>) -> &mut Self {
        self.deleted_fields.insert(name.into());
        self
    }

    pub fn add_index(&mut self, name: impl Into<IndexName>, spec: IndexSpec) -> &mut Self {
        self.added_indexes.insert(name.into(), spec);
        self
    }

    pub fn delete_index(&mut self, name: impl Into<IndexName>) -> &mut Self {
        self.deleted_indexes.insert(name.into());
        self
    }

    pub fn added_fields(&self) -> &BTreeMap<FieldName, FieldSpec> {
        &self.added_fields
    }

    pub fn deleted_fields(&self) -> &BTreeSet<FieldName> {
        &self.deleted_fields
    }

    pub fn added_indexes(&self) -> &BTreeMap<IndexName, IndexSpec> {
        &self.added_indexes
    }

    pub fn deleted_indexes(&self) -> &BTreeSet<IndexName> {
        &self.deleted_indexes
    }

    /// True when committing would send nothing.
    pub fn is_empty(&self) -> bool {
        self.added_fields.is_empty()
            && self.deleted_fields.is_empty()
            && self.added_indexes.is_empty()
            && self.deleted_indexes.is_empty()
    }
}

/// Remote schema operations.
///
/// Every call may fail and may be slow. The engine adds no caching or retry
/// around them: each planned operation is attempted exactly once.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Every class the store knows, with its fields and indexes.
    async fn list_all(&self) -> Result<Vec<RemoteSchema>>;

    /// Delete every data record of a class, keeping its definition.
    async fn purge(&self, class_name: &str) -> Result<()>;

    /// Delete a class definition. The class must be empty.
    async fn delete_class(&self, class_name: &str) -> Result<()>;

    /// Create a class from a full definition.
    async fn save(&self, definition: &SchemaDefinition) -> Result<()>;

    /// Flush a batch of field and index mutations as one update call.
    async fn commit(&self, changes: &ClassChanges) -> Result<()>;
}

#[async_trait]
impl<S: SchemaStore + ?Sized> SchemaStore for std::sync::Arc<S> {
    async fn list_all(&self) -> Result<Vec<RemoteSchema>> {
        (**self).list_all().await
    }

    async fn purge(&self, class_name: &str) -> Result<()> {
        (**self).purge(class_name).await
    }

    async fn delete_class(&self, class_name: &str) -> Result<()> {
        (**self).delete_class(class_name).await
    }

    async fn save(&self, definition: &SchemaDefinition) -> Result<()> {
        (**self).save(definition).await
    }

    async fn commit(&self, changes: &ClassChanges) -> Result<()> {
        (**self).commit(changes).await
    }
}
