//! In-process schema store.
//!
//! Behaves like a strict remote store (duplicate classes, duplicate fields and
//! missing fields are rejected) and records every call it receives, in order.
//! Used by tests and by hosts running without a remote store.

use crate::error::{Error, Result};
use crate::schema::{FieldSpec, IndexSpec, RemoteSchema, SchemaDefinition};
use crate::store::{ClassChanges, SchemaStore};
use crate::{ClassName, FieldName, IndexName};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A call received by [`MemoryStore`].
///
/// A commit is recorded as its individual mutations (field deletes, field
/// adds, index deletes, index adds) followed by [`StoreCall::Commit`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreCall {
    ListAll,
    Purge(ClassName),
    DeleteClass(ClassName),
    Save(ClassName),
    AddField(ClassName, FieldName),
    DeleteField(ClassName, FieldName),
    AddIndex(ClassName, IndexName),
    DeleteIndex(ClassName, IndexName),
    Commit(ClassName),
}

impl StoreCall {
    /// Class this call targets, if any.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            StoreCall::ListAll => None,
            StoreCall::Purge(class)
            | StoreCall::DeleteClass(class)
            | StoreCall::Save(class)
            | StoreCall::AddField(class, _)
            | StoreCall::DeleteField(class, _)
            | StoreCall::AddIndex(class, _)
            | StoreCall::DeleteIndex(class, _)
            | StoreCall::Commit(class) => Some(class),
        }
    }

    /// Whether the call changes remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StoreCall::ListAll)
    }
}

#[derive(Debug, Default)]
struct State {
    schemas: BTreeMap<ClassName, RemoteSchema>,
    records: BTreeMap<ClassName, usize>,
    calls: Vec<StoreCall>,
    failing: HashSet<StoreCall>,
}

/// In-memory [`SchemaStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing remote state.
    pub fn with_schemas(schemas: impl IntoIterator<Item = RemoteSchema>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for schema in schemas {
                state.schemas.insert(schema.class_name.clone(), schema);
            }
        }
        store
    }

    /// Pretend the class holds `count` data records.
    pub fn insert_records(&self, class_name: &str, count: usize) {
        *self.lock().records.entry(class_name.to_string()).or_default() += count;
    }

    pub fn record_count(&self, class_name: &str) -> usize {
        self.lock().records.get(class_name).copied().unwrap_or(0)
    }

    /// Make every future occurrence of `call` fail.
    pub fn fail_on(&self, call: StoreCall) {
        self.lock().failing.insert(call);
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Calls received so far, without reads.
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn schema(&self, class_name: &str) -> Option<RemoteSchema> {
        self.lock().schemas.get(class_name).cloned()
    }

    pub fn class_names(&self) -> Vec<ClassName> {
        self.lock().schemas.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    /// Record `call` and fail it if it was marked failing.
    fn attempt(&mut self, operation: &'static str, call: StoreCall) -> Result<()> {
        let failing = self.failing.contains(&call);
        let class_name = call.class_name().map(str::to_string);
        self.calls.push(call);
        if failing {
            return Err(Error::store(
                operation,
                class_name.as_deref(),
                "injected failure",
            ));
        }
        Ok(())
    }

    fn schema_mut(&mut self, operation: &'static str, class_name: &str) -> Result<&mut RemoteSchema> {
        self.schemas.get_mut(class_name).ok_or_else(|| {
            Error::store(
                operation,
                Some(class_name),
                format!("Class {class_name} does not exist."),
            )
        })
    }
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn list_all(&self) -> Result<Vec<RemoteSchema>> {
        let mut state = self.lock();
        state.attempt("listAll", StoreCall::ListAll)?;
        Ok(state.schemas.values().cloned().collect())
    }

    async fn purge(&self, class_name: &str) -> Result<()> {
        let mut state = self.lock();
        state.attempt("purge", StoreCall::Purge(class_name.to_string()))?;
        state.schema_mut("purge", class_name)?;
        state.records.remove(class_name);
        Ok(())
    }

    async fn delete_class(&self, class_name: &str) -> Result<()> {
        let mut state = self.lock();
        state.attempt("deleteClass", StoreCall::DeleteClass(class_name.to_string()))?;
        state.schema_mut("deleteClass", class_name)?;
        if state.records.get(class_name).copied().unwrap_or(0) > 0 {
            return Err(Error::store(
                "deleteClass",
                Some(class_name),
                format!("Class {class_name} is not empty, contains records, cannot drop schema."),
            ));
        }
        state.schemas.remove(class_name);
        Ok(())
    }

    async fn save(&self, definition: &SchemaDefinition) -> Result<()> {
        let class_name = definition.class_name.as_str();
        let mut state = self.lock();
        state.attempt("save", StoreCall::Save(class_name.to_string()))?;
        if state.schemas.contains_key(class_name) {
            return Err(Error::store(
                "save",
                Some(class_name),
                format!("Class {class_name} already exists."),
            ));
        }

        let mut schema = RemoteSchema::new(class_name)
            .with_field("objectId", FieldSpec::string())
            .with_field("createdAt", FieldSpec::date())
            .with_field("updatedAt", FieldSpec::date())
            .with_field(
                "ACL",
                FieldSpec::Acl {
                    options: Default::default(),
                },
            )
            .with_index("_id_", IndexSpec::ascending(["_id"]));
        schema.fields.extend(definition.fields.clone());
        schema.indexes.extend(definition.indexes.clone());
        state.schemas.insert(class_name.to_string(), schema);
        Ok(())
    }

    async fn commit(&self, changes: &ClassChanges) -> Result<()> {
        let class = changes.class_name();
        let mut state = self.lock();

        for name in changes.deleted_fields() {
            state.attempt("commit", StoreCall::DeleteField(class.into(), name.clone()))?;
        }
        for name in changes.added_fields().keys() {
            state.attempt("commit", StoreCall::AddField(class.into(), name.clone()))?;
        }
        for name in changes.deleted_indexes() {
            state.attempt("commit", StoreCall::DeleteIndex(class.into(), name.clone()))?;
        }
        for name in changes.added_indexes().keys() {
            state.attempt("commit", StoreCall::AddIndex(class.into(), name.clone()))?;
        }
        state.attempt("commit", StoreCall::Commit(class.into()))?;

        // Validate the whole batch before touching anything.
        let schema = state.schema_mut("commit", class)?;
        for name in changes.deleted_fields() {
            if !schema.fields.contains_key(name) {
                return Err(Error::store(
                    "commit",
                    Some(class),
                    format!("Field {name} does not exist, cannot delete."),
                ));
            }
        }
        for name in changes.added_fields().keys() {
            if schema.fields.contains_key(name) && !changes.deleted_fields().contains(name) {
                return Err(Error::store(
                    "commit",
                    Some(class),
                    format!("Field {name} exists, cannot update."),
                ));
            }
        }
        for name in changes.deleted_indexes() {
            if !schema.indexes.contains_key(name) {
                return Err(Error::store(
                    "commit",
                    Some(class),
                    format!("Index {name} does not exist, cannot delete."),
                ));
            }
        }
        for name in changes.added_indexes().keys() {
            if schema.indexes.contains_key(name) && !changes.deleted_indexes().contains(name) {
                return Err(Error::store(
                    "commit",
                    Some(class),
                    format!("Index {name} exists, cannot update."),
                ));
            }
        }

        for name in changes.deleted_fields() {
            schema.fields.remove(name);
        }
        for (name, spec) in changes.added_fields() {
            schema.fields.insert(name.clone(), spec.clone());
        }
        for name in changes.deleted_indexes() {
            schema.indexes.remove(name);
        }
        for (name, spec) in changes.added_indexes() {
            schema.indexes.insert(name.clone(), spec.clone());
        }
        Ok(())
    }
}
