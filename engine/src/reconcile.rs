//! Reconciliation of remote schemas against local declarations.
//!
//! A pass runs strictly in order:
//!
//! 1. **Reset** (optional): purge and delete every remote class.
//! 2. **Class sync** (optional): diff class names once against a fresh
//!    snapshot; create missing classes, purge and delete undeclared ones, and
//!    descend into classes present on both sides.
//! 3. **Field sync**, then **index sync**, per class present on both sides.
//!    Additions and removals go out as one commit. A member whose definition
//!    changed is replaced: delete, commit, add, commit.
//!
//! Classes are independent: they are launched together and the pass waits for
//! all of them. A failure inside one class stops that class only; the pass
//! reports every failed class once the others have finished.
//!
//! Two processes reconciling the same store at the same time can interleave
//! destructively. A pass is meant to be run by a single coordinating process.

use crate::diff::{get_actions_with, ReservedNames};
use crate::error::{ClassFailure, Error, Result};
use crate::registry::SchemaRegistry;
use crate::schema::{FieldSpec, IndexSpec, RemoteSchema, SchemaDefinition};
use crate::store::{ClassChanges, SchemaStore};
use crate::ClassName;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::Instrument;

/// Which stages a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Wipe every remote class before syncing
    #[serde(default)]
    pub reset: bool,
    /// Diff and apply local declarations
    #[serde(default)]
    pub sync: bool,
}

impl SyncOptions {
    /// Sync only, the usual production setting.
    pub fn sync() -> Self {
        Self {
            reset: false,
            sync: true,
        }
    }

    /// True when the pass would do nothing.
    pub fn is_noop(&self) -> bool {
        !self.reset && !self.sync
    }
}

/// A field or index change on one class.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    pub class_name: ClassName,
    pub name: String,
}

impl MemberChange {
    fn new(class_name: &str, name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            name: name.to_string(),
        }
    }
}

/// What a pass changed on the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Classes purged and deleted by the reset stage
    pub reset_classes: Vec<ClassName>,
    pub created_classes: Vec<ClassName>,
    pub deleted_classes: Vec<ClassName>,
    pub added_fields: Vec<MemberChange>,
    pub removed_fields: Vec<MemberChange>,
    pub replaced_fields: Vec<MemberChange>,
    pub added_indexes: Vec<MemberChange>,
    pub removed_indexes: Vec<MemberChange>,
    pub replaced_indexes: Vec<MemberChange>,
}

impl ReconcileReport {
    /// True when nothing was changed.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ReconcileReport) {
        self.reset_classes.extend(other.reset_classes);
        self.created_classes.extend(other.created_classes);
        self.deleted_classes.extend(other.deleted_classes);
        self.added_fields.extend(other.added_fields);
        self.removed_fields.extend(other.removed_fields);
        self.replaced_fields.extend(other.replaced_fields);
        self.added_indexes.extend(other.added_indexes);
        self.removed_indexes.extend(other.removed_indexes);
        self.replaced_indexes.extend(other.replaced_indexes);
    }

    fn record<M: Member>(&mut self, action: MemberAction, change: MemberChange) {
        let target = match (M::KIND, action) {
            (MemberKind::Field, MemberAction::Added) => &mut self.added_fields,
            (MemberKind::Field, MemberAction::Removed) => &mut self.removed_fields,
            (MemberKind::Field, MemberAction::Replaced) => &mut self.replaced_fields,
            (MemberKind::Index, MemberAction::Added) => &mut self.added_indexes,
            (MemberKind::Index, MemberAction::Removed) => &mut self.removed_indexes,
            (MemberKind::Index, MemberAction::Replaced) => &mut self.replaced_indexes,
        };
        target.push(change);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Field,
    Index,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberKind::Field => write!(f, "field"),
            MemberKind::Index => write!(f, "index"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberAction {
    Added,
    Removed,
    Replaced,
}

/// Per-class members synced with the same algorithm: fields and indexes.
trait Member: PartialEq + Clone + Send + Sync {
    const KIND: MemberKind;
    const RESERVED: ReservedNames;

    fn stage_add(changes: &mut ClassChanges, name: &str, spec: &Self);
    fn stage_delete(changes: &mut ClassChanges, name: &str);
}

impl Member for FieldSpec {
    const KIND: MemberKind = MemberKind::Field;
    const RESERVED: ReservedNames = ReservedNames::FIELDS;

    fn stage_add(changes: &mut ClassChanges, name: &str, spec: &Self) {
        changes.add_field(name, spec.clone());
    }

    fn stage_delete(changes: &mut ClassChanges, name: &str) {
        changes.delete_field(name);
    }
}

impl Member for IndexSpec {
    const KIND: MemberKind = MemberKind::Index;
    const RESERVED: ReservedNames = ReservedNames::INDEXES;

    fn stage_add(changes: &mut ClassChanges, name: &str, spec: &Self) {
        changes.add_index(name, spec.clone());
    }

    fn stage_delete(changes: &mut ClassChanges, name: &str) {
        changes.delete_index(name);
    }
}

/// Drives a store toward the declarations held in a registry.
pub struct Reconciler<'a, S: SchemaStore + ?Sized> {
    store: &'a S,
    registry: &'a SchemaRegistry,
}

impl<'a, S: SchemaStore + ?Sized> Reconciler<'a, S> {
    /// Create a new reconciler.
    pub fn new(store: &'a S, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    /// Run one pass.
    pub async fn run(&self, options: SyncOptions) -> Result<ReconcileReport> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("reconcile", %run_id, reset = options.reset, sync = options.sync);

        async move {
            let mut report = ReconcileReport::default();
            if options.reset {
                report.merge(self.reset_schemas().await?);
            }
            if options.sync {
                report.merge(self.sync_schemas().await?);
            }
            tracing::info!(
                created = report.created_classes.len(),
                deleted = report.deleted_classes.len(),
                "reconciliation complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Purge and delete every remote class, declared or not.
    pub async fn reset_schemas(&self) -> Result<ReconcileReport> {
        let remote = self.store.list_all().await?;
        tracing::warn!(classes = remote.len(), "resetting all remote classes");

        let results = join_all(remote.iter().map(|schema| async move {
            let name = schema.class_name.as_str();
            (name, self.drop_class(name).await)
        }))
        .await;

        let mut report = ReconcileReport::default();
        collect(results, |name, ()| report.reset_classes.push(name.to_string()))?;
        Ok(report)
    }

    /// Diff classes and apply the result.
    pub async fn sync_schemas(&self) -> Result<ReconcileReport> {
        let remote = self.store.list_all().await?;
        let local = self.registry.all();

        let diff = get_actions_with(
            local.iter().map(|d| d.class_name.as_str()),
            remote.iter().map(|r| r.class_name.as_str()),
            &ReservedNames::CLASSES,
        );
        tracing::debug!(
            add = diff.to_add.len(),
            remove = diff.to_remove.len(),
            update = diff.to_update.len(),
            "class diff"
        );

        let local_by_name: HashMap<&str, &SchemaDefinition> =
            local.iter().map(|d| (d.class_name.as_str(), d)).collect();
        let remote_by_name: HashMap<&str, &RemoteSchema> =
            remote.iter().map(|r| (r.class_name.as_str(), r)).collect();

        let creates = join_all(
            diff.to_add
                .iter()
                .filter_map(|name| local_by_name.get(name.as_str()).copied())
                .map(|definition| async move {
                    let name = definition.class_name.as_str();
                    let result = self.create_class(definition).await.map(|()| {
                        let mut report = ReconcileReport::default();
                        report.created_classes.push(name.to_string());
                        report
                    });
                    (name, result)
                }),
        );

        let drops = join_all(diff.to_remove.iter().map(|name| async move {
            let result = self.drop_class(name).await.map(|()| {
                let mut report = ReconcileReport::default();
                report.deleted_classes.push(name.clone());
                report
            });
            (name.as_str(), result)
        }));

        let updates = join_all(diff.to_update.iter().filter_map(|name| {
            let local = local_by_name.get(name.as_str()).copied()?;
            let remote = remote_by_name.get(name.as_str()).copied()?;
            Some(async move { (name.as_str(), self.sync_class(local, remote).await) })
        }));

        let (creates, drops, updates) = futures::join!(creates, drops, updates);

        let mut report = ReconcileReport::default();
        collect(
            creates.into_iter().chain(drops).chain(updates),
            |_, class_report| report.merge(class_report),
        )?;
        Ok(report)
    }

    /// Bring one existing class in line: fields first, then indexes.
    pub async fn sync_class(
        &self,
        local: &SchemaDefinition,
        remote: &RemoteSchema,
    ) -> Result<ReconcileReport> {
        let mut report = self.sync_fields(local, remote).await?;
        report.merge(self.sync_indexes(local, remote).await?);
        Ok(report)
    }

    /// Field tier of [`Self::sync_class`].
    pub async fn sync_fields(
        &self,
        local: &SchemaDefinition,
        remote: &RemoteSchema,
    ) -> Result<ReconcileReport> {
        self.sync_members(&local.class_name, &local.fields, &remote.fields)
            .await
    }

    /// Index tier of [`Self::sync_class`].
    pub async fn sync_indexes(
        &self,
        local: &SchemaDefinition,
        remote: &RemoteSchema,
    ) -> Result<ReconcileReport> {
        self.sync_members(&local.class_name, &local.indexes, &remote.indexes)
            .await
    }

    async fn create_class(&self, definition: &SchemaDefinition) -> Result<()> {
        self.store.save(definition).await?;
        tracing::info!(class = %definition.class_name, fields = definition.fields.len(), "created class");
        Ok(())
    }

    async fn drop_class(&self, class_name: &str) -> Result<()> {
        self.store.purge(class_name).await?;
        self.store.delete_class(class_name).await?;
        tracing::info!(class = %class_name, "deleted class");
        Ok(())
    }

    async fn sync_members<M: Member>(
        &self,
        class_name: &str,
        local: &BTreeMap<String, M>,
        remote: &BTreeMap<String, M>,
    ) -> Result<ReconcileReport> {
        let diff = get_actions_with(
            local.keys().map(String::as_str),
            remote.keys().map(String::as_str),
            &M::RESERVED,
        );
        let mut report = ReconcileReport::default();

        let mut changes = ClassChanges::new(class_name);
        for name in &diff.to_add {
            if let Some(spec) = local.get(name) {
                M::stage_add(&mut changes, name, spec);
            }
        }
        for name in &diff.to_remove {
            M::stage_delete(&mut changes, name);
        }
        if !changes.is_empty() {
            self.store.commit(&changes).await?;
            for name in &diff.to_add {
                tracing::info!(class = %class_name, name = %name, "created {}", M::KIND);
                report.record::<M>(MemberAction::Added, MemberChange::new(class_name, name));
            }
            for name in &diff.to_remove {
                tracing::info!(class = %class_name, name = %name, "deleted {}", M::KIND);
                report.record::<M>(MemberAction::Removed, MemberChange::new(class_name, name));
            }
        }

        let changed = diff.to_update.iter().filter_map(|name| {
            let spec = local.get(name)?;
            (remote.get(name) != Some(spec)).then_some((name, spec))
        });
        let results = join_all(changed.map(|(name, spec)| async move {
            (name, self.replace_member(class_name, name, spec).await)
        }))
        .await;

        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(()) => {
                    report.record::<M>(MemberAction::Replaced, MemberChange::new(class_name, name))
                }
                Err(err) => {
                    tracing::error!(class = %class_name, name = %name, error = %err, "{} replace failed", M::KIND);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Delete then re-add a member whose definition changed. The store cannot
    /// change a type in place, so the delete must be committed first.
    async fn replace_member<M: Member>(&self, class_name: &str, name: &str, spec: &M) -> Result<()> {
        tracing::warn!(class = %class_name, name = %name, "{} definition changed, replacing", M::KIND);

        let mut removal = ClassChanges::new(class_name);
        M::stage_delete(&mut removal, name);
        self.store.commit(&removal).await?;
        tracing::info!(class = %class_name, name = %name, "deleted {}", M::KIND);

        let mut addition = ClassChanges::new(class_name);
        M::stage_add(&mut addition, name, spec);
        self.store.commit(&addition).await?;
        tracing::info!(class = %class_name, name = %name, "created {}", M::KIND);
        Ok(())
    }
}

/// Split per-class results, feeding successes to `on_ok` and turning any
/// failures into one [`Error::Reconcile`].
fn collect<'n, T>(
    results: impl IntoIterator<Item = (&'n str, Result<T>)>,
    mut on_ok: impl FnMut(&'n str, T),
) -> Result<()> {
    let mut failures = Vec::new();
    for (class_name, result) in results {
        match result {
            Ok(value) => on_ok(class_name, value),
            Err(error) => {
                tracing::error!(class = %class_name, error = %error, "class sync failed");
                failures.push(ClassFailure {
                    class_name: class_name.to_string(),
                    error,
                });
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Reconcile { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::{CloudSchema, FieldOptions};

    fn call_add_field(class: &str, field: &str) -> StoreCall {
        StoreCall::AddField(class.into(), field.into())
    }

    fn call_delete_field(class: &str, field: &str) -> StoreCall {
        StoreCall::DeleteField(class.into(), field.into())
    }

    #[tokio::test]
    async fn noop_options_touch_nothing() {
        let store = MemoryStore::with_schemas([RemoteSchema::new("Legacy")]);
        let registry = SchemaRegistry::new();
        let report = Reconciler::new(&store, &registry)
            .run(SyncOptions::default())
            .await
            .unwrap();
        assert!(report.is_noop());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn type_change_is_delete_then_add() {
        let store = MemoryStore::with_schemas([RemoteSchema::new("User")
            .with_field("objectId", FieldSpec::string())
            .with_field("age", FieldSpec::string())]);
        let registry = SchemaRegistry::new();
        registry.register(CloudSchema::new("User").add_number("age", FieldOptions::optional()));

        let report = Reconciler::new(&store, &registry)
            .run(SyncOptions::sync())
            .await
            .unwrap();

        assert_eq!(report.replaced_fields, vec![MemberChange::new("User", "age")]);
        assert_eq!(
            store.mutations(),
            vec![
                call_delete_field("User", "age"),
                StoreCall::Commit("User".into()),
                call_add_field("User", "age"),
                StoreCall::Commit("User".into()),
            ]
        );
        assert_eq!(store.schema("User").unwrap().fields["age"], FieldSpec::number());
    }

    #[tokio::test]
    async fn unchanged_fields_are_left_alone() {
        let store = MemoryStore::with_schemas([RemoteSchema::new("User")
            .with_field("age", FieldSpec::number())]);
        let registry = SchemaRegistry::new();
        registry.register(CloudSchema::new("User").add_number("age", FieldOptions::optional()));

        let report = Reconciler::new(&store, &registry)
            .run(SyncOptions::sync())
            .await
            .unwrap();
        assert!(report.is_noop());
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn failed_replace_skips_index_sync() {
        let store = MemoryStore::with_schemas([RemoteSchema::new("User")
            .with_field("age", FieldSpec::string())]);
        store.fail_on(call_add_field("User", "age"));

        let registry = SchemaRegistry::new();
        registry.register(
            CloudSchema::new("User")
                .add_number("age", FieldOptions::optional())
                .add_index("by_age", IndexSpec::ascending(["age"])),
        );

        let err = Reconciler::new(&store, &registry)
            .run(SyncOptions::sync())
            .await
            .unwrap_err();

        let Error::Reconcile { failures } = err else {
            panic!("expected reconcile error");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].class_name, "User");
        assert!(!store
            .calls()
            .contains(&StoreCall::AddIndex("User".into(), "by_age".into())));
    }

    #[test]
    fn report_merge() {
        let mut a = ReconcileReport::default();
        a.created_classes.push("A".into());
        let mut b = ReconcileReport::default();
        b.added_fields.push(MemberChange::new("B", "x"));
        a.merge(b);
        assert_eq!(a.created_classes, vec!["A"]);
        assert_eq!(a.added_fields, vec![MemberChange::new("B", "x")]);
        assert!(!a.is_noop());
    }
}
