//! Name-set diffing.
//!
//! Every tier of a reconciliation pass (classes, fields, indexes) starts by
//! comparing the names declared locally with the names reported by the store.
//! The comparison is a pure partition of the merged name set into three lists.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Names the store owns and the reconciler must leave alone.
///
/// Two mechanisms apply, independently:
///
/// - `internal_prefix`: a remote name starting with this prefix is never
///   scheduled for removal. It may still be added or updated when declared
///   locally. This protects system classes (`_User`, `_Role`) and default
///   indexes (`_id_`).
/// - `store_managed`: exact names dropped from every list, on both sides.
///   These are maintained by the store itself and are never declared, removed
///   or compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedNames {
    pub internal_prefix: Option<&'static str>,
    pub store_managed: &'static [&'static str],
}

impl ReservedNames {
    /// Class tier: underscore-prefixed classes are never deleted.
    pub const CLASSES: Self = Self {
        internal_prefix: Some("_"),
        store_managed: &[],
    };

    /// Field tier: the store's bookkeeping columns are invisible to the diff.
    pub const FIELDS: Self = Self {
        internal_prefix: Some("_"),
        store_managed: &["objectId", "createdAt", "updatedAt", "ACL"],
    };

    /// Index tier: only the prefix rule applies.
    pub const INDEXES: Self = Self {
        internal_prefix: Some("_"),
        store_managed: &[],
    };

    /// No reserved names at all.
    pub const NONE: Self = Self {
        internal_prefix: None,
        store_managed: &[],
    };

    /// Whether `name` carries the internal prefix.
    pub fn is_internal(&self, name: &str) -> bool {
        self.internal_prefix
            .is_some_and(|prefix| name.starts_with(prefix))
    }

    /// Whether `name` is one of the store-managed names.
    pub fn is_store_managed(&self, name: &str) -> bool {
        self.store_managed.iter().any(|managed| *managed == name)
    }
}

/// Partition of a local and a remote name set.
///
/// Every considered name lands in exactly one list. Lists follow the input
/// order: local order for `to_add`/`to_update`, remote order for `to_remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSet {
    /// Present locally, absent remotely
    pub to_add: Vec<String>,
    /// Present remotely, absent locally (never internal)
    pub to_remove: Vec<String>,
    /// Present on both sides
    pub to_update: Vec<String>,
}

impl DiffSet {
    /// Total number of names across all three lists.
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len() + self.to_update.len()
    }

    /// True when all three lists are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Diff `local` against `remote` with the default internal-prefix rule.
///
/// ```rust
/// use converge_engine::get_actions;
///
/// let diff = get_actions(["A", "B"], ["B", "_Role"]);
/// assert_eq!(diff.to_add, vec!["A"]);
/// assert_eq!(diff.to_update, vec!["B"]);
/// assert!(diff.to_remove.is_empty());
/// ```
pub fn get_actions<'a>(
    local: impl IntoIterator<Item = &'a str>,
    remote: impl IntoIterator<Item = &'a str>,
) -> DiffSet {
    get_actions_with(local, remote, &ReservedNames::CLASSES)
}

/// Diff `local` against `remote` under an explicit reserved-name policy.
pub fn get_actions_with<'a>(
    local: impl IntoIterator<Item = &'a str>,
    remote: impl IntoIterator<Item = &'a str>,
    reserved: &ReservedNames,
) -> DiffSet {
    let local = distinct(local, reserved);
    let remote = distinct(remote, reserved);

    let local_set: HashSet<&str> = local.iter().copied().collect();
    let remote_set: HashSet<&str> = remote.iter().copied().collect();

    let mut diff = DiffSet::default();
    for name in &local {
        if remote_set.contains(name) {
            diff.to_update.push(name.to_string());
        } else {
            diff.to_add.push(name.to_string());
        }
    }
    for name in &remote {
        if !local_set.contains(name) && !reserved.is_internal(name) {
            diff.to_remove.push(name.to_string());
        }
    }
    diff
}

/// Deduplicate while keeping first-seen order; drops store-managed names.
fn distinct<'a>(names: impl IntoIterator<Item = &'a str>, reserved: &ReservedNames) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| !reserved.is_store_managed(name))
        .filter(|name| seen.insert(*name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_update() {
        let diff = get_actions(["A", "B"], ["B"]);
        assert_eq!(diff.to_add, vec!["A"]);
        assert_eq!(diff.to_update, vec!["B"]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn internal_names_are_never_removed() {
        let diff = get_actions([], ["_Role", "Foo"]);
        assert_eq!(diff.to_remove, vec!["Foo"]);
        assert!(diff.to_add.is_empty());
        assert!(diff.to_update.is_empty());
    }

    #[test]
    fn internal_names_can_still_be_updated() {
        let diff = get_actions(["_User"], ["_User", "_Session"]);
        assert_eq!(diff.to_update, vec!["_User"]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn store_managed_fields_are_invisible() {
        let diff = get_actions_with(
            ["age"],
            ["objectId", "createdAt", "updatedAt", "ACL", "age", "legacy"],
            &ReservedNames::FIELDS,
        );
        assert!(diff.to_add.is_empty());
        assert_eq!(diff.to_update, vec!["age"]);
        assert_eq!(diff.to_remove, vec!["legacy"]);

        // Declaring one locally does not bring it back into play either.
        let diff = get_actions_with(["ACL"], ["ACL"], &ReservedNames::FIELDS);
        assert!(diff.is_empty());
    }

    #[test]
    fn default_index_is_kept() {
        let diff = get_actions_with(["by_name"], ["_id_"], &ReservedNames::INDEXES);
        assert_eq!(diff.to_add, vec!["by_name"]);
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn no_policy_removes_everything_undeclared() {
        let diff = get_actions_with([], ["_id_", "x"], &ReservedNames::NONE);
        assert_eq!(diff.to_remove, vec!["_id_", "x"]);
    }

    #[test]
    fn duplicates_collapse() {
        let diff = get_actions(["A", "A", "B"], ["B", "B", "C"]);
        assert_eq!(diff.to_add, vec!["A"]);
        assert_eq!(diff.to_update, vec!["B"]);
        assert_eq!(diff.to_remove, vec!["C"]);
    }

    #[test]
    fn order_follows_input() {
        let diff = get_actions(["c", "a", "b"], ["z", "y", "a"]);
        assert_eq!(diff.to_add, vec!["c", "b"]);
        assert_eq!(diff.to_remove, vec!["z", "y"]);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn arb_names() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec("_?[a-e]{1,2}", 0..12)
        }

        proptest! {
            #[test]
            fn prop_partition_reconstructs_union(local in arb_names(), remote in arb_names()) {
                let diff = get_actions(
                    local.iter().map(String::as_str),
                    remote.iter().map(String::as_str),
                );

                let expected: BTreeSet<&str> = local
                    .iter()
                    .chain(remote.iter().filter(|r| !r.starts_with('_') || local.contains(r)))
                    .map(String::as_str)
                    .collect();
                let got: Vec<&str> = diff
                    .to_add
                    .iter()
                    .chain(&diff.to_update)
                    .chain(&diff.to_remove)
                    .map(String::as_str)
                    .collect();

                // Each name appears exactly once.
                let got_set: BTreeSet<&str> = got.iter().copied().collect();
                prop_assert_eq!(got.len(), got_set.len());
                prop_assert_eq!(got_set, expected);
            }

            #[test]
            fn prop_add_and_remove_disjoint(local in arb_names(), remote in arb_names()) {
                let diff = get_actions(
                    local.iter().map(String::as_str),
                    remote.iter().map(String::as_str),
                );
                for name in &diff.to_add {
                    prop_assert!(!diff.to_remove.contains(name));
                }
            }

            #[test]
            fn prop_converged_state_is_stable(local in arb_names()) {
                // After applying a diff the remote equals local; diffing again
                // schedules nothing but updates.
                let diff = get_actions(
                    local.iter().map(String::as_str),
                    local.iter().map(String::as_str),
                );
                prop_assert!(diff.to_add.is_empty());
                prop_assert!(diff.to_remove.is_empty());

                let distinct: BTreeSet<&String> = local.iter().collect();
                prop_assert_eq!(diff.to_update.len(), distinct.len());
            }
        }
    }
}
