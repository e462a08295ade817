//! # Converge Engine
//!
//! A declarative schema reconciliation engine.
//!
//! Applications declare their data classes (fields, indexes, class-level
//! permissions) once at startup. On each run the engine reads the live schemas
//! from a remote store and applies the smallest set of create, update and
//! delete calls that makes the store match the declarations.
//!
//! ## Design Principles
//!
//! - **No transport**: the engine talks to the store only through the
//!   [`SchemaStore`] trait; hosts supply the wire protocol
//! - **No globals**: every registration lives on an explicit [`Cloud`] instance
//! - **Typed declarations**: field kinds are a [`FieldSpec`] union, so "did
//!   this field change" is plain equality; store kinds it does not know are
//!   kept as [`FieldSpec::Other`] rather than failing the listing
//! - **Optimistic**: calls are attempted once; failures are reported, never
//!   compensated
//!
//! ## Core Concepts
//!
//! ### Diffing
//!
//! [`get_actions`] partitions a local and a remote name set into
//! `to_add`/`to_remove`/`to_update`. It runs three times per class: for class
//! names, field names and index names. [`ReservedNames`] describes which
//! remote names are protected at each tier.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] runs an optional reset (purge and delete every remote
//! class) followed by an optional sync. Field and index definitions that
//! changed are replaced by a delete commit followed by an add commit, since
//! stores do not change a field's type in place.
//!
//! ## Quick Start
//!
//! ```rust
//! use converge_engine::{Cloud, CloudSchema, FieldOptions, MemoryStore, SyncOptions};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! // 1. Declare schemas on an engine instance
//! let cloud = Cloud::new();
//! cloud.register_schema(
//!     CloudSchema::new("User").add_string("nickname", FieldOptions::required()),
//! );
//!
//! // 2. Point it at a store
//! let store = MemoryStore::new();
//!
//! // 3. Converge
//! let report = cloud.run_migrations(&store, SyncOptions::sync()).await.unwrap();
//! assert_eq!(report.created_classes, vec!["User"]);
//! # });
//! # }
//! ```

pub mod builder;
pub mod cloud;
pub mod diff;
pub mod equality;
pub mod error;
pub mod memory;
pub mod reconcile;
pub mod registry;
pub mod resolvers;
pub mod schema;
pub mod store;
pub mod triggers;

// Re-export main types at crate root
pub use builder::CloudSchema;
pub use cloud::{Cloud, FunctionHandler, SetupOutcome, StartupHook};
pub use diff::{get_actions, get_actions_with, DiffSet, ReservedNames};
pub use equality::structural_eq;
pub use error::{ClassFailure, Error, Result};
pub use memory::{MemoryStore, StoreCall};
pub use reconcile::{MemberChange, ReconcileReport, Reconciler, SyncOptions};
pub use registry::SchemaRegistry;
pub use resolvers::{resolver_handler, ResolverHandler, ResolverRequest, ResolverTable};
pub use schema::{
    Access, ClassLevelPermissions, DateValue, FieldOptions, FieldSpec, FileValue, GeoPointValue, Grant,
    IndexSpec, PointerValue, RemoteSchema, SchemaDefinition,
};
pub use store::{ClassChanges, SchemaStore};
pub use triggers::{trigger_handler, LifecycleEvent, TriggerHandler, TriggerRequest, TriggerTable};

/// Type aliases for clarity
pub type ClassName = String;
pub type FieldName = String;
pub type IndexName = String;
