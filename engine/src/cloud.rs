//! The engine instance.
//!
//! A [`Cloud`] owns everything an application registers: schemas, triggers,
//! resolvers, named functions and startup hooks. The host constructs one,
//! shares it by reference, and calls [`Cloud::setup`] once the registrations
//! are in place.

use crate::error::{Error, Result};
use crate::reconcile::{ReconcileReport, Reconciler, SyncOptions};
use crate::registry::SchemaRegistry;
use crate::resolvers::{ResolverHandler, ResolverRequest, ResolverTable};
use crate::schema::SchemaDefinition;
use crate::store::SchemaStore;
use crate::triggers::{TriggerHandler, TriggerTable};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// A registered named function.
pub type FunctionHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Code to run once, after the startup reconciliation.
///
/// Hooks are unordered: a hook must not rely on another hook having run.
#[async_trait]
pub trait StartupHook: Send + Sync {
    async fn on_start(&self, cloud: &Cloud) -> Result<()>;
}

/// How the one-time setup ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SetupOutcome {
    /// The store matches the declarations
    Converged { report: ReconcileReport },
    /// Neither reset nor sync was requested
    Skipped,
    /// Setup stopped early; the store may be partially converged
    Failed { message: String },
}

impl SetupOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SetupOutcome::Failed { .. })
    }
}

/// Engine instance holding every registration.
#[derive(Default)]
pub struct Cloud {
    schemas: SchemaRegistry,
    triggers: TriggerTable,
    resolvers: ResolverTable,
    functions: RwLock<HashMap<String, FunctionHandler>>,
    hooks: RwLock<Vec<Arc<dyn StartupHook>>>,
}

impl std::fmt::Debug for Cloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = functions.keys().collect();
        names.sort();
        f.debug_struct("Cloud")
            .field("schemas", &self.schemas)
            .field("triggers", &self.triggers)
            .field("resolvers", &self.resolvers)
            .field("functions", &names)
            .field("hooks", &self.hook_count())
            .finish()
    }
}

impl Cloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new engine wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // Schemas

    pub fn register_schema(&self, definition: impl Into<SchemaDefinition>) {
        self.schemas.register(definition);
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    // Triggers

    /// Register a trigger set for one class, keyed by event name.
    pub fn register_triggers<'a>(
        &self,
        class_name: &str,
        set: impl IntoIterator<Item = (&'a str, TriggerHandler)>,
    ) -> Result<()> {
        self.triggers.register_set(class_name, set)
    }

    /// Registered triggers, for hosts that dispatch record lifecycle events.
    pub fn triggers(&self) -> &TriggerTable {
        &self.triggers
    }

    // Resolvers

    pub fn register_resolvers<'a>(
        &self,
        type_name: &str,
        set: impl IntoIterator<Item = (&'a str, ResolverHandler)>,
    ) {
        self.resolvers.register_set(type_name, set);
    }

    pub async fn resolve(
        &self,
        type_name: &str,
        field: &str,
        request: ResolverRequest,
    ) -> Result<Value> {
        self.resolvers.resolve(type_name, field, request).await
    }

    // Functions

    /// Define a named function; a later definition replaces an earlier one.
    pub fn define_function<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(function = %name, "function defined");
        let handler: FunctionHandler =
            Arc::new(move |params| -> BoxFuture<'static, Result<Value>> { Box::pin(f(params)) });
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handler);
    }

    pub async fn run_function(&self, name: &str, params: Value) -> Result<Value> {
        let handler = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
        handler(params).await
    }

    // Startup

    pub fn register_hook(&self, hook: impl StartupHook + 'static) {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    pub fn hook_count(&self) -> usize {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run one reconciliation pass against `store`.
    pub async fn run_migrations<S>(
        &self,
        store: &S,
        options: SyncOptions,
    ) -> Result<ReconcileReport>
    where
        S: SchemaStore + ?Sized,
    {
        Reconciler::new(store, &self.schemas).run(options).await
    }

    /// One-time setup: wait for `module`, reconcile, then run startup hooks.
    ///
    /// This is the single failure boundary of the setup sequence. Any error is
    /// logged and reported in the outcome; nothing is retried and nothing
    /// propagates. Hooks only run when the reconciliation did not fail.
    pub async fn setup<S, M, E>(&self, store: &S, options: SyncOptions, module: M) -> SetupOutcome
    where
        S: SchemaStore + ?Sized,
        M: Future<Output = std::result::Result<(), E>> + Send,
        E: std::fmt::Display,
    {
        match self.try_setup(store, options, module).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "setup failed; schemas may not be converged");
                SetupOutcome::Failed {
                    message: err.to_string(),
                }
            }
        }
    }

    async fn try_setup<S, M, E>(
        &self,
        store: &S,
        options: SyncOptions,
        module: M,
    ) -> Result<SetupOutcome>
    where
        S: SchemaStore + ?Sized,
        M: Future<Output = std::result::Result<(), E>> + Send,
        E: std::fmt::Display,
    {
        module
            .await
            .map_err(|err| Error::Initialization(err.to_string()))?;
        tracing::info!(classes = self.schemas.len(), "registrations loaded");

        let outcome = if options.is_noop() {
            tracing::info!("schema reset and sync disabled, skipping reconciliation");
            SetupOutcome::Skipped
        } else {
            let report = self.run_migrations(store, options).await?;
            SetupOutcome::Converged { report }
        };

        let hooks: Vec<Arc<dyn StartupHook>> = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            hook.on_start(self).await?;
        }

        Ok(outcome)
    }
}
