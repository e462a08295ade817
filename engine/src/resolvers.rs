//! Field resolvers for custom types.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

/// Input handed to a resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverRequest {
    /// Type of the object whose field is being resolved
    pub parent_type: String,
    pub parent: Value,
    pub args: Value,
}

/// A registered resolver callback.
pub type ResolverHandler =
    Arc<dyn Fn(ResolverRequest) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async closure as a [`ResolverHandler`].
pub fn resolver_handler<F, Fut>(f: F) -> ResolverHandler
where
    F: Fn(ResolverRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |request| -> BoxFuture<'static, Result<Value>> { Box::pin(f(request)) })
}

/// Resolvers keyed by type name, then field name.
#[derive(Default)]
pub struct ResolverTable {
    handlers: RwLock<HashMap<String, HashMap<String, ResolverHandler>>>,
}

impl std::fmt::Debug for ResolverTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = handlers
            .iter()
            .flat_map(|(type_name, fields)| fields.keys().map(move |f| format!("{type_name}.{f}")))
            .collect();
        keys.sort();
        f.debug_struct("ResolverTable").field("handlers", &keys).finish()
    }
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_name: &str, field: &str, handler: ResolverHandler) {
        tracing::debug!(type_name, field, "resolver registered");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), handler);
    }

    /// Register every field resolver of one type.
    pub fn register_set<'a>(
        &self,
        type_name: &str,
        set: impl IntoIterator<Item = (&'a str, ResolverHandler)>,
    ) {
        for (field, handler) in set {
            self.register(type_name, field, handler);
        }
    }

    /// Resolve `type_name.field` for a request.
    ///
    /// Fails with [`Error::InvalidResolver`] when the request comes from a
    /// different parent type than the resolver was declared against.
    pub async fn resolve(
        &self,
        type_name: &str,
        field: &str,
        request: ResolverRequest,
    ) -> Result<Value> {
        if request.parent_type != type_name {
            return Err(Error::InvalidResolver {
                type_name: type_name.to_string(),
                parent_type: request.parent_type,
            });
        }

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .and_then(|fields| fields.get(field))
            .cloned()
            .ok_or_else(|| Error::ResolverNotFound {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })?;

        handler(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> ResolverTable {
        let table = ResolverTable::new();
        table.register_set(
            "User",
            [(
                "displayName",
                resolver_handler(|request: ResolverRequest| async move {
                    let name = request.parent["name"].as_str().unwrap_or_default().to_uppercase();
                    Ok(json!(name))
                }),
            )],
        );
        table
    }

    #[tokio::test]
    async fn resolves_declared_field() {
        let request = ResolverRequest {
            parent_type: "User".into(),
            parent: json!({"name": "ada"}),
            args: json!({}),
        };
        let value = table().resolve("User", "displayName", request).await.unwrap();
        assert_eq!(value, json!("ADA"));
    }

    #[tokio::test]
    async fn wrong_parent_type_is_invalid_resolver() {
        let request = ResolverRequest {
            parent_type: "Post".into(),
            parent: json!({}),
            args: json!({}),
        };
        let err = table()
            .resolve("User", "displayName", request)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResolver { ref parent_type, .. } if parent_type == "Post"));
        assert_eq!(err.code(), Some(crate::error::INVALID_RESOLVER_CODE));
    }

    #[tokio::test]
    async fn missing_field() {
        let request = ResolverRequest {
            parent_type: "User".into(),
            parent: json!({}),
            args: json!({}),
        };
        let err = table().resolve("User", "age", request).await.unwrap_err();
        assert!(matches!(err, Error::ResolverNotFound { .. }));
    }
}
