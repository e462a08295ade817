//! Class lifecycle triggers.

use crate::error::{Error, Result};
use crate::ClassName;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Points in a record's lifecycle a trigger can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
    BeforeFind,
    AfterFind,
    BeforeLogin,
    AfterLogin,
    AfterLogout,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 9] = [
        LifecycleEvent::BeforeSave,
        LifecycleEvent::AfterSave,
        LifecycleEvent::BeforeDelete,
        LifecycleEvent::AfterDelete,
        LifecycleEvent::BeforeFind,
        LifecycleEvent::AfterFind,
        LifecycleEvent::BeforeLogin,
        LifecycleEvent::AfterLogin,
        LifecycleEvent::AfterLogout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::BeforeSave => "beforeSave",
            LifecycleEvent::AfterSave => "afterSave",
            LifecycleEvent::BeforeDelete => "beforeDelete",
            LifecycleEvent::AfterDelete => "afterDelete",
            LifecycleEvent::BeforeFind => "beforeFind",
            LifecycleEvent::AfterFind => "afterFind",
            LifecycleEvent::BeforeLogin => "beforeLogin",
            LifecycleEvent::AfterLogin => "afterLogin",
            LifecycleEvent::AfterLogout => "afterLogout",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LifecycleEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| Error::UnknownLifecycleEvent(s.to_string()))
    }
}

/// Input handed to a trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRequest {
    pub class_name: ClassName,
    pub event: LifecycleEvent,
    /// The record as it is being written or was read
    pub object: Value,
    /// The record before the change, for updates
    pub original: Option<Value>,
}

/// A registered trigger callback.
pub type TriggerHandler =
    Arc<dyn Fn(TriggerRequest) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async closure as a [`TriggerHandler`].
pub fn trigger_handler<F, Fut>(f: F) -> TriggerHandler
where
    F: Fn(TriggerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |request| -> BoxFuture<'static, Result<Value>> { Box::pin(f(request)) })
}

/// Triggers keyed by `(class, event)`.
#[derive(Default)]
pub struct TriggerTable {
    handlers: RwLock<HashMap<(ClassName, LifecycleEvent), TriggerHandler>>,
}

impl std::fmt::Debug for TriggerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = handlers.keys().collect();
        keys.sort();
        f.debug_struct("TriggerTable").field("handlers", &keys).finish()
    }
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one trigger; returns true when it replaced an earlier one.
    pub fn register(
        &self,
        class_name: impl Into<ClassName>,
        event: LifecycleEvent,
        handler: TriggerHandler,
    ) -> bool {
        let class_name = class_name.into();
        tracing::debug!(class = %class_name, %event, "trigger registered");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((class_name, event), handler)
            .is_some()
    }

    /// Register a set of triggers for one class by event name.
    ///
    /// Every name is validated first; nothing is stored if any is unknown.
    pub fn register_set<'a>(
        &self,
        class_name: &str,
        set: impl IntoIterator<Item = (&'a str, TriggerHandler)>,
    ) -> Result<()> {
        let parsed = set
            .into_iter()
            .map(|(name, handler)| Ok((name.parse::<LifecycleEvent>()?, handler)))
            .collect::<Result<Vec<_>>>()?;
        for (event, handler) in parsed {
            self.register(class_name, event, handler);
        }
        Ok(())
    }

    pub fn get(&self, class_name: &str, event: LifecycleEvent) -> Option<TriggerHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(class_name.to_string(), event))
            .cloned()
    }

    /// Run the trigger for the request's class and event, if one exists.
    pub async fn run(&self, request: TriggerRequest) -> Result<Option<Value>> {
        let Some(handler) = self.get(&request.class_name, request.event) else {
            return Ok(None);
        };
        handler(request).await.map(Some)
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> TriggerHandler {
        trigger_handler(|request: TriggerRequest| async move { Ok(request.object) })
    }

    #[test]
    fn event_names_round_trip() {
        for event in LifecycleEvent::ALL {
            assert_eq!(event.as_str().parse::<LifecycleEvent>().unwrap(), event);
        }
        assert!(matches!(
            "beforeExplode".parse::<LifecycleEvent>(),
            Err(Error::UnknownLifecycleEvent(name)) if name == "beforeExplode"
        ));
    }

    #[test]
    fn set_is_validated_before_storing() {
        let table = TriggerTable::new();
        let result = table.register_set("Post", [("beforeSave", echo()), ("beforeExplode", echo())]);
        assert!(result.is_err());
        assert!(table.is_empty());

        table
            .register_set("Post", [("beforeSave", echo()), ("afterDelete", echo())])
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get("Post", LifecycleEvent::AfterDelete).is_some());
        assert!(table.get("Post", LifecycleEvent::AfterSave).is_none());
    }

    #[tokio::test]
    async fn run_dispatches_by_class_and_event() {
        let table = TriggerTable::new();
        table.register(
            "Post",
            LifecycleEvent::BeforeSave,
            trigger_handler(|request: TriggerRequest| async move {
                let mut object = request.object;
                object["slug"] = json!("hello-world");
                Ok(object)
            }),
        );

        let request = TriggerRequest {
            class_name: "Post".into(),
            event: LifecycleEvent::BeforeSave,
            object: json!({"title": "Hello world"}),
            original: None,
        };
        let result = table.run(request.clone()).await.unwrap().unwrap();
        assert_eq!(result["slug"], "hello-world");

        let other = TriggerRequest {
            class_name: "Comment".into(),
            ..request
        };
        assert_eq!(table.run(other).await.unwrap(), None);
    }
}
