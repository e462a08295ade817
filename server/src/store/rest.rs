//! Schema store backed by a REST schema API.

use async_trait::async_trait;
use converge_engine::{ClassChanges, Error, RemoteSchema, Result, SchemaDefinition, SchemaStore};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::StoreConfig;

const APP_ID_HEADER: &str = "X-Parse-Application-Id";
const MASTER_KEY_HEADER: &str = "X-Parse-Master-Key";

/// `GET /schemas` response body.
#[derive(Debug, Deserialize)]
struct SchemaList {
    results: Vec<RemoteSchema>,
}

/// [`SchemaStore`] speaking the store's REST schema API with master-key
/// credentials.
#[derive(Debug, Clone)]
pub struct RestSchemaStore {
    client: Client,
    base_url: String,
    app_id: String,
    master_key: String,
}

impl RestSchemaStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            master_key: config.master_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(APP_ID_HEADER, &self.app_id)
            .header(MASTER_KEY_HEADER, &self.master_key)
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// store errors.
    async fn send(
        &self,
        operation: &'static str,
        class_name: Option<&str>,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| Error::store(operation, class_name, err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), %body, "store rejected request");
        Err(Error::store(
            operation,
            class_name,
            format!("HTTP {}: {}", status.as_u16(), body),
        ))
    }
}

#[async_trait]
impl SchemaStore for RestSchemaStore {
    async fn list_all(&self) -> Result<Vec<RemoteSchema>> {
        let request = self.client.get(self.url("schemas"));
        let response = self.send("listAll", None, request).await?;
        let list: SchemaList = response
            .json()
            .await
            .map_err(|err| Error::store("listAll", None, err.to_string()))?;
        Ok(list.results)
    }

    async fn purge(&self, class_name: &str) -> Result<()> {
        let request = self.client.delete(self.url(&format!("purge/{class_name}")));
        self.send("purge", Some(class_name), request).await?;
        Ok(())
    }

    async fn delete_class(&self, class_name: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("schemas/{class_name}")));
        self.send("deleteClass", Some(class_name), request).await?;
        Ok(())
    }

    async fn save(&self, definition: &SchemaDefinition) -> Result<()> {
        let class_name = definition.class_name.as_str();
        let request = self
            .client
            .post(self.url(&format!("schemas/{class_name}")))
            .json(definition);
        self.send("save", Some(class_name), request).await?;
        Ok(())
    }

    async fn commit(&self, changes: &ClassChanges) -> Result<()> {
        let class_name = changes.class_name();
        let request = self
            .client
            .put(self.url(&format!("schemas/{class_name}")))
            .json(&update_body(changes)?);
        self.send("commit", Some(class_name), request).await?;
        Ok(())
    }
}

/// Body of a schema update: additions carry their definition, deletions the
/// delete operator.
fn update_body(changes: &ClassChanges) -> Result<Value> {
    let class_name = changes.class_name();

    let mut fields = Map::new();
    for name in changes.deleted_fields() {
        fields.insert(name.clone(), delete_op());
    }
    for (name, spec) in changes.added_fields() {
        fields.insert(name.clone(), encode(class_name, spec)?);
    }

    let mut indexes = Map::new();
    for name in changes.deleted_indexes() {
        indexes.insert(name.clone(), delete_op());
    }
    for (name, spec) in changes.added_indexes() {
        indexes.insert(name.clone(), encode(class_name, spec)?);
    }

    let mut body = Map::new();
    body.insert("className".into(), Value::from(class_name));
    if !fields.is_empty() {
        body.insert("fields".into(), Value::Object(fields));
    }
    if !indexes.is_empty() {
        body.insert("indexes".into(), Value::Object(indexes));
    }
    Ok(Value::Object(body))
}

fn encode<T: Serialize>(class_name: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| Error::store("commit", Some(class_name), err.to_string()))
}

fn delete_op() -> Value {
    json!({"__op": "Delete"})
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_engine::{FieldSpec, IndexSpec};

    #[test]
    fn update_body_encodes_deletes_and_adds() {
        let mut changes = ClassChanges::new("Post");
        changes
            .delete_field("legacy")
            .add_field("title", FieldSpec::string().required())
            .delete_index("stale")
            .add_index("by_title", IndexSpec::ascending(["title"]));

        assert_eq!(
            update_body(&changes).unwrap(),
            json!({
                "className": "Post",
                "fields": {
                    "legacy": {"__op": "Delete"},
                    "title": {"type": "String", "required": true}
                },
                "indexes": {
                    "stale": {"__op": "Delete"},
                    "by_title": {"title": 1}
                }
            })
        );
    }

    #[test]
    fn update_body_omits_untouched_tiers() {
        let mut changes = ClassChanges::new("Post");
        changes.delete_field("legacy");
        assert_eq!(
            update_body(&changes).unwrap(),
            json!({"className": "Post", "fields": {"legacy": {"__op": "Delete"}}})
        );
    }

    #[test]
    fn url_joins_base() {
        let store = RestSchemaStore::new(&StoreConfig {
            url: "http://localhost:1337/parse/".into(),
            app_id: "app".into(),
            master_key: "secret".into(),
        });
        assert_eq!(store.url("schemas/Post"), "http://localhost:1337/parse/schemas/Post");
    }

    #[tokio::test]
    async fn transport_failure_is_store_error() {
        let store = RestSchemaStore::new(&StoreConfig {
            url: "http://127.0.0.1:1".into(),
            app_id: "app".into(),
            master_key: "secret".into(),
        });
        let err = store.purge("Post").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Store { operation: "purge", class_name: Some(ref name), .. } if name == "Post"
        ));
    }

    #[test]
    fn listing_with_unfamiliar_kinds_still_parses() {
        let list: SchemaList = serde_json::from_value(serde_json::json!({
            "results": [
                {"className": "Post", "fields": {"title": {"type": "String"}}},
                {"className": "Blob", "fields": {
                    "data": {"type": "Bytes"},
                    "payload": {"type": "Vector"}
                }}
            ]
        }))
        .unwrap();

        assert_eq!(list.results.len(), 2);
        assert_eq!(list.results[0].fields["title"], FieldSpec::string());
        assert_eq!(list.results[1].fields["data"], FieldSpec::bytes());
        assert_eq!(list.results[1].fields["payload"].kind(), "Vector");
    }
}
