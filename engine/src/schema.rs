//! Schema declarations.
//!
//! A [`SchemaDefinition`] is what the application declares for one class; a
//! [`RemoteSchema`] is what the store reports back. Both share [`FieldSpec`]
//! and [`IndexSpec`] so the reconciler can compare them directly.

use crate::equality::structural_eq;
use crate::{ClassName, FieldName, IndexName};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Options shared by every field kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptions<T> {
    /// Whether a record must carry this field
    #[serde(default)]
    pub required: bool,
    /// Value the store fills in when a record omits the field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<T>,
}

impl<T> FieldOptions<T> {
    /// Optional field without a default.
    pub fn optional() -> Self {
        Self {
            required: false,
            default_value: None,
        }
    }

    /// Required field without a default.
    pub fn required() -> Self {
        Self {
            required: true,
            default_value: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, value: T) -> Self {
        self.default_value = Some(value);
        self
    }
}

impl<T> Default for FieldOptions<T> {
    fn default() -> Self {
        Self::optional()
    }
}

/// Default value of a `Date` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__type", rename = "Date")]
pub struct DateValue {
    pub iso: String,
}

/// Default value of a `File` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__type", rename = "File")]
pub struct FileValue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Default value of a `GeoPoint` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type", rename = "GeoPoint")]
pub struct GeoPointValue {
    pub latitude: f64,
    pub longitude: f64,
}

/// Default value of a `Pointer` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__type", rename = "Pointer", rename_all = "camelCase")]
pub struct PointerValue {
    pub class_name: ClassName,
    pub object_id: String,
}

/// Field definition, one variant per kind.
///
/// Serialized with the kind in a `type` tag, the shape the store speaks:
/// `{"type": "Pointer", "targetClass": "_User", "required": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldSpec {
    String {
        #[serde(flatten)]
        options: FieldOptions<String>,
    },
    Number {
        #[serde(flatten)]
        options: FieldOptions<f64>,
    },
    Boolean {
        #[serde(flatten)]
        options: FieldOptions<bool>,
    },
    Date {
        #[serde(flatten)]
        options: FieldOptions<DateValue>,
    },
    File {
        #[serde(flatten)]
        options: FieldOptions<FileValue>,
    },
    GeoPoint {
        #[serde(flatten)]
        options: FieldOptions<GeoPointValue>,
    },
    /// Closed ring of `[latitude, longitude]` pairs
    Polygon {
        #[serde(flatten)]
        options: FieldOptions<Vec<[f64; 2]>>,
    },
    Object {
        /// Declared shape of the nested object, when any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<BTreeMap<FieldName, FieldSpec>>,
        #[serde(flatten)]
        options: FieldOptions<Map<String, Value>>,
    },
    Array {
        /// Declared element kind, when any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<Box<FieldSpec>>,
        #[serde(flatten)]
        options: FieldOptions<Vec<Value>>,
    },
    Pointer {
        #[serde(rename = "targetClass")]
        target_class: ClassName,
        #[serde(flatten)]
        options: FieldOptions<PointerValue>,
    },
    Relation {
        #[serde(rename = "targetClass")]
        target_class: ClassName,
        #[serde(flatten)]
        options: FieldOptions<Value>,
    },
    /// Base64-encoded binary
    Bytes {
        #[serde(flatten)]
        options: FieldOptions<String>,
    },
    /// Access-control column; only ever reported by the store
    #[serde(rename = "ACL")]
    Acl {
        #[serde(flatten)]
        options: FieldOptions<Value>,
    },
    /// A store kind without a variant of its own, kept as reported.
    ///
    /// Only produced when decoding a [`RemoteSchema`]; declarations never
    /// carry it, so it never equals a declared field.
    #[serde(skip)]
    Other {
        kind: String,
        raw: Map<String, Value>,
    },
}

impl FieldSpec {
    pub fn string() -> Self {
        FieldSpec::String {
            options: FieldOptions::optional(),
        }
    }

    pub fn number() -> Self {
        FieldSpec::Number {
            options: FieldOptions::optional(),
        }
    }

    pub fn boolean() -> Self {
        FieldSpec::Boolean {
            options: FieldOptions::optional(),
        }
    }

    pub fn date() -> Self {
        FieldSpec::Date {
            options: FieldOptions::optional(),
        }
    }

    pub fn file() -> Self {
        FieldSpec::File {
            options: FieldOptions::optional(),
        }
    }

    pub fn geo_point() -> Self {
        FieldSpec::GeoPoint {
            options: FieldOptions::optional(),
        }
    }

    pub fn polygon() -> Self {
        FieldSpec::Polygon {
            options: FieldOptions::optional(),
        }
    }

    pub fn object() -> Self {
        FieldSpec::Object {
            schema: None,
            options: FieldOptions::optional(),
        }
    }

    pub fn array() -> Self {
        FieldSpec::Array {
            schema: None,
            options: FieldOptions::optional(),
        }
    }

    pub fn bytes() -> Self {
        FieldSpec::Bytes {
            options: FieldOptions::optional(),
        }
    }

    pub fn pointer(target_class: impl Into<ClassName>) -> Self {
        FieldSpec::Pointer {
            target_class: target_class.into(),
            options: FieldOptions::optional(),
        }
    }

    pub fn relation(target_class: impl Into<ClassName>) -> Self {
        FieldSpec::Relation {
            target_class: target_class.into(),
            options: FieldOptions::optional(),
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.set_required(true);
        self
    }

    /// Whether records must carry this field.
    pub fn is_required(&self) -> bool {
        match self {
            FieldSpec::String { options } => options.required,
            FieldSpec::Number { options } => options.required,
            FieldSpec::Boolean { options } => options.required,
            FieldSpec::Date { options } => options.required,
            FieldSpec::File { options } => options.required,
            FieldSpec::GeoPoint { options } => options.required,
            FieldSpec::Polygon { options } => options.required,
            FieldSpec::Object { options, .. } => options.required,
            FieldSpec::Array { options, .. } => options.required,
            FieldSpec::Pointer { options, .. } => options.required,
            FieldSpec::Relation { options, .. } => options.required,
            FieldSpec::Bytes { options } => options.required,
            FieldSpec::Acl { options } => options.required,
            FieldSpec::Other { raw, .. } => {
                raw.get("required").and_then(Value::as_bool).unwrap_or(false)
            }
        }
    }

    fn set_required(&mut self, required: bool) {
        match self {
            FieldSpec::String { options } => options.required = required,
            FieldSpec::Number { options } => options.required = required,
            FieldSpec::Boolean { options } => options.required = required,
            FieldSpec::Date { options } => options.required = required,
            FieldSpec::File { options } => options.required = required,
            FieldSpec::GeoPoint { options } => options.required = required,
            FieldSpec::Polygon { options } => options.required = required,
            FieldSpec::Object { options, .. } => options.required = required,
            FieldSpec::Array { options, .. } => options.required = required,
            FieldSpec::Pointer { options, .. } => options.required = required,
            FieldSpec::Relation { options, .. } => options.required = required,
            FieldSpec::Bytes { options } => options.required = required,
            FieldSpec::Acl { options } => options.required = required,
            FieldSpec::Other { raw, .. } => {
                raw.insert("required".into(), Value::Bool(required));
            }
        }
    }

    /// The kind name, as the store spells it.
    pub fn kind(&self) -> &str {
        match self {
            FieldSpec::String { .. } => "String",
            FieldSpec::Number { .. } => "Number",
            FieldSpec::Boolean { .. } => "Boolean",
            FieldSpec::Date { .. } => "Date",
            FieldSpec::File { .. } => "File",
            FieldSpec::GeoPoint { .. } => "GeoPoint",
            FieldSpec::Polygon { .. } => "Polygon",
            FieldSpec::Object { .. } => "Object",
            FieldSpec::Array { .. } => "Array",
            FieldSpec::Pointer { .. } => "Pointer",
            FieldSpec::Relation { .. } => "Relation",
            FieldSpec::Bytes { .. } => "Bytes",
            FieldSpec::Acl { .. } => "ACL",
            FieldSpec::Other { kind, .. } => kind,
        }
    }

    /// Target class of a `Pointer` or `Relation`.
    pub fn target_class(&self) -> Option<&str> {
        match self {
            FieldSpec::Pointer { target_class, .. } | FieldSpec::Relation { target_class, .. } => {
                Some(target_class)
            }
            _ => None,
        }
    }
}

impl FieldSpec {
    /// Decode one field as the store reports it.
    ///
    /// Unlike `Deserialize`, this never fails: a kind that does not decode
    /// becomes [`FieldSpec::Other`], so one unfamiliar column cannot hide the
    /// rest of the listing.
    pub fn from_remote(raw: Map<String, Value>) -> Self {
        match serde_json::from_value(Value::Object(raw.clone())) {
            Ok(spec) => spec,
            Err(err) => {
                let kind = raw
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                tracing::warn!(kind = %kind, error = %err, "unrecognised remote field kind");
                FieldSpec::Other { kind, raw }
            }
        }
    }
}

/// Deserialize a remote field map through [`FieldSpec::from_remote`].
fn remote_fields<'de, D>(deserializer: D) -> Result<BTreeMap<FieldName, FieldSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<FieldName, Map<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, field)| (name, FieldSpec::from_remote(field)))
        .collect())
}

impl std::fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target_class() {
            Some(target) => write!(f, "{}<{}>", self.kind(), target),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Store-specific index descriptor.
///
/// Opaque to the reconciler; two descriptors are the same index when their
/// values are structurally equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexSpec(Value);

impl IndexSpec {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Ascending index over `fields`, in order.
    pub fn ascending<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let keys: Map<String, Value> = fields
            .into_iter()
            .map(|field| (field.to_string(), Value::from(1)))
            .collect();
        Self(Value::Object(keys))
    }
}

impl PartialEq for IndexSpec {
    fn eq(&self, other: &Self) -> bool {
        structural_eq(&self.0, &other.0)
    }
}

/// What one entry of an operation's access map grants.
///
/// Principals (`"*"`, a user id, `"role:Name"`) and `requiresAuthentication`
/// map to a flag; `pointerFields` maps to the pointer columns whose target
/// user is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grant {
    Flag(bool),
    Fields(Vec<FieldName>),
}

impl From<bool> for Grant {
    fn from(allowed: bool) -> Self {
        Grant::Flag(allowed)
    }
}

/// Access map of one operation.
pub type Access = BTreeMap<String, Grant>;

/// Class-level permissions attached to a class.
///
/// Keys without a field of their own are kept in `extra` and sent back
/// unchanged, so a declaration never loses a rule on its way to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassLevelPermissions {
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub find: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub get: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub count: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub create: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub update: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub delete: Access,
    #[serde(default, skip_serializing_if = "Access::is_empty")]
    pub add_field: Access,
    /// Pointer columns whose user may read the record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_user_fields: Vec<FieldName>,
    /// Pointer columns whose user may write the record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_user_fields: Vec<FieldName>,
    /// Principal to the fields hidden from it
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub protected_fields: BTreeMap<String, Vec<FieldName>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClassLevelPermissions {
    /// Everyone may read and write, nobody may add fields at runtime.
    pub fn public() -> Self {
        let everyone: Access = [("*".to_string(), Grant::Flag(true))].into_iter().collect();
        Self {
            find: everyone.clone(),
            get: everyone.clone(),
            count: everyone.clone(),
            create: everyone.clone(),
            update: everyone.clone(),
            delete: everyone,
            ..Self::default()
        }
    }

    /// True when no operation carries an explicit policy.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Local declaration of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    /// Unique class name
    pub class_name: ClassName,
    /// Field definitions by name
    #[serde(default)]
    pub fields: BTreeMap<FieldName, FieldSpec>,
    /// Index definitions by name
    #[serde(default)]
    pub indexes: BTreeMap<IndexName, IndexSpec>,
    /// Class-level permissions
    #[serde(
        default,
        rename = "classLevelPermissions",
        skip_serializing_if = "ClassLevelPermissions::is_empty"
    )]
    pub permissions: ClassLevelPermissions,
}

impl SchemaDefinition {
    /// Create an empty definition.
    pub fn new(class_name: impl Into<ClassName>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
            indexes: BTreeMap::new(),
            permissions: ClassLevelPermissions::default(),
        }
    }
}

/// A class as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSchema {
    pub class_name: ClassName,
    #[serde(default, deserialize_with = "remote_fields")]
    pub fields: BTreeMap<FieldName, FieldSpec>,
    #[serde(default)]
    pub indexes: BTreeMap<IndexName, IndexSpec>,
}

impl RemoteSchema {
    /// Create an empty remote schema.
    pub fn new(class_name: impl Into<ClassName>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Builder-style method to add a field.
    pub fn with_field(mut self, name: impl Into<FieldName>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Builder-style method to add an index.
    pub fn with_index(mut self, name: impl Into<IndexName>, spec: IndexSpec) -> Self {
        self.indexes.insert(name.into(), spec);
        self
    }
}

impl From<&SchemaDefinition> for RemoteSchema {
    fn from(definition: &SchemaDefinition) -> Self {
        Self {
            class_name: definition.class_name.clone(),
            fields: definition.fields.clone(),
            indexes: definition.indexes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_spec_wire_shape() {
        let spec = FieldSpec::pointer("_User").required();
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({"type": "Pointer", "targetClass": "_User", "required": true})
        );
    }

    #[test]
    fn field_spec_from_store_payload() {
        let spec: FieldSpec =
            serde_json::from_value(json!({"type": "Number", "defaultValue": 3})).unwrap();
        assert_eq!(
            spec,
            FieldSpec::Number {
                options: FieldOptions::optional().with_default(3.0)
            }
        );

        let spec: FieldSpec = serde_json::from_value(json!({"type": "ACL"})).unwrap();
        assert_eq!(spec.kind(), "ACL");
    }

    #[test]
    fn typed_defaults_deserialize() {
        let spec: FieldSpec = serde_json::from_value(json!({
            "type": "Date",
            "defaultValue": {"__type": "Date", "iso": "2024-01-01T00:00:00.000Z"}
        }))
        .unwrap();
        assert_eq!(
            spec,
            FieldSpec::Date {
                options: FieldOptions::optional().with_default(DateValue {
                    iso: "2024-01-01T00:00:00.000Z".into()
                })
            }
        );
    }

    #[test]
    fn nested_object_schema() {
        let spec: FieldSpec = serde_json::from_value(json!({
            "type": "Object",
            "schema": {"street": {"type": "String"}, "zip": {"type": "Number", "required": true}}
        }))
        .unwrap();
        let FieldSpec::Object { schema: Some(schema), .. } = spec else {
            panic!("expected object with schema");
        };
        assert_eq!(schema["street"], FieldSpec::string());
        assert_eq!(schema["zip"], FieldSpec::number().required());
    }

    #[test]
    fn kind_change_is_inequality() {
        assert_ne!(FieldSpec::number(), FieldSpec::string());
        assert_ne!(FieldSpec::pointer("A"), FieldSpec::pointer("B"));
        assert_ne!(FieldSpec::string(), FieldSpec::string().required());
        assert_eq!(FieldSpec::relation("A"), FieldSpec::relation("A"));
    }

    #[test]
    fn missing_required_reads_as_optional() {
        let spec: FieldSpec = serde_json::from_value(json!({"type": "String"})).unwrap();
        assert_eq!(spec, FieldSpec::string());
        assert!(!spec.is_required());
    }

    #[test]
    fn field_spec_display() {
        assert_eq!(FieldSpec::string().to_string(), "String");
        assert_eq!(FieldSpec::relation("Post").to_string(), "Relation<Post>");
    }

    #[test]
    fn index_spec_structural() {
        let a = IndexSpec::ascending(["name", "age"]);
        let b = IndexSpec::new(json!({"age": 1, "name": 1.0}));
        assert_eq!(a, b);
        assert_ne!(a, IndexSpec::new(json!({"name": 1})));
    }

    #[test]
    fn definition_serialization() {
        let mut definition = SchemaDefinition::new("User");
        definition
            .fields
            .insert("nickname".into(), FieldSpec::string());
        definition
            .indexes
            .insert("by_nickname".into(), IndexSpec::ascending(["nickname"]));
        definition.permissions = ClassLevelPermissions::public();

        let json = serde_json::to_string(&definition).unwrap();
        let parsed: SchemaDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(definition, parsed);
        assert!(json.contains("classLevelPermissions"));
    }

    #[test]
    fn remote_schema_ignores_unknown_keys() {
        let remote: RemoteSchema = serde_json::from_value(json!({
            "className": "User",
            "fields": {"objectId": {"type": "String"}, "ACL": {"type": "ACL"}},
            "classLevelPermissions": {"find": {"*": true}}
        }))
        .unwrap();
        assert_eq!(remote.fields.len(), 2);
        assert!(remote.indexes.is_empty());
    }

    #[test]
    fn bytes_field_decodes() {
        let spec: FieldSpec = serde_json::from_value(json!({"type": "Bytes"})).unwrap();
        assert_eq!(spec, FieldSpec::bytes());
        assert_eq!(spec.kind(), "Bytes");
    }

    #[test]
    fn unknown_remote_kind_is_kept_not_rejected() {
        let raw = json!({"type": "Vector", "dimensions": 3, "required": true});
        let Value::Object(raw) = raw else { unreachable!() };

        assert!(serde_json::from_value::<FieldSpec>(Value::Object(raw.clone())).is_err());

        let spec = FieldSpec::from_remote(raw);
        assert_eq!(spec.kind(), "Vector");
        assert!(spec.is_required());
        assert_ne!(spec, FieldSpec::string());
        assert_eq!(spec.to_string(), "Vector");
    }

    #[test]
    fn remote_schema_tolerates_unknown_kinds() {
        let remote: RemoteSchema = serde_json::from_value(json!({
            "className": "Blob",
            "fields": {
                "payload": {"type": "Vector"},
                "data": {"type": "Bytes"},
                "label": {"type": "String"}
            }
        }))
        .unwrap();
        assert_eq!(remote.fields.len(), 3);
        assert!(matches!(&remote.fields["payload"], FieldSpec::Other { kind, .. } if kind == "Vector"));
        assert_eq!(remote.fields["data"], FieldSpec::bytes());
        assert_eq!(remote.fields["label"], FieldSpec::string());
    }

    #[test]
    fn permissions_keep_pointer_and_user_field_rules() {
        let payload = json!({
            "find": {"*": true, "requiresAuthentication": true},
            "get": {"pointerFields": ["owner"]},
            "readUserFields": ["owner"],
            "writeUserFields": ["owner", "editor"],
            "protectedFields": {"*": ["email"]},
            "customRule": {"enabled": true}
        });
        let permissions: ClassLevelPermissions = serde_json::from_value(payload.clone()).unwrap();

        assert_eq!(permissions.find["*"], Grant::Flag(true));
        assert_eq!(
            permissions.get["pointerFields"],
            Grant::Fields(vec!["owner".into()])
        );
        assert_eq!(permissions.read_user_fields, vec!["owner"]);
        assert_eq!(permissions.write_user_fields, vec!["owner", "editor"]);
        assert_eq!(permissions.extra["customRule"], json!({"enabled": true}));
        assert_eq!(serde_json::to_value(&permissions).unwrap(), payload);
    }
}
