//! Fluent construction of schema declarations.

use crate::schema::{
    ClassLevelPermissions, DateValue, FieldOptions, FieldSpec, IndexSpec, PointerValue,
    SchemaDefinition,
};
use crate::{ClassName, FieldName, IndexName};

/// Builder for one class declaration.
///
/// ```rust
/// use converge_engine::{CloudSchema, FieldOptions, FieldSpec, IndexSpec};
///
/// let user = CloudSchema::new("User")
///     .add_string("nickname", FieldOptions::required())
///     .add_number("age", FieldOptions::optional().with_default(18.0))
///     .add_pointer("team", "Team", FieldOptions::optional())
///     .add_index("by_nickname", IndexSpec::ascending(["nickname"]))
///     .build();
///
/// assert_eq!(user.fields.len(), 3);
/// assert_eq!(user.fields["team"], FieldSpec::pointer("Team"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CloudSchema {
    definition: SchemaDefinition,
}

impl CloudSchema {
    pub fn new(class_name: impl Into<ClassName>) -> Self {
        Self {
            definition: SchemaDefinition::new(class_name),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.definition.class_name
    }

    /// Add any field; a later field with the same name replaces the earlier one.
    pub fn add_field(mut self, name: impl Into<FieldName>, spec: FieldSpec) -> Self {
        self.definition.fields.insert(name.into(), spec);
        self
    }

    pub fn add_string(self, name: impl Into<FieldName>, options: FieldOptions<String>) -> Self {
        self.add_field(name, FieldSpec::String { options })
    }

    pub fn add_number(self, name: impl Into<FieldName>, options: FieldOptions<f64>) -> Self {
        self.add_field(name, FieldSpec::Number { options })
    }

    pub fn add_boolean(self, name: impl Into<FieldName>, options: FieldOptions<bool>) -> Self {
        self.add_field(name, FieldSpec::Boolean { options })
    }

    pub fn add_date(self, name: impl Into<FieldName>, options: FieldOptions<DateValue>) -> Self {
        self.add_field(name, FieldSpec::Date { options })
    }

    pub fn add_pointer(
        self,
        name: impl Into<FieldName>,
        target_class: impl Into<ClassName>,
        options: FieldOptions<PointerValue>,
    ) -> Self {
        self.add_field(
            name,
            FieldSpec::Pointer {
                target_class: target_class.into(),
                options,
            },
        )
    }

    pub fn add_relation(
        self,
        name: impl Into<FieldName>,
        target_class: impl Into<ClassName>,
    ) -> Self {
        self.add_field(name, FieldSpec::relation(target_class))
    }

    pub fn add_index(mut self, name: impl Into<IndexName>, spec: IndexSpec) -> Self {
        self.definition.indexes.insert(name.into(), spec);
        self
    }

    pub fn set_permissions(mut self, permissions: ClassLevelPermissions) -> Self {
        self.definition.permissions = permissions;
        self
    }

    pub fn build(self) -> SchemaDefinition {
        self.definition
    }
}

impl From<CloudSchema> for SchemaDefinition {
    fn from(schema: CloudSchema) -> Self {
        schema.build()
    }
}
