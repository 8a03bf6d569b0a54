//! Read-only access to the entity and field definitions of a content model.
//!
//! The entity-definition producers never reach into a content system
//! directly: they read it through [`EntityDefinitionSource`].

mod memory;

use std::collections::BTreeSet;

use displaydoc::Display;
use indexmap::IndexMap;
pub use memory::InMemoryEntitySource;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::cacheability::CacheabilityFacts;
use crate::producer::CacheableDependency;

/// Prefix of the cache tag of every form display.
const FORM_DISPLAY_TAG_PREFIX: &str = "config:core.entity_form_display.";

/// Field types holding references to other entities.
const REFERENCE_FIELD_TYPES: &[&str] = &[
    "entity_reference",
    "entity_reference_revisions",
    "file",
    "image",
];

/// Errors raised while loading entity definitions.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum EntitySourceError {
    /// could not parse entity definitions: {0}
    Parse(#[from] serde_yaml::Error),
    /// entity type '{0}' is defined twice
    DuplicateEntityType(String),
    /// form display '{0}' is defined twice
    DuplicateFormDisplay(String),
}

/// Read-only view of an entity/content model.
pub trait EntityDefinitionSource: Send + Sync + 'static {
    fn entity_type(&self, id: &str) -> Option<&EntityTypeDefinition>;

    /// Bundles of `entity_type`, empty when the type has none or is unknown.
    fn bundles(&self, entity_type: &str) -> &[String];

    /// Field definitions of `entity_type`, in definition order: base fields
    /// first, then the fields of `bundle` when one is given.
    fn field_definitions(&self, entity_type: &str, bundle: Option<&str>) -> Vec<&FieldDefinition>;

    /// The form display `<entity_type>.<bundle>.<mode>`.
    fn form_display(&self, entity_type: &str, bundle: &str, mode: &str) -> Option<&FormDisplay>;
}

/// An entity type, e.g. `node`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntityTypeDefinition {
    pub id: String,
    pub label: String,
}

/// Which field definitions to list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldTypes {
    #[default]
    All,
    BaseFields,
    FieldConfig,
}

impl FieldTypes {
    pub fn includes(&self, field: &FieldDefinition) -> bool {
        match self {
            FieldTypes::All => true,
            FieldTypes::BaseFields => field.base_field,
            FieldTypes::FieldConfig => !field.base_field,
        }
    }
}

/// The definition of a field of an entity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    /// Machine name.
    pub id: String,

    pub label: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Field type, e.g. `string`, `boolean`, `entity_reference`.
    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default)]
    pub required: bool,

    /// Maximum number of values; `-1` for unlimited.
    #[serde(default = "default_cardinality")]
    pub cardinality: i32,

    #[serde(default = "default_status")]
    pub status: bool,

    /// Default items, e.g. `[{ value: true }]`.
    #[serde(default)]
    pub default_value: Vec<IndexMap<String, serde_json::Value>>,

    /// Whether the field is defined for every bundle of the entity type.
    #[serde(default)]
    pub base_field: bool,

    #[serde(default)]
    pub settings: IndexMap<String, serde_json::Value>,

    /// Settings that may be translated, e.g. labels of allowed values.
    #[serde(default)]
    pub translatable_settings: IndexMap<String, serde_json::Value>,
}

fn default_cardinality() -> i32 {
    1
}

fn default_status() -> bool {
    true
}

impl FieldDefinition {
    pub fn is_multiple(&self) -> bool {
        self.cardinality != 1
    }

    pub fn is_reference(&self) -> bool {
        REFERENCE_FIELD_TYPES.contains(&self.field_type.as_str())
    }

    /// The default items rendered as strings: booleans as `"1"` and `""`,
    /// numbers in decimal. Items without a `value` property are skipped.
    pub fn default_value_literals(&self) -> Vec<String> {
        self.default_value
            .iter()
            .filter_map(|item| item.get("value"))
            .map(render_literal)
            .collect()
    }
}

fn render_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Bool(true) => "1".to_string(),
        serde_json::Value::Bool(false) | serde_json::Value::Null => String::new(),
        serde_json::Value::String(string) => string.clone(),
        other => other.to_string(),
    }
}

/// Placement of one field in a form display.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormComponent {
    #[serde(default)]
    pub weight: i64,
}

/// How the fields of a bundle are arranged in a form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FormDisplay {
    /// `<entity_type>.<bundle>.<mode>`, e.g. `node.article.default`.
    pub id: String,

    /// Displayed fields by machine name.
    #[serde(default)]
    pub content: IndexMap<String, FormComponent>,

    /// Fields left out of the form.
    #[serde(default)]
    pub hidden: BTreeSet<String>,
}

impl FormDisplay {
    pub fn cache_tag(&self) -> String {
        format!("{FORM_DISPLAY_TAG_PREFIX}{}", self.id)
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        self.hidden.contains(field)
    }

    /// Weight of `field` in the form, `None` when it is not displayed.
    pub fn weight(&self, field: &str) -> Option<i64> {
        self.content.get(field).map(|component| component.weight)
    }
}

impl CacheableDependency for FormDisplay {
    fn cacheability(&self) -> CacheabilityFacts {
        CacheabilityFacts::new().with_tag(self.cache_tag())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn field(yaml: &str) -> FieldDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn fields_have_sensible_defaults() {
        let nid = field("{ id: nid, label: ID, type: integer }");
        assert_eq!(nid.cardinality, 1);
        assert!(nid.status);
        assert!(!nid.is_multiple());
        assert!(!nid.is_reference());
        assert!(nid.default_value_literals().is_empty());
    }

    #[rstest]
    #[case(json!(true), "1")]
    #[case(json!(false), "")]
    #[case(json!(42), "42")]
    #[case(json!("draft"), "draft")]
    fn default_values_render_as_strings(#[case] value: serde_json::Value, #[case] expected: &str) {
        let mut item = IndexMap::new();
        item.insert("value".to_string(), value);
        let definition = FieldDefinition {
            default_value: vec![item],
            ..field("{ id: status, label: Published, type: boolean }")
        };
        assert_eq!(definition.default_value_literals(), vec![expected.to_string()]);
    }

    #[test]
    fn unlimited_cardinality_is_multiple() {
        let tags = field("{ id: tags, label: Tags, type: entity_reference, cardinality: -1 }");
        assert!(tags.is_multiple());
        assert!(tags.is_reference());
    }

    #[test]
    fn form_displays_know_their_tag() {
        let display: FormDisplay = serde_yaml::from_str(
            "{ id: node.article.default, content: { title: { weight: -5 } }, hidden: [sticky] }",
        )
        .unwrap();
        assert_eq!(
            display.cache_tag(),
            "config:core.entity_form_display.node.article.default"
        );
        assert_eq!(display.weight("title"), Some(-5));
        assert_eq!(display.weight("nid"), None);
        assert!(display.is_hidden("sticky"));
        assert!(display.cacheability().tags().contains(&display.cache_tag()));
    }
}
