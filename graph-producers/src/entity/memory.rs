use indexmap::IndexMap;
use serde::Deserialize;

use super::EntityDefinitionSource;
use super::EntitySourceError;
use super::EntityTypeDefinition;
use super::FieldDefinition;
use super::FormDisplay;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Definitions {
    #[serde(default)]
    entity_types: Vec<EntityTypeEntry>,
    #[serde(default)]
    form_displays: Vec<FormDisplay>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityTypeEntry {
    id: String,
    label: String,
    #[serde(default)]
    bundles: Vec<String>,
    /// Base fields, shared by every bundle.
    #[serde(default)]
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    bundle_fields: IndexMap<String, Vec<FieldDefinition>>,
}

#[derive(Debug)]
struct EntityType {
    definition: EntityTypeDefinition,
    bundles: Vec<String>,
    base_fields: Vec<FieldDefinition>,
    bundle_fields: IndexMap<String, Vec<FieldDefinition>>,
}

/// An [`EntityDefinitionSource`] holding its definitions in memory, usually
/// loaded from a YAML or JSON document:
///
/// ```yaml
/// entity_types:
///   - id: node
///     label: Content
///     bundles: [article]
///     fields:
///       - { id: title, label: Title, type: string, required: true, base_field: true }
///     bundle_fields:
///       article:
///         - { id: body, label: Body, type: text_with_summary }
/// form_displays:
///   - id: node.article.default
///     content:
///       title: { weight: -5 }
///     hidden: [body]
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEntitySource {
    entity_types: IndexMap<String, EntityType>,
    form_displays: IndexMap<String, FormDisplay>,
}

impl InMemoryEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads definitions from YAML. JSON documents are valid YAML too.
    pub fn from_yaml(raw: &str) -> Result<Self, EntitySourceError> {
        let definitions: Definitions = serde_yaml::from_str(raw)?;
        let mut source = Self::new();
        for entry in definitions.entity_types {
            if source.entity_types.contains_key(&entry.id) {
                return Err(EntitySourceError::DuplicateEntityType(entry.id));
            }
            source.entity_types.insert(
                entry.id.clone(),
                EntityType {
                    definition: EntityTypeDefinition {
                        id: entry.id,
                        label: entry.label,
                    },
                    bundles: entry.bundles,
                    base_fields: entry.fields,
                    bundle_fields: entry.bundle_fields,
                },
            );
        }
        for display in definitions.form_displays {
            if source.form_displays.contains_key(&display.id) {
                return Err(EntitySourceError::DuplicateFormDisplay(display.id));
            }
            source.form_displays.insert(display.id.clone(), display);
        }
        tracing::debug!(
            entity_types = source.entity_types.len(),
            form_displays = source.form_displays.len(),
            "loaded entity definitions"
        );
        Ok(source)
    }
}

impl EntityDefinitionSource for InMemoryEntitySource {
    fn entity_type(&self, id: &str) -> Option<&EntityTypeDefinition> {
        self.entity_types.get(id).map(|entity_type| &entity_type.definition)
    }

    fn bundles(&self, entity_type: &str) -> &[String] {
        self.entity_types
            .get(entity_type)
            .map(|entity_type| entity_type.bundles.as_slice())
            .unwrap_or_default()
    }

    fn field_definitions(&self, entity_type: &str, bundle: Option<&str>) -> Vec<&FieldDefinition> {
        let Some(entity_type) = self.entity_types.get(entity_type) else {
            return Vec::new();
        };
        let bundle_fields = bundle
            .and_then(|bundle| entity_type.bundle_fields.get(bundle))
            .into_iter()
            .flatten();
        entity_type.base_fields.iter().chain(bundle_fields).collect()
    }

    fn form_display(&self, entity_type: &str, bundle: &str, mode: &str) -> Option<&FormDisplay> {
        self.form_displays
            .get(&format!("{entity_type}.{bundle}.{mode}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = r#"
entity_types:
  - id: node
    label: Content
    bundles: [article, page]
    fields:
      - { id: nid, label: ID, type: integer, base_field: true }
      - { id: title, label: Title, type: string, required: true, base_field: true }
    bundle_fields:
      article:
        - { id: tags, label: Tags, type: entity_reference, cardinality: -1 }
form_displays:
  - id: node.article.default
    content:
      title: { weight: -5 }
"#;

    fn ids(fields: Vec<&FieldDefinition>) -> Vec<&str> {
        fields.into_iter().map(|field| field.id.as_str()).collect()
    }

    #[test]
    fn lists_base_fields_before_bundle_fields() {
        let source = InMemoryEntitySource::from_yaml(DEFINITIONS).unwrap();
        assert_eq!(ids(source.field_definitions("node", None)), vec!["nid", "title"]);
        assert_eq!(
            ids(source.field_definitions("node", Some("article"))),
            vec!["nid", "title", "tags"]
        );
        assert_eq!(
            ids(source.field_definitions("node", Some("page"))),
            vec!["nid", "title"]
        );
        assert!(source.field_definitions("user", None).is_empty());
    }

    #[test]
    fn looks_up_types_bundles_and_displays() {
        let source = InMemoryEntitySource::from_yaml(DEFINITIONS).unwrap();
        assert_eq!(source.entity_type("node").unwrap().label, "Content");
        assert!(source.entity_type("user").is_none());
        assert_eq!(source.bundles("node"), ["article", "page"]);
        assert!(source.bundles("user").is_empty());
        assert!(source.form_display("node", "article", "default").is_some());
        assert!(source.form_display("node", "page", "default").is_none());
    }

    #[test]
    fn rejects_duplicates_and_unknown_keys() {
        let duplicated = "entity_types: [{ id: node, label: A }, { id: node, label: B }]";
        assert!(matches!(
            InMemoryEntitySource::from_yaml(duplicated),
            Err(EntitySourceError::DuplicateEntityType(id)) if id == "node"
        ));
        assert!(matches!(
            InMemoryEntitySource::from_yaml("views: []"),
            Err(EntitySourceError::Parse(_))
        ));
    }
}
