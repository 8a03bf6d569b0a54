use std::collections::HashSet;
use std::fmt;

use schemars::JsonSchema;
use schemars::Schema;
use schemars::generate::SchemaSettings;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::RegistryError;

/// A semantic type tag, e.g. `String`, `EntityDefinition`, `FieldDefinition[]`.
///
/// Tags document what a slot expects and a producer emits; they are not
/// checked against the GraphQL schema.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub const ANY: &'static str = "Any";

    pub fn new(tag: impl Into<String>) -> Self {
        TypeTag(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(tag: &str) -> Self {
        TypeTag::new(tag)
    }
}

/// A named input of a producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSlot {
    name: String,
    type_tag: TypeTag,
    nullable: bool,
}

impl InputSlot {
    /// A slot that must receive a value.
    pub fn required(name: impl Into<String>, type_tag: impl Into<TypeTag>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            nullable: false,
        }
    }

    /// A slot that accepts `null` when its binding yields nothing.
    pub fn nullable(name: impl Into<String>, type_tag: impl Into<TypeTag>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            nullable: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// The registered signature of a producer: its name, its ordered input slots
/// and the type tag of its output. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerDescriptor {
    name: String,
    inputs: Vec<InputSlot>,
    output: TypeTag,
}

impl ProducerDescriptor {
    /// Builds a descriptor, rejecting empty names and duplicate slots.
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<InputSlot>,
        output: impl Into<TypeTag>,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidDescriptor {
                producer: name,
                reason: "the producer name is empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for slot in &inputs {
            if !seen.insert(slot.name()) {
                return Err(RegistryError::InvalidDescriptor {
                    producer: name,
                    reason: format!("input slot '{}' is declared twice", slot.name()),
                });
            }
        }

        Ok(Self {
            name,
            inputs,
            output: output.into(),
        })
    }

    /// Derives the descriptor of a producer whose inputs are the properties of `I`.
    ///
    /// Slots follow the declaration order of `I`'s fields. A slot is nullable
    /// when its property is not required (an `Option` or a defaulted field).
    pub fn from_input_type<I: JsonSchema>(
        name: impl Into<String>,
        output: impl Into<TypeTag>,
    ) -> Result<Self, RegistryError> {
        let schema = SchemaSettings::draft07()
            .into_generator()
            .into_root_schema_for::<I>();
        Self::new(name, slots_from_schema(&schema), output)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[InputSlot] {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name() == name)
    }

    pub fn output(&self) -> &TypeTag {
        &self.output
    }
}

fn slots_from_schema(schema: &Schema) -> Vec<InputSlot> {
    let Some(properties) = schema.get("properties").and_then(JsonValue::as_object) else {
        return Vec::new();
    };
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(JsonValue::as_array)
        .map(|names| names.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, property)| InputSlot {
            name: name.clone(),
            type_tag: TypeTag::new(type_tag_of(property)),
            nullable: !required.contains(name.as_str()),
        })
        .collect()
}

fn type_tag_of(property: &JsonValue) -> String {
    if let Some(reference) = property.get("$ref").and_then(JsonValue::as_str) {
        return reference
            .rsplit('/')
            .next()
            .unwrap_or(reference)
            .to_string();
    }

    match property.get("type") {
        Some(JsonValue::String(ty)) => return instance_type_tag(ty, property),
        Some(JsonValue::Array(types)) => {
            if let Some(ty) = types
                .iter()
                .filter_map(JsonValue::as_str)
                .find(|ty| *ty != "null")
            {
                return instance_type_tag(ty, property);
            }
        }
        _ => {}
    }

    for combinator in ["anyOf", "oneOf", "allOf"] {
        if let Some(branch) = property
            .get(combinator)
            .and_then(JsonValue::as_array)
            .and_then(|branches| {
                branches
                    .iter()
                    .find(|branch| branch.get("type").and_then(JsonValue::as_str) != Some("null"))
            })
        {
            return type_tag_of(branch);
        }
    }

    TypeTag::ANY.to_string()
}

fn instance_type_tag(ty: &str, property: &JsonValue) -> String {
    match ty {
        "string" => "String".to_string(),
        "integer" => "Int".to_string(),
        "number" => "Float".to_string(),
        "boolean" => "Boolean".to_string(),
        "object" => "Object".to_string(),
        "array" => {
            let item = property
                .get("items")
                .map(type_tag_of)
                .unwrap_or_else(|| TypeTag::ANY.to_string());
            format!("{item}[]")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Parent {
        id: String,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Inputs {
        entity_type: String,
        bundle: Option<String>,
        parent: Parent,
        limit: Option<i32>,
        tags: Vec<String>,
        #[serde(default)]
        include_hidden: bool,
    }

    #[test]
    fn slots_follow_the_input_struct() {
        let descriptor = ProducerDescriptor::from_input_type::<Inputs>("example", "String")
            .expect("descriptor is valid");

        let slots: Vec<(&str, &str, bool)> = descriptor
            .inputs()
            .iter()
            .map(|slot| (slot.name(), slot.type_tag().as_str(), slot.is_nullable()))
            .collect();

        assert_eq!(
            slots,
            vec![
                ("entity_type", "String", false),
                ("bundle", "String", true),
                ("parent", "Parent", false),
                ("limit", "Int", true),
                ("tags", "String[]", false),
                ("include_hidden", "Boolean", true),
            ]
        );
        assert_eq!(descriptor.output().as_str(), "String");
    }

    #[test]
    fn duplicate_slots_are_rejected() {
        let error = ProducerDescriptor::new(
            "twice",
            vec![
                InputSlot::required("value", "String"),
                InputSlot::nullable("value", "String"),
            ],
            "String",
        )
        .unwrap_err();

        assert_eq!(
            error,
            RegistryError::InvalidDescriptor {
                producer: "twice".to_string(),
                reason: "input slot 'value' is declared twice".to_string(),
            }
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert!(ProducerDescriptor::new(" ", Vec::new(), "String").is_err());
    }
}
