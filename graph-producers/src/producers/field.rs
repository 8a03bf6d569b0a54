use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::LANGUAGE_INTERFACE;
use crate::entity::FieldDefinition;
use crate::entity::FormDisplay;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::producer::FieldScope;
use crate::producer::Producer;
use crate::producer::ProducerError;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FieldInput {
    pub entity_definition_field: FieldDefinition,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FieldDisplayInput {
    pub entity_definition_field: FieldDefinition,
    pub entity_form_display_context: Option<FormDisplay>,
}

/// Declares a producer reading one property of a field definition.
macro_rules! field_producer {
    (
        $(#[$doc:meta])*
        $producer:ident($input:ty) as $name:literal -> $output:literal,
        |$field:ident, $scope:ident| $body:expr
    ) => {
        $(#[$doc])*
        pub struct $producer;

        #[async_trait]
        impl Producer for $producer {
            type Input = $input;
            const NAME: &'static str = $name;
            const OUTPUT: &'static str = $output;

            async fn produce(
                &self,
                $field: $input,
                $scope: &mut FieldScope,
            ) -> Result<Value, ProducerError> {
                Ok($body)
            }
        }
    };
}

field_producer!(
    /// Machine name of the field.
    EntityDefinitionFieldId(FieldInput) as "entity_definition_field_id" -> "String",
    |input, _scope| Value::from(input.entity_definition_field.id)
);

field_producer!(
    EntityDefinitionFieldLabel(FieldInput) as "entity_definition_field_label" -> "String",
    |input, scope| {
        scope.add_cache_context(LANGUAGE_INTERFACE);
        Value::from(input.entity_definition_field.label)
    }
);

field_producer!(
    EntityDefinitionFieldDescription(FieldInput) as "entity_definition_field_description" -> "String",
    |input, scope| {
        scope.add_cache_context(LANGUAGE_INTERFACE);
        input
            .entity_definition_field
            .description
            .map(Value::from)
            .unwrap_or_default()
    }
);

field_producer!(
    /// The field type, e.g. `string` or `entity_reference`.
    EntityDefinitionFieldType(FieldInput) as "entity_definition_field_type" -> "String",
    |input, _scope| Value::from(input.entity_definition_field.field_type)
);

field_producer!(
    EntityDefinitionFieldRequired(FieldInput) as "entity_definition_field_required" -> "Boolean",
    |input, _scope| Value::Bool(input.entity_definition_field.required)
);

field_producer!(
    EntityDefinitionFieldMultiple(FieldInput) as "entity_definition_field_multiple" -> "Boolean",
    |input, _scope| Value::Bool(input.entity_definition_field.is_multiple())
);

field_producer!(
    /// Cardinality of the field, `-1` when unlimited.
    EntityDefinitionFieldMaxNumItems(FieldInput) as "entity_definition_field_max_num_items" -> "Int",
    |input, _scope| Value::Number(i64::from(input.entity_definition_field.cardinality).into())
);

field_producer!(
    EntityDefinitionFieldStatus(FieldInput) as "entity_definition_field_status" -> "Boolean",
    |input, _scope| Value::Bool(input.entity_definition_field.status)
);

field_producer!(
    /// The first default value rendered as a string, `null` without one.
    EntityDefinitionFieldDefaultValue(FieldInput) as "entity_definition_field_default_value" -> "String",
    |input, _scope| {
        input
            .entity_definition_field
            .default_value_literals()
            .into_iter()
            .next()
            .map(Value::from)
            .unwrap_or_default()
    }
);

field_producer!(
    /// Every default value rendered as a string, `null` without any.
    EntityDefinitionFieldAdditionalDefaultValue(FieldInput) as "entity_definition_field_additional_default_value" -> "String[]",
    |input, _scope| {
        let literals = input.entity_definition_field.default_value_literals();
        if literals.is_empty() {
            Value::Null
        } else {
            Value::Array(literals.into_iter().map(Value::from).collect())
        }
    }
);

field_producer!(
    /// Whether the field references other entities.
    EntityDefinitionFieldReference(FieldInput) as "entity_definition_field_reference" -> "Boolean",
    |input, _scope| Value::Bool(input.entity_definition_field.is_reference())
);

field_producer!(
    /// Whether the form display hides the field. `false` without a display.
    EntityDefinitionFieldHidden(FieldDisplayInput) as "entity_definition_field_hidden" -> "Boolean",
    |input, _scope| {
        let hidden = input
            .entity_form_display_context
            .is_some_and(|display| display.is_hidden(&input.entity_definition_field.id));
        Value::Bool(hidden)
    }
);

field_producer!(
    /// Weight of the field in the form display, `0` when it is not displayed.
    EntityDefinitionFieldWeight(FieldDisplayInput) as "entity_definition_field_weight" -> "Int",
    |input, _scope| {
        let weight = input
            .entity_form_display_context
            .and_then(|display| display.weight(&input.entity_definition_field.id))
            .unwrap_or_default();
        Value::Number(weight.into())
    }
);

field_producer!(
    /// Translatable settings of the field as `{ key, value }` pairs, `null`
    /// when the field has none.
    TranslatableEntityDefinitionFieldSettings(FieldDisplayInput) as "translatable_entity_definition_field_settings" -> "KeyValue[]",
    |input, scope| {
        scope.add_cache_context(LANGUAGE_INTERFACE);
        let settings = input.entity_definition_field.translatable_settings;
        if settings.is_empty() {
            Value::Null
        } else {
            Value::Array(
                settings
                    .into_iter()
                    .map(|(key, value)| {
                        let mut pair = Object::new();
                        pair.insert("key", Value::from(key));
                        pair.insert("value", serde_json_bytes::Value::from(value));
                        Value::Object(pair)
                    })
                    .collect(),
            )
        }
    }
);
