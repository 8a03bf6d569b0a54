use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::BUNDLE_CONTEXT;
use super::FIELD_TYPES_CONTEXT;
use super::FORM_DISPLAY_CONTEXT;
use super::LANGUAGE_INTERFACE;
use super::to_value;
use crate::entity::EntityDefinitionSource;
use crate::entity::EntityTypeDefinition;
use crate::entity::FieldTypes;
use crate::json_ext::Value;
use crate::producer::FieldScope;
use crate::producer::Producer;
use crate::producer::ProducerError;

const ENTITY_TYPES_TAG: &str = "entity_types";
const ENTITY_FIELD_INFO_TAG: &str = "entity_field_info";
const DEFAULT_FORM_MODE: &str = "default";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityDefinitionInput {
    pub entity_type: String,
    pub bundle: Option<String>,
    pub field_types: Option<FieldTypes>,
}

/// Loads an entity type definition and publishes the requested bundle and
/// field type filter to the fields below it.
pub struct EntityDefinition {
    source: Arc<dyn EntityDefinitionSource>,
}

impl EntityDefinition {
    pub fn new(source: Arc<dyn EntityDefinitionSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Producer for EntityDefinition {
    type Input = EntityDefinitionInput;
    const NAME: &'static str = "entity_definition";
    const OUTPUT: &'static str = "EntityTypeDefinition";

    async fn produce(
        &self,
        input: EntityDefinitionInput,
        scope: &mut FieldScope,
    ) -> Result<Value, ProducerError> {
        scope.add_cache_tag(ENTITY_TYPES_TAG);

        let definition =
            self.source
                .entity_type(&input.entity_type)
                .ok_or_else(|| ProducerError::NotFound {
                    what: "entity type",
                    id: input.entity_type.clone(),
                })?;

        if let Some(bundle) = &input.bundle
            && !self
                .source
                .bundles(&input.entity_type)
                .iter()
                .any(|known| known == bundle)
        {
            return Err(ProducerError::NotFound {
                what: "bundle",
                id: format!("{}.{bundle}", input.entity_type),
            });
        }

        scope.publish(
            BUNDLE_CONTEXT,
            input.bundle.map(Value::from).unwrap_or_default(),
        );
        scope.publish(
            FIELD_TYPES_CONTEXT,
            to_value(Self::NAME, &input.field_types.unwrap_or_default())?,
        );
        to_value(Self::NAME, definition)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityDefinitionLabelInput {
    pub entity_definition: EntityTypeDefinition,
}

/// The human readable label of an entity type.
pub struct EntityDefinitionLabel;

#[async_trait]
impl Producer for EntityDefinitionLabel {
    type Input = EntityDefinitionLabelInput;
    const NAME: &'static str = "entity_definition_label";
    const OUTPUT: &'static str = "String";

    async fn produce(
        &self,
        input: EntityDefinitionLabelInput,
        scope: &mut FieldScope,
    ) -> Result<Value, ProducerError> {
        scope.add_cache_context(LANGUAGE_INTERFACE);
        Ok(Value::from(input.entity_definition.label))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EntityDefinitionFieldsInput {
    pub entity_definition: EntityTypeDefinition,
    pub bundle_context: Option<String>,
    pub field_types_context: Option<FieldTypes>,
}

/// Lists the field definitions of an entity type, restricted to a bundle and
/// a field type filter when those were requested.
///
/// With a bundle, the default form display of the bundle is published to the
/// fields so they can report their weight and visibility.
pub struct EntityDefinitionFields {
    source: Arc<dyn EntityDefinitionSource>,
}

impl EntityDefinitionFields {
    pub fn new(source: Arc<dyn EntityDefinitionSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Producer for EntityDefinitionFields {
    type Input = EntityDefinitionFieldsInput;
    const NAME: &'static str = "entity_definition_fields";
    const OUTPUT: &'static str = "FieldDefinition[]";

    async fn produce(
        &self,
        input: EntityDefinitionFieldsInput,
        scope: &mut FieldScope,
    ) -> Result<Value, ProducerError> {
        scope.add_cache_tag(ENTITY_FIELD_INFO_TAG);

        let entity_type = input.entity_definition.id.as_str();
        let bundle = input.bundle_context.as_deref();
        let field_types = input.field_types_context.unwrap_or_default();

        let form_display = bundle
            .and_then(|bundle| {
                self.source
                    .form_display(entity_type, bundle, DEFAULT_FORM_MODE)
            })
            .map(|display| {
                scope.add_dependency(display);
                to_value(Self::NAME, display)
            })
            .transpose()?;
        scope.publish(FORM_DISPLAY_CONTEXT, form_display.unwrap_or_default());

        let fields: Vec<_> = self
            .source
            .field_definitions(entity_type, bundle)
            .into_iter()
            .filter(|field| field_types.includes(field))
            .collect();
        to_value(Self::NAME, &fields)
    }
}
