//! Producers exposing entity and field definitions to GraphQL.
//!
//! They read the content model through an [`EntityDefinitionSource`] and
//! pass definitions down the tree as JSON: `entity_definition` produces the
//! parent of `entity_definition_label` and `entity_definition_fields`, whose
//! items are the parents of the `entity_definition_field_*` producers.

mod entity_definition;
mod field;

use std::sync::Arc;

pub use entity_definition::EntityDefinition;
pub use entity_definition::EntityDefinitionFields;
pub use entity_definition::EntityDefinitionFieldsInput;
pub use entity_definition::EntityDefinitionInput;
pub use entity_definition::EntityDefinitionLabel;
pub use entity_definition::EntityDefinitionLabelInput;
pub use field::*;
use serde::Serialize;

use crate::entity::EntityDefinitionSource;
use crate::error::RegistryError;
use crate::json_ext::Value;
use crate::producer::ProducerCatalog;
use crate::producer::ProducerError;

/// Context key under which `entity_definition` publishes the requested bundle.
pub const BUNDLE_CONTEXT: &str = "bundle";
/// Context key under which `entity_definition` publishes the field type filter.
pub const FIELD_TYPES_CONTEXT: &str = "field_types";
/// Context key under which `entity_definition_fields` publishes the form display.
pub const FORM_DISPLAY_CONTEXT: &str = "entity_form_display";

/// Context varying with the language of the interface.
pub(crate) const LANGUAGE_INTERFACE: &str = "languages:language_interface";

/// Registers every entity-definition producer in `catalog`.
pub fn register_entity_definition_producers(
    catalog: &mut ProducerCatalog,
    source: Arc<dyn EntityDefinitionSource>,
) -> Result<(), RegistryError> {
    catalog.register(EntityDefinition::new(source.clone()))?;
    catalog.register(EntityDefinitionLabel)?;
    catalog.register(EntityDefinitionFields::new(source))?;

    catalog.register(EntityDefinitionFieldId)?;
    catalog.register(EntityDefinitionFieldLabel)?;
    catalog.register(EntityDefinitionFieldDescription)?;
    catalog.register(EntityDefinitionFieldType)?;
    catalog.register(EntityDefinitionFieldRequired)?;
    catalog.register(EntityDefinitionFieldMultiple)?;
    catalog.register(EntityDefinitionFieldMaxNumItems)?;
    catalog.register(EntityDefinitionFieldStatus)?;
    catalog.register(EntityDefinitionFieldDefaultValue)?;
    catalog.register(EntityDefinitionFieldAdditionalDefaultValue)?;
    catalog.register(EntityDefinitionFieldReference)?;
    catalog.register(EntityDefinitionFieldHidden)?;
    catalog.register(EntityDefinitionFieldWeight)?;
    catalog.register(TranslatableEntityDefinitionFieldSettings)?;
    Ok(())
}

fn to_value(producer: &str, value: &impl Serialize) -> Result<Value, ProducerError> {
    serde_json_bytes::to_value(value).map_err(|error| {
        ProducerError::Domain(format!("producer '{producer}' could not serialize its output: {error}"))
    })
}
