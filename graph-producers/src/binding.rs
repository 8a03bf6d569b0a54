//! Where a producer input comes from.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::error::FieldError;
use crate::frame::ExecutionFrame;
use crate::json_ext::Value;
use crate::producer::InputSlot;
use crate::registry::FieldCoordinate;

/// A rule for obtaining one producer input from the current frame.
///
/// In configuration files:
///
/// ```yaml
/// entity_type: { literal: node }
/// bundle: { argument: bundle }
/// entity_form_display_context: { context: entity_form_display }
/// entity_definition: parent
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Binding {
    /// A fixed value.
    #[serde(rename = "literal")]
    Literal(#[schemars(with = "serde_json::Value")] Value),

    /// The value of a field argument.
    #[serde(rename = "argument")]
    FromArgument(String),

    /// A value published by an ancestor field.
    #[serde(rename = "context")]
    FromContext(String),

    /// The value the parent field resolved to.
    #[serde(rename = "parent")]
    FromParent,
}

impl Binding {
    pub fn literal(value: impl Into<Value>) -> Self {
        Binding::Literal(value.into())
    }

    pub fn argument(name: impl Into<String>) -> Self {
        Binding::FromArgument(name.into())
    }

    pub fn context(key: impl Into<String>) -> Self {
        Binding::FromContext(key.into())
    }

    pub fn parent() -> Self {
        Binding::FromParent
    }

    /// Resolves the binding for `slot` against `frame`.
    ///
    /// An absent argument yields `null` when the slot is nullable and an
    /// [`FieldError::UnboundReference`] otherwise. An absent context key
    /// always yields `null`.
    pub fn resolve(
        &self,
        frame: &ExecutionFrame,
        slot: &InputSlot,
        coordinate: &FieldCoordinate,
    ) -> Result<Value, FieldError> {
        match self {
            Binding::Literal(value) => Ok(value.clone()),
            Binding::FromArgument(name) => match frame.argument(name) {
                Some(value) => Ok(value.clone()),
                None if slot.is_nullable() => Ok(Value::Null),
                None => Err(FieldError::UnboundReference {
                    coordinate: coordinate.to_string(),
                    slot: slot.name().to_string(),
                    argument: name.clone(),
                }),
            },
            Binding::FromContext(key) => Ok(frame.context().get(key).cloned().unwrap_or_default()),
            Binding::FromParent => Ok(frame.parent_value().clone()),
        }
    }
}
