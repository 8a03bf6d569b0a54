use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable;
use indexmap::IndexMap;
use serde_json_bytes::ByteString;

use super::SpecError;
use crate::execution::ArgumentValue;
use crate::execution::FieldSelection;
use crate::execution::IncludeSkip;
use crate::execution::merge_into;
use crate::json_ext::Object;
use crate::json_ext::Value;

// The RECURSION_LIMIT is chosen to be:
//   < # expected to cause stack overflow &&
//   > # expected in a legitimate query
const RECURSION_LIMIT: usize = 512;

/// Lowers a selection set of `current_type` into fields.
///
/// Fragment spreads and inline fragments are flattened into their enclosing
/// selection set when their type condition is `current_type` (or absent).
/// Fields statically excluded with `@skip(if: true)` or `@include(if: false)`
/// are dropped. Conditions on variables are kept on the lowered fields, and
/// those of a fragment on every field lowered from it.
pub(super) fn lower_selection_set(
    document: &ExecutableDocument,
    selection_set: &executable::SelectionSet,
    current_type: &str,
    count: usize,
    fields: &mut Vec<FieldSelection>,
) -> Result<(), SpecError> {
    if count > RECURSION_LIMIT {
        tracing::error!("selection processing recursion limit({RECURSION_LIMIT}) exceeded");
        return Err(SpecError::RecursionLimitExceeded);
    }

    for selection in &selection_set.selections {
        match selection {
            executable::Selection::Field(field) => {
                let Some(condition) = include_skip(&field.directives) else {
                    continue;
                };
                let field_type = field.selection_set.ty.as_str();
                let mut lowered = FieldSelection::object(field.name.as_str(), field_type);
                if let Some(alias) = &field.alias {
                    lowered = lowered.alias(alias.as_str());
                }
                for argument in &field.arguments {
                    lowered = lowered.argument(argument.name.as_str(), lower_value(&argument.value));
                }
                for definition in &field.definition.arguments {
                    let Some(default_value) = &definition.default_value else {
                        continue;
                    };
                    let default_value = constant_value(default_value);
                    let argument = match lowered.arguments().get(definition.name.as_str()) {
                        None => Some(ArgumentValue::Literal(default_value)),
                        Some(variable @ ArgumentValue::Variable { default: None, .. }) => {
                            Some(variable.clone().with_default(default_value))
                        }
                        Some(_) => None,
                    };
                    if let Some(argument) = argument {
                        lowered = lowered.argument(definition.name.as_str(), argument);
                    }
                }
                lowered.require(&condition);

                let mut children = Vec::new();
                lower_selection_set(
                    document,
                    &field.selection_set,
                    field_type,
                    count + 1,
                    &mut children,
                )?;
                for child in children {
                    lowered = lowered.select(child);
                }
                merge_into(fields, lowered);
            }
            executable::Selection::InlineFragment(inline_fragment) => {
                let Some(condition) = include_skip(&inline_fragment.directives) else {
                    continue;
                };
                let applies = inline_fragment
                    .type_condition
                    .as_ref()
                    .is_none_or(|type_condition| type_condition.as_str() == current_type);
                if applies {
                    lower_fragment(
                        document,
                        &inline_fragment.selection_set,
                        current_type,
                        count + 1,
                        &condition,
                        fields,
                    )?;
                }
            }
            executable::Selection::FragmentSpread(spread) => {
                let Some(condition) = include_skip(&spread.directives) else {
                    continue;
                };
                let fragment = document
                    .fragments
                    .get(&spread.fragment_name)
                    .ok_or_else(|| SpecError::UnknownFragment(spread.fragment_name.to_string()))?;
                if fragment.type_condition().as_str() == current_type {
                    lower_fragment(
                        document,
                        &fragment.selection_set,
                        current_type,
                        count + 1,
                        &condition,
                        fields,
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn lower_fragment(
    document: &ExecutableDocument,
    selection_set: &executable::SelectionSet,
    current_type: &str,
    count: usize,
    condition: &[IncludeSkip],
    fields: &mut Vec<FieldSelection>,
) -> Result<(), SpecError> {
    let mut lowered = Vec::new();
    lower_selection_set(document, selection_set, current_type, count, &mut lowered)?;
    for mut field in lowered {
        field.require(condition);
        merge_into(fields, field);
    }
    Ok(())
}

/// The `@skip` and `@include` conditions on variables of a selection.
///
/// `None` when a literal condition excludes the selection, empty when nothing
/// depends on variables.
fn include_skip(directives: &executable::DirectiveList) -> Option<Vec<IncludeSkip>> {
    let condition = |name: &str| {
        directives
            .get(name)
            .and_then(|directive| directive.specified_argument_by_name("if"))
            .map(lower_value)
    };
    let skip = condition("skip");
    let include = condition("include");
    match (skip, include) {
        (Some(ArgumentValue::Literal(Value::Bool(true))), _)
        | (_, Some(ArgumentValue::Literal(Value::Bool(false)))) => None,
        (skip, include) => {
            let variable = |condition: Option<ArgumentValue>| {
                condition.filter(|condition| !matches!(condition, ArgumentValue::Literal(_)))
            };
            let (skip, include) = (variable(skip), variable(include));
            if skip.is_none() && include.is_none() {
                Some(Vec::new())
            } else {
                Some(vec![IncludeSkip::new(skip, include)])
            }
        }
    }
}

/// Converts an argument or default value as written in the document.
pub(super) fn lower_value(value: &Node<ast::Value>) -> ArgumentValue {
    match &**value {
        ast::Value::Variable(name) => ArgumentValue::variable(name.as_str()),
        ast::Value::List(items) => ArgumentValue::List(items.iter().map(lower_value).collect()),
        ast::Value::Object(fields) => ArgumentValue::Object(
            fields
                .iter()
                .map(|(name, value)| (name.to_string(), lower_value(value)))
                .collect::<IndexMap<_, _>>(),
        ),
        constant => ArgumentValue::Literal(constant_value(constant)),
    }
}

/// The JSON value of a constant GraphQL value. Variables are `null`.
pub(super) fn constant_value(value: &ast::Value) -> Value {
    match value {
        ast::Value::Null | ast::Value::Variable(_) => Value::Null,
        ast::Value::Enum(name) => Value::String(ByteString::from(name.as_str())),
        ast::Value::String(string) => Value::String(ByteString::from(string.as_str())),
        ast::Value::Boolean(boolean) => Value::Bool(*boolean),
        ast::Value::Int(int) => {
            let text = int.to_string();
            match text.parse::<i64>() {
                Ok(int) => Value::Number(int.into()),
                Err(_) => Value::String(ByteString::from(text)),
            }
        }
        ast::Value::Float(float) => float
            .try_to_f64()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_default(),
        ast::Value::List(items) => {
            Value::Array(items.iter().map(|item| constant_value(item)).collect())
        }
        ast::Value::Object(fields) => {
            let mut object = Object::new();
            for (name, value) in fields {
                object.insert(name.as_str(), constant_value(value));
            }
            Value::Object(object)
        }
    }
}
