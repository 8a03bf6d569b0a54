use indexmap::IndexMap;

use crate::json_ext::Object;
use crate::json_ext::Value;

/// Name of the meta field answered from the parent type, without a resolver.
pub const TYPENAME: &str = "__typename";

/// An argument as written in the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentValue {
    Literal(Value),
    /// A variable, with the default of the argument definition it is bound to.
    Variable {
        name: String,
        default: Option<Value>,
    },
    List(Vec<ArgumentValue>),
    Object(IndexMap<String, ArgumentValue>),
}

impl ArgumentValue {
    pub fn variable(name: impl Into<String>) -> Self {
        ArgumentValue::Variable {
            name: name.into(),
            default: None,
        }
    }

    /// Sets the value a variable falls back to when it is not provided.
    /// Other arguments are returned unchanged.
    pub fn with_default(self, value: Value) -> Self {
        match self {
            ArgumentValue::Variable { name, .. } => ArgumentValue::Variable {
                name,
                default: Some(value),
            },
            other => other,
        }
    }

    /// The value of the argument for the given variables.
    ///
    /// An unprovided variable takes the default of its argument definition.
    /// Without one it is `None`, in which case the field is resolved as if the
    /// argument were absent. Inside lists and objects, unprovided variables
    /// are `null`.
    pub fn resolve(&self, variables: &Object) -> Option<Value> {
        match self {
            ArgumentValue::Literal(value) => Some(value.clone()),
            ArgumentValue::Variable { name, default } => variables
                .get(name.as_str())
                .cloned()
                .or_else(|| default.clone()),
            ArgumentValue::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.resolve(variables).unwrap_or_default())
                    .collect(),
            )),
            ArgumentValue::Object(fields) => {
                let mut object = Object::new();
                for (name, value) in fields {
                    if let Some(value) = value.resolve(variables) {
                        object.insert(name.clone(), value);
                    }
                }
                Some(Value::Object(object))
            }
        }
    }
}

impl From<Value> for ArgumentValue {
    fn from(value: Value) -> Self {
        ArgumentValue::Literal(value)
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        ArgumentValue::Literal(Value::from(value))
    }
}

/// The `@skip` and `@include` conditions one occurrence of a field is
/// selected under, its own and those of its enclosing fragments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct IncludeSkip {
    skip: Vec<ArgumentValue>,
    include: Vec<ArgumentValue>,
}

impl IncludeSkip {
    pub(crate) fn new(skip: Option<ArgumentValue>, include: Option<ArgumentValue>) -> Self {
        Self {
            skip: skip.into_iter().collect(),
            include: include.into_iter().collect(),
        }
    }

    fn and(&self, other: &IncludeSkip) -> IncludeSkip {
        IncludeSkip {
            skip: self.skip.iter().chain(&other.skip).cloned().collect(),
            include: self.include.iter().chain(&other.include).cloned().collect(),
        }
    }

    // Conditions that are not provided or not booleans keep the field.
    fn should_skip(&self, variables: &Object) -> bool {
        self.skip
            .iter()
            .any(|condition| condition.resolve(variables) == Some(Value::Bool(true)))
            || self
                .include
                .iter()
                .any(|condition| condition.resolve(variables) == Some(Value::Bool(false)))
    }
}

/// A field of a selection set, with the object type its own selection set
/// applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSelection {
    name: String,
    alias: Option<String>,
    arguments: IndexMap<String, ArgumentValue>,
    type_name: String,
    selection_set: Vec<FieldSelection>,
    // Selected when any occurrence is included. Empty when unconditional.
    conditions: Vec<IncludeSkip>,
}

impl FieldSelection {
    /// A leaf field.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: IndexMap::new(),
            type_name: String::new(),
            selection_set: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// A field whose value is an object (or a list of objects) of `type_name`.
    pub fn object(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::leaf(name)
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Skips the field when `condition` resolves to `true`, like `@skip(if:)`.
    pub fn skip_if(mut self, condition: impl Into<ArgumentValue>) -> Self {
        self.require(&[IncludeSkip::new(Some(condition.into()), None)]);
        self
    }

    /// Skips the field when `condition` resolves to `false`, like `@include(if:)`.
    pub fn include_if(mut self, condition: impl Into<ArgumentValue>) -> Self {
        self.require(&[IncludeSkip::new(None, Some(condition.into()))]);
        self
    }

    /// Adds `field` to the selection set, merging it with an already selected
    /// field of the same response key.
    pub fn select(mut self, field: FieldSelection) -> Self {
        merge_into(&mut self.selection_set, field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key of the field in the response: its alias, or its name.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn arguments(&self) -> &IndexMap<String, ArgumentValue> {
        &self.arguments
    }

    /// The object type the selection set of this field applies to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn selection_set(&self) -> &[FieldSelection] {
        &self.selection_set
    }

    /// Whether every occurrence of the field is excluded for these variables.
    pub(crate) fn is_skipped(&self, variables: &Object) -> bool {
        !self.conditions.is_empty()
            && self
                .conditions
                .iter()
                .all(|condition| condition.should_skip(variables))
    }

    /// Selects the field only under `conditions` as well as its own.
    pub(crate) fn require(&mut self, conditions: &[IncludeSkip]) {
        if conditions.is_empty() {
            return;
        }
        self.conditions = if self.conditions.is_empty() {
            conditions.to_vec()
        } else {
            self.conditions
                .iter()
                .flat_map(|own| conditions.iter().map(move |other| own.and(other)))
                .collect()
        };
    }

    pub(crate) fn resolve_arguments(&self, variables: &Object) -> Object {
        let mut arguments = Object::new();
        for (name, value) in &self.arguments {
            if let Some(value) = value.resolve(variables) {
                arguments.insert(name.clone(), value);
            }
        }
        arguments
    }
}

pub(crate) fn merge_into(selection_set: &mut Vec<FieldSelection>, field: FieldSelection) {
    match selection_set
        .iter_mut()
        .find(|selected| selected.response_key() == field.response_key())
    {
        Some(selected) => {
            let FieldSelection {
                mut selection_set,
                conditions,
                ..
            } = field;
            if selected.conditions != conditions {
                // Children keep the conditions of the occurrence they come from.
                for child in &mut selected.selection_set {
                    child.require(&selected.conditions);
                }
                for child in &mut selection_set {
                    child.require(&conditions);
                }
                selected.conditions = if selected.conditions.is_empty() || conditions.is_empty() {
                    Vec::new()
                } else {
                    selected.conditions.iter().chain(&conditions).cloned().collect()
                };
            }
            for child in selection_set {
                merge_into(&mut selected.selection_set, child);
            }
        }
        None => selection_set.push(field),
    }
}

/// An operation ready to be executed: the root type and its selection set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    root_type: String,
    selection_set: Vec<FieldSelection>,
    variable_defaults: Object,
}

impl Operation {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            root_type: root_type.into(),
            selection_set: Vec::new(),
            variable_defaults: Object::new(),
        }
    }

    pub fn select(mut self, field: FieldSelection) -> Self {
        merge_into(&mut self.selection_set, field);
        self
    }

    /// Value of `name` when the request does not provide it.
    pub fn variable_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variable_defaults.insert(name.into(), value);
        self
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn selection_set(&self) -> &[FieldSelection] {
        &self.selection_set
    }

    /// The request variables, completed with the declared defaults.
    pub(crate) fn variables(&self, provided: &Object) -> Object {
        let mut variables = self.variable_defaults.clone();
        for (name, value) in provided {
            variables.insert(name.clone(), value.clone());
        }
        variables
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn fields_with_the_same_response_key_are_merged() {
        let operation = Operation::new("Query")
            .select(
                FieldSelection::object("entityDefinition", "EntityDefinition")
                    .select(FieldSelection::leaf("label")),
            )
            .select(
                FieldSelection::object("entityDefinition", "EntityDefinition")
                    .select(FieldSelection::leaf("label"))
                    .select(FieldSelection::leaf("id")),
            );

        assert_eq!(operation.selection_set().len(), 1);
        let keys: Vec<&str> = operation.selection_set()[0]
            .selection_set()
            .iter()
            .map(FieldSelection::response_key)
            .collect();
        assert_eq!(keys, vec!["label", "id"]);
    }

    #[test]
    fn aliases_are_distinct_response_keys() {
        let operation = Operation::new("Query")
            .select(FieldSelection::leaf("label"))
            .select(FieldSelection::leaf("label").alias("name"));
        assert_eq!(operation.selection_set().len(), 2);
    }

    #[test]
    fn unprovided_variables_are_absent_arguments() {
        let field = FieldSelection::leaf("entityDefinition")
            .argument("entity_type", "node")
            .argument("bundle", ArgumentValue::variable("bundle"))
            .argument(
                "ids",
                ArgumentValue::List(vec![
                    ArgumentValue::variable("first"),
                    ArgumentValue::Literal(json!(2)),
                ]),
            );

        let arguments = field.resolve_arguments(&Object::new());
        assert_eq!(
            Value::Object(arguments),
            json!({ "entity_type": "node", "ids": [null, 2] })
        );
    }

    #[test]
    fn unprovided_variables_fall_back_to_the_argument_default() {
        let field = FieldSelection::leaf("entityDefinition").argument(
            "field_types",
            ArgumentValue::variable("types").with_default(json!("ALL")),
        );

        assert_eq!(
            Value::Object(field.resolve_arguments(&Object::new())),
            json!({ "field_types": "ALL" })
        );

        let mut provided = Object::new();
        provided.insert("types", json!("BASE_FIELDS"));
        assert_eq!(
            Value::Object(field.resolve_arguments(&provided)),
            json!({ "field_types": "BASE_FIELDS" })
        );

        provided.insert("types", Value::Null);
        assert_eq!(
            Value::Object(field.resolve_arguments(&provided)),
            json!({ "field_types": null })
        );
    }

    fn variables(value: Value) -> Object {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn skip_and_include_conditions_follow_the_variables() {
        let skipped = FieldSelection::leaf("label").skip_if(ArgumentValue::variable("hide"));
        assert!(skipped.is_skipped(&variables(json!({ "hide": true }))));
        assert!(!skipped.is_skipped(&variables(json!({ "hide": false }))));
        assert!(!skipped.is_skipped(&Object::new()));

        let included = FieldSelection::leaf("label").include_if(ArgumentValue::variable("show"));
        assert!(included.is_skipped(&variables(json!({ "show": false }))));
        assert!(!included.is_skipped(&variables(json!({ "show": true }))));

        let both = FieldSelection::leaf("label")
            .skip_if(ArgumentValue::variable("hide"))
            .include_if(ArgumentValue::variable("show"));
        assert!(both.is_skipped(&variables(json!({ "hide": false, "show": false }))));
        assert!(!both.is_skipped(&variables(json!({ "hide": false, "show": true }))));

        assert!(!FieldSelection::leaf("label").is_skipped(&variables(json!({ "hide": true }))));
    }

    #[test]
    fn merged_fields_are_selected_when_any_occurrence_is() {
        let operation = Operation::new("Query")
            .select(
                FieldSelection::object("entityDefinition", "EntityDefinition")
                    .skip_if(ArgumentValue::variable("hide"))
                    .select(FieldSelection::leaf("label")),
            )
            .select(
                FieldSelection::object("entityDefinition", "EntityDefinition")
                    .include_if(ArgumentValue::variable("show"))
                    .select(FieldSelection::leaf("id")),
            );

        let definition = &operation.selection_set()[0];
        let hidden = variables(json!({ "hide": true, "show": true }));
        assert!(!definition.is_skipped(&hidden));
        let [label, id] = definition.selection_set() else {
            panic!("expected two fields, got {:?}", definition.selection_set());
        };
        assert!(label.is_skipped(&hidden));
        assert!(!id.is_skipped(&hidden));

        assert!(definition.is_skipped(&variables(json!({ "hide": true, "show": false }))));

        let unconditional = operation.select(
            FieldSelection::object("entityDefinition", "EntityDefinition")
                .select(FieldSelection::leaf("id")),
        );
        let definition = &unconditional.selection_set()[0];
        assert!(!definition.is_skipped(&variables(json!({ "hide": true, "show": false }))));
        assert!(!definition.selection_set()[1].is_skipped(&variables(json!({ "show": false }))));
    }

    #[test]
    fn provided_variables_override_defaults() {
        let operation = Operation::new("Query")
            .variable_default("bundle", json!("article"))
            .variable_default("field_types", json!("ALL"));

        let mut provided = Object::new();
        provided.insert("bundle", json!("page"));
        assert_eq!(
            Value::Object(operation.variables(&provided)),
            json!({ "bundle": "page", "field_types": "ALL" })
        );
    }
}
