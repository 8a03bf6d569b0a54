use apollo_compiler::ast;
use apollo_compiler::executable::OperationType;

use super::Schema;
use super::SpecError;
use super::selection::constant_value;
use super::selection::lower_selection_set;
use crate::execution::Operation;

/// A parsed and validated GraphQL request, lowered to an executable [`Operation`].
#[derive(Debug, Clone)]
pub struct Query {
    operation_name: Option<String>,
    operation: Operation,
}

impl Query {
    /// Parses and validates `query` against `schema`, then lowers the selected
    /// operation.
    ///
    /// `operation_name` may be omitted when the document holds one operation.
    pub fn parse(
        schema: &Schema,
        query: &str,
        operation_name: Option<&str>,
    ) -> Result<Self, SpecError> {
        let document = ast::Document::parse(query, "query.graphql")
            .map_err(|invalid| SpecError::ParsingError(invalid.errors.to_string()))?
            .to_executable_validate(schema.definitions())
            .map_err(|invalid| SpecError::ValidationError(invalid.errors.to_string()))?;

        let operation = document
            .operations
            .get(operation_name)
            .map_err(|_| match operation_name {
                Some(name) => SpecError::UnknownOperation(name.to_string()),
                None => SpecError::AmbiguousOperation,
            })?;

        if operation.operation_type == OperationType::Subscription {
            return Err(SpecError::SubscriptionNotSupported);
        }

        let root_type = operation.selection_set.ty.as_str();
        let mut fields = Vec::new();
        lower_selection_set(&document, &operation.selection_set, root_type, 0, &mut fields)?;

        let mut lowered = Operation::new(root_type);
        for variable in &operation.variables {
            if let Some(default_value) = &variable.default_value {
                lowered =
                    lowered.variable_default(variable.name.as_str(), constant_value(default_value));
            }
        }
        for field in fields {
            lowered = lowered.select(field);
        }

        Ok(Self {
            operation_name: operation.name.as_ref().map(|name| name.to_string()),
            operation: lowered,
        })
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }
}
