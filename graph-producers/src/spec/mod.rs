//! GraphQL schema and operation handling on top of `apollo-compiler`.

mod query;
mod schema;
mod selection;

use displaydoc::Display;
pub use query::Query;
pub use schema::Schema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::json_ext::Object;

/// GraphQL parsing errors.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SpecError {
    /// invalid schema: {0}
    InvalidSchema(String),
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// parsing error: {0}
    ParsingError(String),
    /// validation error: {0}
    ValidationError(String),
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// must provide operation name if query contains multiple operations
    AmbiguousOperation,
    /// subscription operation is not supported
    SubscriptionNotSupported,
    /// fragment '{0}' is not defined
    UnknownFragment(String),
}

impl SpecError {
    /// Convert the request error to a GraphQL error, which has no path.
    pub fn to_graphql_error(&self) -> Error {
        Error::builder()
            .message(self.to_string())
            .extension_code(self.extension_code())
            .extensions(self.custom_extension_details().unwrap_or_default())
            .build()
    }
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::InvalidSchema(_) => "INVALID_SCHEMA",
            SpecError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
            SpecError::ParsingError(_) => "PARSING_ERROR",
            SpecError::ValidationError(_) | SpecError::UnknownFragment(_) => {
                "GRAPHQL_VALIDATION_FAILED"
            }
            SpecError::UnknownOperation(_) | SpecError::AmbiguousOperation => {
                "GRAPHQL_UNKNOWN_OPERATION_NAME"
            }
            SpecError::SubscriptionNotSupported => "SUBSCRIPTION_NOT_SUPPORTED",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        match self {
            SpecError::UnknownOperation(name) => {
                obj.insert("operationName", name.clone().into());
            }
            SpecError::UnknownFragment(name) => {
                obj.insert("fragment", name.clone().into());
            }
            _ => (),
        }

        (!obj.is_empty()).then_some(obj)
    }
}
