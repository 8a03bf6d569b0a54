//! Resolver errors.
//!
//! [`RegistryError`]s are configuration faults found while the catalog and the
//! registry are assembled: the process should refuse to serve with them.
//! [`FieldError`]s happen while one field resolves; they null the field,
//! attach to its path in the response and leave sibling fields alone.

use displaydoc::Display;
use serde_json_bytes::ByteString;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
pub use crate::producer::ProducerError;
pub use crate::spec::SpecError;

/// Configuration faults, detected while producers and resolvers are registered.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// producer '{0}' is already registered
    DuplicateProducer(String),

    /// a resolver for '{0}' is already registered
    DuplicateResolver(String),

    /// resolver for '{coordinate}' references unknown producer '{producer}'
    UnknownProducer {
        coordinate: String,
        producer: String,
    },

    /// resolver for '{coordinate}' binds '{slot}', which producer '{producer}' does not declare
    UndeclaredSlot {
        coordinate: String,
        producer: String,
        slot: String,
    },

    /// resolver for '{coordinate}' leaves input '{slot}' of producer '{producer}' unbound
    MissingBinding {
        coordinate: String,
        producer: String,
        slot: String,
    },

    /// resolver for '{coordinate}' binds input '{slot}' more than once
    DuplicateBinding { coordinate: String, slot: String },

    /// invalid descriptor for producer '{producer}': {reason}
    InvalidDescriptor { producer: String, reason: String },
}

/// Errors raised while a single field resolves.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldError {
    /// input '{slot}' of '{coordinate}' is bound to argument '{argument}', which was not provided
    UnboundReference {
        coordinate: String,
        slot: String,
        argument: String,
    },

    /// {source}
    ProducerDomainError {
        coordinate: String,
        producer: String,
        source: ProducerError,
    },

    /// no resolver registered for field '{coordinate}'
    RegistryNotFound { coordinate: String },
}

impl FieldError {
    /// Whether the error reveals that the schema and the registry are out of sync.
    ///
    /// A response containing such an error is never cacheable.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(self, FieldError::RegistryNotFound { .. })
    }

    pub fn coordinate(&self) -> &str {
        match self {
            FieldError::UnboundReference { coordinate, .. }
            | FieldError::ProducerDomainError { coordinate, .. }
            | FieldError::RegistryNotFound { coordinate } => coordinate,
        }
    }

    /// Convert the field error to a GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let mut extensions = self.custom_extension_details().unwrap_or_default();
        extensions
            .entry("code")
            .or_insert_with(|| self.extension_code().into());

        Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extensions(extensions)
            .build()
    }
}

impl ErrorExtension for FieldError {
    fn extension_code(&self) -> String {
        match self {
            FieldError::UnboundReference { .. } => "UNBOUND_REFERENCE",
            FieldError::ProducerDomainError { source, .. } => match source {
                ProducerError::NotFound { .. } => "NOT_FOUND",
                ProducerError::InvalidInput { .. } => "INVALID_PRODUCER_INPUT",
                ProducerError::Domain(_) => "PRODUCER_DOMAIN_ERROR",
            },
            FieldError::RegistryNotFound { .. } => "RESOLVER_NOT_FOUND",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut details = Object::new();
        details.insert(
            "coordinate",
            Value::String(ByteString::from(self.coordinate().to_string())),
        );
        if let FieldError::ProducerDomainError { producer, .. } = self {
            details.insert("producer", Value::String(ByteString::from(producer.clone())));
        }
        Some(details)
    }
}
