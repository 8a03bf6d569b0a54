//! Logic for loading configuration in to an object model

mod schema;

use std::str::FromStr;

use displaydoc::Display;
use indexmap::IndexMap;
use schemars::JsonSchema;
pub use schema::generate_config_schema;
pub use schema::validate_configuration;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::cacheability::CacheabilityFacts;
use crate::cacheability::MaxAge;
use crate::error::RegistryError;
use crate::registry::ResolverSpec;

/// One year, the longest max-age advertised for permanent responses.
const DEFAULT_PERMANENT_MAX_AGE: u32 = 31_536_000;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
    /// could not deserialize configuration: {0}
    DeserializeConfigError(serde_json::Error),
    /// could not wire resolvers: {0}
    Registry(#[from] RegistryError),
}

/// The configuration of the resolver engine.
///
/// Can be created through `serde::Deserialize` from various formats, or
/// validated from YAML with [`validate_configuration`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Cacheability every response starts from, and how it is advertised.
    pub cache: Cache,

    /// Execution options.
    pub execution: Execution,

    /// Resolvers by object type name, then by field name.
    pub resolvers: IndexMap<String, IndexMap<String, ResolverSpec>>,
}

/// Cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Cache {
    /// Upper bound of the max-age of every response.
    pub max_age: MaxAge,

    /// Cache contexts every response varies by.
    pub contexts: Vec<String>,

    /// Cache tags every response is invalidated by.
    pub tags: Vec<String>,

    /// Max-age in seconds sent in `cache-control` for permanent responses.
    pub permanent_max_age: u32,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            max_age: MaxAge::Permanent,
            contexts: Vec::new(),
            tags: Vec::new(),
            permanent_max_age: DEFAULT_PERMANENT_MAX_AGE,
        }
    }
}

impl Cache {
    /// The facts every response starts from.
    pub fn base_facts(&self) -> CacheabilityFacts {
        let mut facts = CacheabilityFacts::new().with_max_age(self.max_age);
        for context in &self.contexts {
            facts.add_context(context.clone());
        }
        for tag in &self.tags {
            facts.add_tag(tag.clone());
        }
        facts
    }
}

/// Execution configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Execution {
    /// Resolve the fields of a selection set concurrently. When disabled they
    /// resolve one after the other, with the same result.
    pub concurrent_siblings: bool,
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            concurrent_siblings: true,
        }
    }
}

impl FromStr for Configuration {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_configuration(s)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::binding::Binding;

    #[test]
    fn schema_is_valid() {
        let schema = generate_config_schema();
        jsonschema::draft7::meta::validate(schema.as_value())
            .expect("generated schema must be valid");
    }

    #[test]
    fn empty_configuration_uses_defaults() {
        let configuration = validate_configuration("").unwrap();
        assert_eq!(configuration, Configuration::default());
        assert!(configuration.execution.concurrent_siblings);
        assert_eq!(configuration.cache.permanent_max_age, 31_536_000);
        assert_eq!(configuration.cache.base_facts(), CacheabilityFacts::new());
    }

    #[test]
    fn resolvers_keep_their_declaration_order() {
        let configuration: Configuration = r#"
cache:
  max_age: 600
  contexts: [user.permissions]
execution:
  concurrent_siblings: false
resolvers:
  Query:
    entityDefinition:
      producer: entity_definition
      inputs:
        entity_type: { argument: entity_type }
        bundle: { argument: bundle }
        field_types: { literal: ALL }
  EntityDefinition:
    label:
      producer: entity_definition_label
      inputs:
        entity_definition: parent
"#
        .parse()
        .unwrap();

        assert!(!configuration.execution.concurrent_siblings);
        assert_eq!(
            configuration.cache.base_facts(),
            CacheabilityFacts::new()
                .with_max_age(MaxAge::Seconds(600))
                .with_context("user.permissions")
        );
        assert_eq!(
            configuration.resolvers.keys().collect::<Vec<_>>(),
            vec!["Query", "EntityDefinition"]
        );

        let entity_definition = &configuration.resolvers["Query"]["entityDefinition"];
        assert_eq!(entity_definition.producer(), "entity_definition");
        assert_eq!(
            entity_definition.inputs().values().cloned().collect::<Vec<_>>(),
            vec![
                Binding::argument("entity_type"),
                Binding::argument("bundle"),
                Binding::literal("ALL"),
            ]
        );
        assert_eq!(
            configuration.resolvers["EntityDefinition"]["label"].inputs()["entity_definition"],
            Binding::parent()
        );
    }

    #[test]
    fn permanent_can_be_spelled_out() {
        let configuration = validate_configuration("cache:\n  max_age: permanent\n").unwrap();
        assert_eq!(configuration.cache.max_age, MaxAge::Permanent);

        let configuration = validate_configuration("cache:\n  max_age: -1\n").unwrap();
        assert_eq!(configuration.cache.max_age, MaxAge::Permanent);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = validate_configuration("cache:\n  max_ttl: 60\n").unwrap_err();
        assert!(
            matches!(
                error,
                ConfigurationError::InvalidConfiguration {
                    message: "configuration had errors",
                    ..
                }
            ),
            "{error}"
        );
        assert!(error.to_string().contains("/cache"), "{error}");
    }

    #[test]
    fn malformed_bindings_are_rejected() {
        let yaml = r#"
resolvers:
  Query:
    label:
      producer: entity_definition_label
      inputs:
        entity_definition: { ancestor: entity }
"#;
        assert!(validate_configuration(yaml).is_err());
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let error = validate_configuration("cache: [").unwrap_err();
        assert_eq!(
            error.to_string().split(':').next(),
            Some("failed to parse yaml")
        );
    }
}
