//! Configuration schema generation and validation

use std::fmt::Write;

use jsonschema::Validator;
use once_cell::sync::OnceCell;
use schemars::Schema;
use schemars::generate::SchemaSettings;

use super::Configuration;
use super::ConfigurationError;

/// Generate a JSON schema for the configuration.
pub fn generate_config_schema() -> Schema {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = false;
    });

    let generator = settings.into_generator();
    let mut schema = generator.into_root_schema_for::<Configuration>();
    schema.insert("additionalProperties".to_string(), false.into());
    schema
}

fn validator() -> Result<&'static Validator, ConfigurationError> {
    static VALIDATOR: OnceCell<Validator> = OnceCell::new();
    VALIDATOR.get_or_try_init(|| {
        let config_schema = serde_json::to_value(generate_config_schema()).map_err(|e| {
            ConfigurationError::InvalidConfiguration {
                message: "failed to parse schema",
                error: e.to_string(),
            }
        })?;
        jsonschema::draft7::new(&config_schema).map_err(|e| {
            ConfigurationError::InvalidConfiguration {
                message: "failed to compile schema",
                error: e.to_string(),
            }
        })
    })
}

/// Validate config yaml against the generated json schema, then deserialize it.
///
/// Every schema violation is reported with the JSON pointer of the offending
/// value, e.g. `/resolvers/Query/label/inputs/entity_definition`.
pub fn validate_configuration(raw_yaml: &str) -> Result<Configuration, ConfigurationError> {
    let defaulted_yaml = if raw_yaml.trim().is_empty() {
        "{}".to_string()
    } else {
        raw_yaml.to_string()
    };

    let yaml: serde_json::Value = serde_yaml::from_str(&defaulted_yaml).map_err(|e| {
        ConfigurationError::InvalidConfiguration {
            message: "failed to parse yaml",
            error: e.to_string(),
        }
    })?;

    let validator = validator()?;
    let mut errors = String::new();
    for (index, e) in validator.iter_errors(&yaml).enumerate() {
        let _ = writeln!(&mut errors, "{}. at {}: {}", index + 1, e.instance_path, e);
    }
    if !errors.is_empty() {
        tracing::warn!("configuration had errors");
        return Err(ConfigurationError::InvalidConfiguration {
            message: "configuration had errors",
            error: format!("\n{errors}"),
        });
    }

    serde_json::from_value(yaml).map_err(ConfigurationError::DeserializeConfigError)
}
