use std::ops::Deref;
use std::sync::Arc;

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::validation::Valid;

use super::SpecError;
use crate::registry::FieldCoordinate;

/// A validated GraphQL schema.
///
/// Resolvers are bound to the fields of its object types.
#[derive(Debug, Clone)]
pub struct Schema {
    definitions: Arc<Valid<apollo_compiler::Schema>>,
}

impl Schema {
    pub fn parse(sdl: &str) -> Result<Self, SpecError> {
        let definitions = apollo_compiler::Schema::parse_and_validate(sdl, "schema.graphql")
            .map_err(|invalid| SpecError::InvalidSchema(invalid.errors.to_string()))?;
        Ok(Self {
            definitions: Arc::new(definitions),
        })
    }

    pub fn definitions(&self) -> &Valid<apollo_compiler::Schema> {
        &self.definitions
    }

    /// Every field of every object type defined by the schema, introspection aside.
    pub fn object_fields(&self) -> impl Iterator<Item = FieldCoordinate> + '_ {
        self.definitions
            .types
            .iter()
            .filter(|(_, ty)| !ty.is_built_in())
            .filter_map(|(name, ty)| match ty {
                ExtendedType::Object(object) => Some((name, object)),
                _ => None,
            })
            .flat_map(|(name, object)| {
                object
                    .fields
                    .keys()
                    .filter(|field| !field.as_str().starts_with("__"))
                    .map(move |field| FieldCoordinate::new(name.as_str(), field.as_str()))
            })
    }
}

impl Deref for Schema {
    type Target = Valid<apollo_compiler::Schema>;

    fn deref(&self) -> &Self::Target {
        &self.definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        type Query {
          entityDefinition(entity_type: String!, bundle: String): EntityDefinition
        }

        type EntityDefinition {
          label: String
          fields: [EntityDefinitionField]
        }

        type EntityDefinitionField {
          id: String
          weight: Int
        }
    "#;

    #[test]
    fn lists_object_fields() {
        let schema = Schema::parse(SDL).unwrap();
        let fields: Vec<String> = schema.object_fields().map(|c| c.to_string()).collect();
        assert_eq!(
            fields,
            vec![
                "Query.entityDefinition",
                "EntityDefinition.label",
                "EntityDefinition.fields",
                "EntityDefinitionField.id",
                "EntityDefinitionField.weight",
            ]
        );
    }

    #[test]
    fn invalid_schemas_are_rejected() {
        let error = Schema::parse("type Query { field: Missing }").unwrap_err();
        assert!(matches!(error, SpecError::InvalidSchema(_)), "{error}");
    }
}
