//! Resolvers and the registry that maps field coordinates to them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::binding::Binding;
use crate::cacheability::CacheabilityFacts;
use crate::cacheability::MaxAge;
use crate::configuration::Configuration;
use crate::error::FieldError;
use crate::error::RegistryError;
use crate::frame::ContextOverlay;
use crate::frame::ExecutionFrame;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::producer::DynProducer;
use crate::producer::FieldScope;
use crate::producer::InputSlot;
use crate::producer::ProducerCatalog;
use crate::spec::Schema;

/// A `(type, field)` pair, displayed as `Type.field`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldCoordinate {
    type_name: String,
    field_name: String,
}

impl FieldCoordinate {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for FieldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// The declarative description of a resolver: a producer name and one
/// binding per input slot of that producer.
///
/// ```yaml
/// producer: entity_definition
/// inputs:
///   entity_type: { argument: entity_type }
///   bundle: { argument: bundle }
///   field_types: { argument: field_types }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ResolverSpec {
    /// Name of the producer computing the field.
    producer: String,

    /// Binding of each input slot of the producer.
    #[serde(default)]
    inputs: IndexMap<String, Binding>,

    #[serde(skip)]
    #[schemars(skip)]
    duplicates: Vec<String>,
}

impl ResolverSpec {
    /// Starts a spec for a resolver computed by `producer`.
    pub fn produce(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            ..Default::default()
        }
    }

    /// Binds the input `slot`.
    pub fn map(mut self, slot: impl Into<String>, binding: Binding) -> Self {
        let slot = slot.into();
        if self.inputs.contains_key(&slot) {
            self.duplicates.push(slot);
        } else {
            self.inputs.insert(slot, binding);
        }
        self
    }

    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn inputs(&self) -> &IndexMap<String, Binding> {
        &self.inputs
    }
}

/// The outcome of resolving one field.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct FieldResolution {
    /// The produced value, `null` on error.
    pub value: Value,

    /// What the producer recorded. Uncacheable when the field failed.
    pub facts: CacheabilityFacts,

    /// Context values for the descendants of the field.
    pub published: ContextOverlay,

    pub error: Option<FieldError>,
}

impl FieldResolution {
    fn failed(error: FieldError, facts: CacheabilityFacts) -> Self {
        Self {
            value: Value::Null,
            facts: facts.with_max_age(MaxAge::UNCACHEABLE),
            published: ContextOverlay::new(),
            error: Some(error),
        }
    }
}

/// A producer bound to one field coordinate.
pub struct Resolver {
    coordinate: FieldCoordinate,
    producer: Arc<dyn DynProducer>,
    bindings: Vec<(InputSlot, Binding)>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("coordinate", &self.coordinate)
            .field("producer", &self.producer.descriptor().name())
            .field("bindings", &self.bindings)
            .finish()
    }
}

impl Resolver {
    pub fn coordinate(&self) -> &FieldCoordinate {
        &self.coordinate
    }

    pub fn producer_name(&self) -> &str {
        self.producer.descriptor().name()
    }

    /// The binding of each input slot, in the producer's slot order.
    pub fn bindings(&self) -> impl Iterator<Item = (&InputSlot, &Binding)> {
        self.bindings.iter().map(|(slot, binding)| (slot, binding))
    }

    fn bind_inputs(&self, frame: &ExecutionFrame) -> Result<Object, FieldError> {
        let mut inputs = Object::new();
        for (slot, binding) in &self.bindings {
            inputs.insert(
                slot.name().to_string(),
                binding.resolve(frame, slot, &self.coordinate)?,
            );
        }
        Ok(inputs)
    }

    async fn resolve(&self, frame: &ExecutionFrame) -> FieldResolution {
        let inputs = match self.bind_inputs(frame) {
            Ok(inputs) => inputs,
            Err(error) => return FieldResolution::failed(error, CacheabilityFacts::new()),
        };

        let mut scope = FieldScope::new();
        let result = self.producer.invoke(inputs, &mut scope).await;
        let (facts, published) = scope.into_parts();

        match result {
            Ok(value) => FieldResolution {
                value,
                facts,
                published,
                error: None,
            },
            Err(source) => FieldResolution::failed(
                FieldError::ProducerDomainError {
                    coordinate: self.coordinate.to_string(),
                    producer: self.producer_name().to_string(),
                    source,
                },
                facts,
            ),
        }
    }
}

/// Resolvers by field coordinate, validated against a producer catalog.
///
/// Built at start-up; every configuration fault is reported by
/// [`register`](Self::register) before any request is served.
#[derive(Debug, Default)]
pub struct ResolverRegistry {
    catalog: ProducerCatalog,
    resolvers: IndexMap<FieldCoordinate, Resolver>,
}

impl ResolverRegistry {
    pub fn new(catalog: ProducerCatalog) -> Self {
        Self {
            catalog,
            resolvers: IndexMap::new(),
        }
    }

    /// Builds a registry from the `resolvers` section of a configuration.
    pub fn from_configuration(
        catalog: ProducerCatalog,
        configuration: &Configuration,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(catalog);
        for (type_name, fields) in &configuration.resolvers {
            for (field_name, spec) in fields {
                registry.register(type_name, field_name, spec.clone())?;
            }
        }
        Ok(registry)
    }

    pub fn catalog(&self) -> &ProducerCatalog {
        &self.catalog
    }

    /// Registers the resolver of `type_name.field_name`.
    ///
    /// On error the registry is left unchanged.
    pub fn register(
        &mut self,
        type_name: &str,
        field_name: &str,
        spec: ResolverSpec,
    ) -> Result<(), RegistryError> {
        let coordinate = FieldCoordinate::new(type_name, field_name);
        if self.resolvers.contains_key(&coordinate) {
            return Err(RegistryError::DuplicateResolver(coordinate.to_string()));
        }

        let producer = self.catalog.get(&spec.producer).cloned().ok_or_else(|| {
            RegistryError::UnknownProducer {
                coordinate: coordinate.to_string(),
                producer: spec.producer.clone(),
            }
        })?;
        let descriptor = producer.descriptor();

        if let Some(slot) = spec.duplicates.first() {
            return Err(RegistryError::DuplicateBinding {
                coordinate: coordinate.to_string(),
                slot: slot.clone(),
            });
        }

        if let Some(slot) = spec
            .inputs
            .keys()
            .find(|slot| descriptor.input(slot).is_none())
        {
            return Err(RegistryError::UndeclaredSlot {
                coordinate: coordinate.to_string(),
                producer: spec.producer.clone(),
                slot: slot.clone(),
            });
        }

        let mut inputs = spec.inputs;
        let bindings = descriptor
            .inputs()
            .iter()
            .map(|slot| match inputs.swap_remove(slot.name()) {
                Some(binding) => Ok((slot.clone(), binding)),
                None => Err(RegistryError::MissingBinding {
                    coordinate: coordinate.to_string(),
                    producer: spec.producer.clone(),
                    slot: slot.name().to_string(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(%coordinate, producer = %spec.producer, "registered resolver");
        self.resolvers.insert(
            coordinate.clone(),
            Resolver {
                coordinate,
                producer,
                bindings,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, type_name: &str, field_name: &str) -> Result<&Resolver, FieldError> {
        self.resolvers
            .get(&FieldCoordinate::new(type_name, field_name))
            .ok_or_else(|| FieldError::RegistryNotFound {
                coordinate: FieldCoordinate::new(type_name, field_name).to_string(),
            })
    }

    pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
        self.resolvers
            .contains_key(&FieldCoordinate::new(type_name, field_name))
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn coordinates(&self) -> impl Iterator<Item = &FieldCoordinate> {
        self.resolvers.keys()
    }

    /// Resolves one field: binds the inputs of its resolver against `frame`,
    /// invokes the producer and merges the recorded facts into the frame's
    /// accumulator.
    ///
    /// A failed field still contributes what its producer recorded, but is
    /// uncacheable.
    pub async fn resolve_field(
        &self,
        type_name: &str,
        field_name: &str,
        frame: &ExecutionFrame,
    ) -> FieldResolution {
        let resolution = match self.lookup(type_name, field_name) {
            Ok(resolver) => resolver.resolve(frame).await,
            Err(error) => FieldResolution::failed(error, CacheabilityFacts::new()),
        };

        tracing::trace!(
            type_name,
            field_name,
            path = %frame.path(),
            max_age = %resolution.facts.max_age(),
            failed = resolution.error.is_some(),
            "resolved field"
        );
        frame.cacheability().merge(&resolution.facts);
        resolution
    }

    /// Object fields of `schema` that have no resolver, introspection aside.
    pub fn missing_resolvers(&self, schema: &Schema) -> Vec<FieldCoordinate> {
        let missing: Vec<FieldCoordinate> = schema
            .object_fields()
            .filter(|coordinate| !self.resolvers.contains_key(coordinate))
            .collect();
        for coordinate in &missing {
            tracing::warn!(%coordinate, "no resolver registered for schema field");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json_bytes::json;

    use super::*;
    use crate::producer::ProducerDescriptor;
    use crate::producer::ProducerError;

    fn catalog() -> ProducerCatalog {
        let mut catalog = ProducerCatalog::new();
        catalog
            .register_fn(
                ProducerDescriptor::new(
                    "bundle_label",
                    vec![
                        InputSlot::required("entity_type", "String"),
                        InputSlot::nullable("bundle", "String"),
                    ],
                    "String",
                )
                .unwrap(),
                |inputs, scope| {
                    scope.add_cache_tag("entity_types");
                    scope.add_cache_context("languages:language_interface");
                    match inputs.get("bundle") {
                        Some(Value::String(bundle)) if bundle.as_str() == "article" => {
                            scope.publish("bundle", json!("article"));
                            Ok(json!("Article"))
                        }
                        Some(Value::Null) | None => Ok(json!("Content")),
                        Some(other) => Err(ProducerError::NotFound {
                            what: "bundle",
                            id: other.as_str().unwrap_or_default().to_string(),
                        }),
                    }
                },
            )
            .unwrap();
        catalog
    }

    fn bundle_label() -> ResolverSpec {
        ResolverSpec::produce("bundle_label")
            .map("entity_type", Binding::literal("node"))
            .map("bundle", Binding::argument("bundle"))
    }

    #[test]
    fn duplicate_registration_leaves_the_registry_unchanged() {
        let mut registry = ResolverRegistry::new(catalog());
        registry.register("Query", "label", bundle_label()).unwrap();

        let error = registry
            .register(
                "Query",
                "label",
                ResolverSpec::produce("bundle_label")
                    .map("entity_type", Binding::literal("user"))
                    .map("bundle", Binding::parent()),
            )
            .unwrap_err();

        assert_eq!(error, RegistryError::DuplicateResolver("Query.label".to_string()));
        assert_eq!(registry.len(), 1);
        let resolver = registry.lookup("Query", "label").unwrap();
        assert_eq!(
            resolver.bindings().map(|(_, binding)| binding.clone()).collect::<Vec<_>>(),
            vec![Binding::literal("node"), Binding::argument("bundle")]
        );
    }

    #[test]
    fn configuration_faults_are_detected_at_registration() {
        let mut registry = ResolverRegistry::new(catalog());

        assert_eq!(
            registry
                .register("Query", "label", ResolverSpec::produce("nope"))
                .unwrap_err(),
            RegistryError::UnknownProducer {
                coordinate: "Query.label".to_string(),
                producer: "nope".to_string(),
            }
        );
        assert_eq!(
            registry
                .register(
                    "Query",
                    "label",
                    bundle_label().map("langcode", Binding::literal("en"))
                )
                .unwrap_err(),
            RegistryError::UndeclaredSlot {
                coordinate: "Query.label".to_string(),
                producer: "bundle_label".to_string(),
                slot: "langcode".to_string(),
            }
        );
        assert_eq!(
            registry
                .register(
                    "Query",
                    "label",
                    ResolverSpec::produce("bundle_label")
                        .map("entity_type", Binding::literal("node"))
                )
                .unwrap_err(),
            RegistryError::MissingBinding {
                coordinate: "Query.label".to_string(),
                producer: "bundle_label".to_string(),
                slot: "bundle".to_string(),
            }
        );
        assert_eq!(
            registry
                .register(
                    "Query",
                    "label",
                    bundle_label().map("bundle", Binding::literal("page"))
                )
                .unwrap_err(),
            RegistryError::DuplicateBinding {
                coordinate: "Query.label".to_string(),
                slot: "bundle".to_string(),
            }
        );
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn resolve_field_merges_facts_into_the_frame() {
        let mut registry = ResolverRegistry::new(catalog());
        registry.register("Query", "label", bundle_label()).unwrap();

        let frame = ExecutionFrame::builder()
            .type_name("Query")
            .argument("bundle", "article")
            .build();
        let resolution = registry.resolve_field("Query", "label", &frame).await;

        assert_eq!(resolution.value, json!("Article"));
        assert!(resolution.error.is_none());
        assert_eq!(resolution.published.get("bundle"), Some(&json!("article")));

        let facts = frame.seal().into_facts();
        assert_eq!(facts.max_age(), MaxAge::Permanent);
        assert!(facts.tags().contains("entity_types"));
        assert!(facts.contexts().contains("languages:language_interface"));
    }

    #[tokio::test]
    async fn failed_fields_keep_their_facts_but_are_uncacheable() {
        let mut registry = ResolverRegistry::new(catalog());
        registry.register("Query", "label", bundle_label()).unwrap();

        let frame = ExecutionFrame::builder()
            .type_name("Query")
            .argument("bundle", "page")
            .build();
        let resolution = registry.resolve_field("Query", "label", &frame).await;

        assert_eq!(resolution.value, Value::Null);
        assert!(resolution.published.is_empty());
        assert_eq!(
            resolution.error.map(|error| error.to_string()).as_deref(),
            Some("bundle 'page' does not exist")
        );
        let facts = frame.seal().into_facts();
        assert_eq!(facts.max_age(), MaxAge::UNCACHEABLE);
        assert!(facts.tags().contains("entity_types"));
    }

    #[tokio::test]
    async fn unknown_fields_are_not_found() {
        let registry = ResolverRegistry::new(catalog());
        let frame = ExecutionFrame::builder().type_name("Query").build();

        let resolution = registry.resolve_field("Query", "missing", &frame).await;
        assert!(
            resolution
                .error
                .as_ref()
                .is_some_and(FieldError::is_configuration_fault)
        );
        assert!(!frame.seal().facts().is_cacheable());
    }
}
