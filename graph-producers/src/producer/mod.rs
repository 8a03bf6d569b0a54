//! Producers: named units of computation that resolvers are composed from.
//!
//! A producer receives its bound inputs and a [`FieldScope`] in which it
//! records the cacheability of everything it read and publishes context
//! values for the descendants of the field being resolved. Typed producers
//! implement [`Producer`]; the catalog stores them behind [`DynProducer`].

mod catalog;
mod descriptor;

use async_trait::async_trait;
pub use catalog::ProducerCatalog;
pub use catalog::producers;
pub use catalog::register_producer;
pub use descriptor::InputSlot;
pub use descriptor::ProducerDescriptor;
pub use descriptor::TypeTag;
use displaydoc::Display;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::cacheability::CacheabilityFacts;
use crate::cacheability::MaxAge;
use crate::error::RegistryError;
use crate::frame::ContextOverlay;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Errors returned by producers.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProducerError {
    /// {what} '{id}' does not exist
    NotFound { what: &'static str, id: String },

    /// invalid input for producer '{producer}': {reason}
    InvalidInput { producer: String, reason: String },

    /// {0}
    Domain(String),
}

/// Something a producer read whose cacheability the result inherits.
pub trait CacheableDependency {
    fn cacheability(&self) -> CacheabilityFacts;
}

impl CacheableDependency for CacheabilityFacts {
    fn cacheability(&self) -> CacheabilityFacts {
        self.clone()
    }
}

/// What a producer may write while it runs: cacheability facts and the
/// context overlay published to the field's descendants.
///
/// Facts recorded before a producer fails are kept.
#[derive(Debug, Default)]
pub struct FieldScope {
    facts: CacheabilityFacts,
    published: ContextOverlay,
}

impl FieldScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The result varies by this request dimension, e.g. `user.permissions`.
    pub fn add_cache_context(&mut self, context: impl Into<String>) {
        self.facts.add_context(context);
    }

    /// The result must be invalidated when this tag is, e.g. `entity_types`.
    pub fn add_cache_tag(&mut self, tag: impl Into<String>) {
        self.facts.add_tag(tag);
    }

    pub fn merge_max_age(&mut self, max_age: MaxAge) {
        self.facts.merge_max_age(max_age);
    }

    pub fn add_dependency(&mut self, dependency: &impl CacheableDependency) {
        self.facts.merge(&dependency.cacheability());
    }

    /// Makes `value` visible under `key` to every descendant of the field.
    pub fn publish(&mut self, key: impl Into<String>, value: Value) {
        self.published.insert(key, value);
    }

    pub fn facts(&self) -> &CacheabilityFacts {
        &self.facts
    }

    pub fn published(&self) -> &ContextOverlay {
        &self.published
    }

    pub fn into_parts(self) -> (CacheabilityFacts, ContextOverlay) {
        (self.facts, self.published)
    }
}

/// A producer with typed inputs.
///
/// The input slots of the producer are the fields of [`Producer::Input`], in
/// declaration order; optional fields are nullable slots.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send;

    /// Unique name under which the producer is registered.
    const NAME: &'static str;

    /// Type tag of the produced value.
    const OUTPUT: &'static str;

    async fn produce(
        &self,
        input: Self::Input,
        scope: &mut FieldScope,
    ) -> Result<Value, ProducerError>;
}

/// An object-safe producer, as stored in a [`ProducerCatalog`].
#[async_trait]
pub trait DynProducer: Send + Sync + 'static {
    fn descriptor(&self) -> &ProducerDescriptor;

    /// Invokes the producer with inputs keyed by slot name.
    async fn invoke(&self, inputs: Object, scope: &mut FieldScope) -> Result<Value, ProducerError>;
}

pub(crate) struct TypedProducer<P> {
    producer: P,
    descriptor: ProducerDescriptor,
}

impl<P: Producer> TypedProducer<P> {
    pub(crate) fn new(producer: P) -> Result<Self, RegistryError> {
        Ok(Self {
            producer,
            descriptor: ProducerDescriptor::from_input_type::<P::Input>(P::NAME, P::OUTPUT)?,
        })
    }
}

#[async_trait]
impl<P: Producer> DynProducer for TypedProducer<P> {
    fn descriptor(&self) -> &ProducerDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, inputs: Object, scope: &mut FieldScope) -> Result<Value, ProducerError> {
        let input = serde_json_bytes::from_value::<P::Input>(Value::Object(inputs)).map_err(
            |error| ProducerError::InvalidInput {
                producer: P::NAME.to_string(),
                reason: error.to_string(),
            },
        )?;
        self.producer.produce(input, scope).await
    }
}

/// A producer made of a synchronous closure and an explicit descriptor.
pub(crate) struct FnProducer<F> {
    descriptor: ProducerDescriptor,
    produce: F,
}

impl<F> FnProducer<F>
where
    F: Fn(&Object, &mut FieldScope) -> Result<Value, ProducerError> + Send + Sync + 'static,
{
    pub(crate) fn new(descriptor: ProducerDescriptor, produce: F) -> Self {
        Self {
            descriptor,
            produce,
        }
    }
}

#[async_trait]
impl<F> DynProducer for FnProducer<F>
where
    F: Fn(&Object, &mut FieldScope) -> Result<Value, ProducerError> + Send + Sync + 'static,
{
    fn descriptor(&self) -> &ProducerDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, inputs: Object, scope: &mut FieldScope) -> Result<Value, ProducerError> {
        (self.produce)(&inputs, scope)
    }
}
