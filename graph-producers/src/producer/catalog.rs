use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::DynProducer;
use super::FieldScope;
use super::FnProducer;
use super::Producer;
use super::ProducerDescriptor;
use super::ProducerError;
use super::TypedProducer;
use crate::error::RegistryError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// Producers by name, in registration order.
///
/// Cloning a catalog is cheap: producers are shared.
#[derive(Clone, Default)]
pub struct ProducerCatalog {
    producers: IndexMap<String, Arc<dyn DynProducer>>,
}

impl fmt::Debug for ProducerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerCatalog")
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProducerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed producer under [`Producer::NAME`].
    pub fn register<P: Producer>(&mut self, producer: P) -> Result<(), RegistryError> {
        self.insert(Arc::new(TypedProducer::new(producer)?))
    }

    /// Registers a synchronous closure under the name of `descriptor`.
    ///
    /// The closure receives the bound inputs keyed by slot name.
    pub fn register_fn<F>(
        &mut self,
        descriptor: ProducerDescriptor,
        produce: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Object, &mut FieldScope) -> Result<Value, ProducerError> + Send + Sync + 'static,
    {
        self.insert(Arc::new(FnProducer::new(descriptor, produce)))
    }

    pub fn register_dyn(&mut self, producer: Arc<dyn DynProducer>) -> Result<(), RegistryError> {
        self.insert(producer)
    }

    fn insert(&mut self, producer: Arc<dyn DynProducer>) -> Result<(), RegistryError> {
        let name = producer.descriptor().name().to_string();
        if self.producers.contains_key(&name) {
            return Err(RegistryError::DuplicateProducer(name));
        }
        tracing::debug!(producer = %name, "registered producer");
        self.producers.insert(name, producer);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynProducer>> {
        self.producers.get(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ProducerDescriptor> {
        self.producers.get(name).map(|producer| producer.descriptor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.producers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

static PRODUCER_CATALOG: Lazy<RwLock<ProducerCatalog>> =
    Lazy::new(|| RwLock::new(ProducerCatalog::new()));

/// Registers a producer in the process-wide catalog.
pub fn register_producer<P: Producer>(producer: P) -> Result<(), RegistryError> {
    PRODUCER_CATALOG.write().register(producer)
}

/// A snapshot of the process-wide catalog.
pub fn producers() -> ProducerCatalog {
    PRODUCER_CATALOG.read().clone()
}
