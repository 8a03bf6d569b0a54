//! Per-field execution state and the context maps flowing down the tree.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;

use crate::cacheability::CacheabilityAccumulator;
use crate::cacheability::CacheabilityFacts;
use crate::cacheability::SealedCacheability;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Values published by a producer for the descendants of its field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextOverlay {
    entries: IndexMap<String, Value>,
}

impl ContextOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ContextOverlay {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut overlay = ContextOverlay::new();
        for (key, value) in iter {
            overlay.insert(key, value);
        }
        overlay
    }
}

/// The context visible to a frame: an immutable map of opaque values keyed
/// by agreed-upon names (`bundle`, `entity_form_display`, ...).
///
/// A map is never modified in place. [`branch`](Self::branch) gives a child
/// its own copy with an overlay applied, so what one child sees never leaks
/// to its siblings or ancestors. Maps without an overlay share storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextMap {
    entries: Arc<IndexMap<String, Value>>,
}

impl ContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The context of a child frame: this map with `overlay` applied on top.
    pub fn branch(&self, overlay: &ContextOverlay) -> ContextMap {
        if overlay.is_empty() {
            return self.clone();
        }
        let mut entries = IndexMap::clone(&self.entries);
        for (key, value) in overlay.iter() {
            entries.insert(key.to_string(), value.clone());
        }
        ContextMap {
            entries: Arc::new(entries),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ContextMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        ContextMap::new().branch(&iter.into_iter().collect())
    }
}

/// Transient state for the resolution of one field.
#[derive(Debug)]
pub struct ExecutionFrame {
    type_name: String,
    path: Path,
    parent_value: Value,
    arguments: Object,
    context: ContextMap,
    cacheability: CacheabilityAccumulator,
}

#[buildstructor::buildstructor]
impl ExecutionFrame {
    /// Returns a builder for a frame.
    ///
    /// Only `type_name` is required. The parent value defaults to `null`, the
    /// path and arguments to empty, the context to an empty map and the
    /// cacheability to the neutral facts.
    #[builder(visibility = "pub")]
    fn new(
        type_name: String,
        path: Option<Path>,
        parent_value: Option<Value>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        arguments: JsonMap<ByteString, Value>,
        context: Option<ContextMap>,
        cacheability: Option<CacheabilityFacts>,
    ) -> Self {
        Self {
            type_name,
            path: path.unwrap_or_default(),
            parent_value: parent_value.unwrap_or_default(),
            arguments,
            context: context.unwrap_or_default(),
            cacheability: cacheability
                .map(CacheabilityAccumulator::starting_from)
                .unwrap_or_default(),
        }
    }

    /// Name of the object type the field belongs to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The value the parent field resolved to.
    pub fn parent_value(&self) -> &Value {
        &self.parent_value
    }

    pub fn arguments(&self) -> &Object {
        &self.arguments
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    pub fn context(&self) -> &ContextMap {
        &self.context
    }

    /// The open accumulator of the field's subtree.
    pub fn cacheability(&self) -> &CacheabilityAccumulator {
        &self.cacheability
    }

    /// Ends the frame, returning the cacheability of its whole subtree.
    pub fn seal(self) -> SealedCacheability {
        self.cacheability.seal()
    }
}
