//! Execution of an operation against a resolver registry.
//!
//! The walker resolves a selection set field by field. Every field gets its
//! own [`ExecutionFrame`]: the parent value, the field arguments, the context
//! inherited from its ancestors and an open cacheability accumulator. Once the
//! field and its subtree complete, the frame is sealed and folded into the
//! parent's accumulator, so the root frame ends up with the cacheability of
//! the whole response.

mod selection;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::future::FutureExt;
use futures::future::join_all;
pub use selection::ArgumentValue;
pub use selection::FieldSelection;
pub use selection::Operation;
pub use selection::TYPENAME;
pub(crate) use selection::IncludeSkip;
pub(crate) use selection::merge_into;

use crate::cacheability::CacheabilityAccumulator;
use crate::cacheability::CacheabilityFacts;
use crate::configuration::Configuration;
use crate::configuration::ConfigurationError;
use crate::error::FieldError;
use crate::frame::ContextMap;
use crate::frame::ExecutionFrame;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::producer::ProducerCatalog;
use crate::registry::ResolverRegistry;
use crate::spec::Query;
use crate::spec::Schema;

/// A field error and where it happened.
#[derive(Debug)]
struct FieldFailure {
    path: Path,
    error: FieldError,
}

/// Executes operations against a [`ResolverRegistry`].
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<ResolverRegistry>,
    base_facts: CacheabilityFacts,
    concurrent_siblings: bool,
    permanent_max_age: u32,
}

#[buildstructor::buildstructor]
impl Executor {
    /// Returns a builder for an executor.
    ///
    /// Every response starts from `cacheability` (neutral by default).
    /// Sibling fields resolve concurrently unless `concurrent_siblings` is
    /// false.
    #[builder(visibility = "pub")]
    fn new(
        registry: Arc<ResolverRegistry>,
        cacheability: Option<CacheabilityFacts>,
        concurrent_siblings: Option<bool>,
        permanent_max_age: Option<u32>,
    ) -> Self {
        let defaults = Configuration::default();
        Self {
            registry,
            base_facts: cacheability.unwrap_or_default(),
            concurrent_siblings: concurrent_siblings
                .unwrap_or(defaults.execution.concurrent_siblings),
            permanent_max_age: permanent_max_age.unwrap_or(defaults.cache.permanent_max_age),
        }
    }

    /// Wires the resolvers of `configuration` to the producers of `catalog`.
    pub fn from_configuration(
        catalog: ProducerCatalog,
        configuration: &Configuration,
    ) -> Result<Self, ConfigurationError> {
        let registry = ResolverRegistry::from_configuration(catalog, configuration)?;
        Ok(Executor::builder()
            .registry(Arc::new(registry))
            .cacheability(configuration.cache.base_facts())
            .concurrent_siblings(configuration.execution.concurrent_siblings)
            .permanent_max_age(configuration.cache.permanent_max_age)
            .build())
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Max-age advertised in `cache-control` for permanent responses.
    pub fn permanent_max_age(&self) -> u32 {
        self.permanent_max_age
    }

    /// Parses `query` against `schema` and executes it.
    ///
    /// Documents that fail to parse or validate give a response without data,
    /// which is never cacheable.
    pub async fn execute_request(
        &self,
        schema: &Schema,
        query: &str,
        operation_name: Option<&str>,
        variables: &Object,
    ) -> Response {
        match Query::parse(schema, query, operation_name) {
            Ok(query) => self.execute(query.operation(), variables).await,
            Err(error) => {
                tracing::debug!(%error, "invalid request");
                Response::from_errors(vec![error.to_graphql_error()])
            }
        }
    }

    /// Executes `operation` and returns the response with its cacheability.
    ///
    /// Field errors null their field and are reported in selection order;
    /// they never stop sibling fields. A response reporting a configuration
    /// fault is never cacheable.
    #[tracing::instrument(skip_all, level = "trace", fields(root = operation.root_type()))]
    pub async fn execute(&self, operation: &Operation, variables: &Object) -> Response {
        let variables = operation.variables(variables);
        let root = ExecutionFrame::builder()
            .type_name(operation.root_type())
            .cacheability(self.base_facts.clone())
            .build();

        let (data, failures) = self
            .execute_selection_set(
                operation.root_type(),
                operation.selection_set(),
                root.parent_value(),
                root.context(),
                Path::empty(),
                &variables,
                root.cacheability(),
            )
            .await;

        if failures
            .iter()
            .any(|failure| failure.error.is_configuration_fault())
        {
            tracing::warn!(
                errors = failures.len(),
                "response reports a configuration fault, it will not be cached"
            );
            root.cacheability().mark_uncacheable();
        }

        let errors = failures
            .into_iter()
            .map(|failure| failure.error.to_graphql_error(Some(failure.path)))
            .collect();

        Response::builder()
            .data(Value::Object(data))
            .errors(errors)
            .cacheability(root.seal().into_facts())
            .build()
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_selection_set<'a>(
        &'a self,
        type_name: &'a str,
        selection_set: &'a [FieldSelection],
        parent_value: &'a Value,
        context: &'a ContextMap,
        path: Path,
        variables: &'a Object,
        accumulator: &'a CacheabilityAccumulator,
    ) -> BoxFuture<'a, (Object, Vec<FieldFailure>)> {
        async move {
            let selection_set: Vec<&FieldSelection> = selection_set
                .iter()
                .filter(|field| !field.is_skipped(variables))
                .collect();
            let fields = selection_set.iter().map(|&field| {
                self.execute_field(
                    type_name,
                    field,
                    parent_value,
                    context,
                    path.join(field.response_key()),
                    variables,
                    accumulator,
                )
            });

            let results = if self.concurrent_siblings {
                join_all(fields).await
            } else {
                let mut results = Vec::with_capacity(selection_set.len());
                for field in fields {
                    results.push(field.await);
                }
                results
            };

            let mut data = Object::new();
            let mut failures = Vec::new();
            for (field, (value, field_failures)) in selection_set.into_iter().zip(results) {
                data.insert(field.response_key().to_string(), value);
                failures.extend(field_failures);
            }
            (data, failures)
        }
        .boxed()
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_field<'a>(
        &'a self,
        type_name: &'a str,
        field: &'a FieldSelection,
        parent_value: &'a Value,
        context: &'a ContextMap,
        path: Path,
        variables: &'a Object,
        accumulator: &'a CacheabilityAccumulator,
    ) -> BoxFuture<'a, (Value, Vec<FieldFailure>)> {
        async move {
            if field.name() == TYPENAME {
                return (Value::from(type_name), Vec::new());
            }

            let frame = ExecutionFrame::builder()
                .type_name(type_name)
                .path(path.clone())
                .parent_value(parent_value.clone())
                .arguments(field.resolve_arguments(variables))
                .context(context.clone())
                .build();

            let resolution = self
                .registry
                .resolve_field(type_name, field.name(), &frame)
                .await;

            let mut failures = Vec::new();
            if let Some(error) = resolution.error {
                failures.push(FieldFailure {
                    path: path.clone(),
                    error,
                });
            }

            let value = if field.selection_set().is_empty() {
                resolution.value
            } else {
                let child_context = frame.context().branch(&resolution.published);
                let (value, child_failures) = self
                    .complete_value(
                        field,
                        resolution.value,
                        &child_context,
                        path,
                        variables,
                        frame.cacheability(),
                    )
                    .await;
                failures.extend(child_failures);
                value
            };

            accumulator.merge_sealed(frame.seal());
            (value, failures)
        }
        .boxed()
    }

    /// Resolves the selection set of `field` for its value, item by item for lists.
    fn complete_value<'a>(
        &'a self,
        field: &'a FieldSelection,
        value: Value,
        context: &'a ContextMap,
        path: Path,
        variables: &'a Object,
        accumulator: &'a CacheabilityAccumulator,
    ) -> BoxFuture<'a, (Value, Vec<FieldFailure>)> {
        async move {
            match value {
                Value::Null => (Value::Null, Vec::new()),
                Value::Array(items) => {
                    let items = items.into_iter().enumerate().map(|(index, item)| {
                        self.complete_value(
                            field,
                            item,
                            context,
                            path.join(index),
                            variables,
                            accumulator,
                        )
                    });
                    let completed = if self.concurrent_siblings {
                        join_all(items).await
                    } else {
                        let mut completed = Vec::new();
                        for item in items {
                            completed.push(item.await);
                        }
                        completed
                    };

                    let mut failures = Vec::new();
                    let values = completed
                        .into_iter()
                        .map(|(value, item_failures)| {
                            failures.extend(item_failures);
                            value
                        })
                        .collect();
                    (Value::Array(values), failures)
                }
                parent_value => {
                    let (object, failures) = self
                        .execute_selection_set(
                            field.type_name(),
                            field.selection_set(),
                            &parent_value,
                            context,
                            path,
                            variables,
                            accumulator,
                        )
                        .await;
                    (Value::Object(object), failures)
                }
            }
        }
        .boxed()
    }
}
