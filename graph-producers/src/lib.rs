//! Declarative GraphQL field resolvers composed from data producers.
//!
//! A [`producer::Producer`] is a small named unit of computation: typed inputs
//! in, one value and its [`cacheability::CacheabilityFacts`] out. A
//! [`registry::Resolver`] binds a producer to one `(type, field)` coordinate by
//! mapping each of the producer's input slots to a [`binding::Binding`]
//! (literal, argument, context or parent value). The [`execution::Executor`]
//! walks a selection tree, invokes resolvers field by field, propagates
//! published context values downwards and folds every producer's
//! cacheability into a single verdict attached to the response.

#![warn(unreachable_pub)]

pub mod binding;
pub mod cacheability;
pub mod configuration;
pub mod entity;
pub mod error;
pub mod execution;
pub mod frame;
pub mod graphql;
pub mod json_ext;
pub mod producer;
pub mod producers;
pub mod registry;
pub mod spec;

pub use configuration::Configuration;
pub use execution::Executor;
pub use registry::ResolverRegistry;
pub use spec::Schema;
