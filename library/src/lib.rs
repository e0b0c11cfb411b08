//! Content-build pipeline engine.
//!
//! A [`Project`](model::project::Project) holds tasks, each a graph of nodes
//! whose filters are looked up in a [`FilterRegistry`]. The [`Builder`]
//! evaluates every enabled task under one configuration.

pub mod binding;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod plugin;

pub use cli::run;
pub use error::BuildError;
pub use pipeline::{Builder, BuildReport, BuildRequest, PipelineEvaluator};
pub use plugin::{FilterRegistry, PluginLoader, Value};

/// Registry holding the builtin filters.
pub fn create_filter_registry() -> FilterRegistry {
    FilterRegistry::with_builtins()
}
