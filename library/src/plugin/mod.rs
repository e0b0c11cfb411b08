//! Filter SDK, registry and dynamic plugin loading.

pub mod builtin;
pub mod filter;
pub mod loader;
pub mod registry;
pub mod value;

pub use filter::{
    Filter, FilterDescriptor, FilterError, FilterPlugin, FilterPluginCreateFn, InputDescriptor,
    InputKind, Plugin, integer_input,
};
pub use loader::{PluginHandle, PluginLoadReport, PluginLoader};
pub use registry::{FilterRegistry, PluginInfo, UnknownFilter};
pub use value::{Value, ValueType};
