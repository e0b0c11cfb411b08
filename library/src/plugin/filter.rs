//! Filter SDK: the contract between the engine and filter implementations.

use std::error::Error;

use thiserror::Error;

use crate::error::BuildError;
use crate::model::project::{Property, PropertyProvider};
use crate::pipeline::context::FilterContext;
use crate::plugin::value::{Value, ValueType};

/// What an input accepts.
#[derive(Clone, Debug, PartialEq)]
pub enum InputKind {
    /// Literal stored in properties.
    Value(ValueType),
    /// Output of one other node.
    Node,
    /// Outputs of several other nodes, in reference order.
    Nodes,
    /// A template, handed over as a callable.
    Pipeline,
}

/// Metadata for one filter input.
#[derive(Clone, Debug, PartialEq)]
pub struct InputDescriptor {
    pub name: String,
    pub kind: InputKind,
    pub title: Option<String>,
    pub default: Option<Property>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub allowed_values: Vec<String>,
}

impl InputDescriptor {
    fn with_kind(name: &str, kind: InputKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            title: None,
            default: None,
            minimum: None,
            maximum: None,
            allowed_values: Vec::new(),
        }
    }

    pub fn value(name: &str, value_type: ValueType) -> Self {
        Self::with_kind(name, InputKind::Value(value_type))
    }

    pub fn node(name: &str) -> Self {
        Self::with_kind(name, InputKind::Node)
    }

    pub fn nodes(name: &str) -> Self {
        Self::with_kind(name, InputKind::Nodes)
    }

    pub fn pipeline(name: &str) -> Self {
        Self::with_kind(name, InputKind::Pipeline)
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(Property::Value(default.to_string()));
        self
    }

    pub fn with_default_array(mut self, default: &[&str]) -> Self {
        self.default = Some(Property::Array(
            default.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn with_allowed(mut self, allowed: &[&str]) -> Self {
        self.allowed_values = allowed.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn value_type(&self) -> Option<&ValueType> {
        match &self.kind {
            InputKind::Value(t) => Some(t),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// Metadata describing a filter type.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterDescriptor {
    /// Class identifier nodes use to refer to this filter.
    pub key: String,
    pub title: Option<String>,
    /// Display format, e.g. `"{Value1} + {Value2}"`.
    pub format: Option<String>,
    pub inputs: Vec<InputDescriptor>,
}

impl FilterDescriptor {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            title: None,
            format: None,
            inputs: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_input(mut self, input: InputDescriptor) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn input(&self, name: &str) -> Option<&InputDescriptor> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Title shown for a node of this type.
    ///
    /// `{Name}` placeholders in the format are replaced with the stored
    /// property (arrays joined with ", "); unknown or unset names render as
    /// `?`. Without a format the title, then the key, is used.
    pub fn display_title(&self, properties: &impl PropertyProvider) -> String {
        let Some(format) = &self.format else {
            return self.title.clone().unwrap_or_else(|| self.key.clone());
        };

        let mut out = String::with_capacity(format.len());
        let mut rest = format.as_str();
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &after[..end];
            let default = self.input(name).and_then(|i| i.default.as_ref());
            let rendered = match properties.property(name).or(default) {
                Some(Property::Value(v)) => v.clone(),
                Some(Property::Array(a)) if !a.is_empty() => a.join(", "),
                _ => "?".to_string(),
            };
            out.push_str(&rendered);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

/// Errors a filter reports back to the engine.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Evaluation cancelled")]
    Cancelled,
    #[error("No filter is registered for class '{0}'")]
    MissingPlugin(String),
    #[error("Unknown input '{0}'")]
    UnknownInput(String),
    #[error("Input '{name}' expects {expected}, got {found}")]
    InputType {
        name: String,
        expected: String,
        found: &'static str,
    },
    #[error("Required input '{0}' is not set")]
    MissingInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Build(Box<BuildError>),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

impl From<BuildError> for FilterError {
    fn from(err: BuildError) -> Self {
        FilterError::Build(Box::new(err))
    }
}

impl FilterError {
    pub fn input_type(name: &str, expected: impl ToString, found: &Value) -> Self {
        FilterError::InputType {
            name: name.to_string(),
            expected: expected.to_string(),
            found: found.type_name(),
        }
    }

    pub fn message(msg: impl Into<String>) -> Self {
        FilterError::Message(msg.into())
    }
}

/// Read an integer input.
pub fn integer_input(name: &str, value: &Value) -> Result<i64, FilterError> {
    value
        .as_i64()
        .ok_or_else(|| FilterError::input_type(name, ValueType::Integer, value))
}

/// A filter: one typed computation step.
///
/// The engine creates a fresh instance per node per evaluator, assigns every
/// input through `set_input`, then calls `evaluate` (or `preview`).
pub trait Filter: Send {
    fn descriptor(&self) -> FilterDescriptor;

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError>;

    fn evaluate(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError>;

    /// Cheap evaluation for preview runs. Defaults to a full evaluation.
    fn preview(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        self.evaluate(context)
    }
}

/// Base trait for loadable plugins.
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> String;
    fn version(&self) -> (u32, u32, u32);
}

/// A plugin contributing filter types.
pub trait FilterPlugin: Plugin {
    fn register(&self, registry: &mut crate::plugin::registry::FilterRegistry);
}

/// Entry point every filter plugin library exports as `create_filter_plugin`.
pub type FilterPluginCreateFn = unsafe extern "C" fn() -> *mut dyn FilterPlugin;
