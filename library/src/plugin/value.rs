//! Runtime values exchanged between bindings, filters and the evaluator.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;

use crate::pipeline::evaluator::PipelineCallable;

/// A value produced by evaluating a node or read from a value binding.
#[derive(Clone)]
pub enum Value {
    /// Absence: an unset input or a sink filter's result.
    None,
    Integer(i64),
    Float(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
    Date(DateTime<Utc>),
    Path(PathBuf),
    Array(Vec<Value>),
    /// Arbitrary filter output.
    Object(Arc<dyn Any + Send + Sync>),
    /// A set-up template, invoked explicitly by the consuming filter.
    Pipeline(PipelineCallable),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Path(_) => "path",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Pipeline(_) => "pipeline",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(v.into_inner()),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            Value::Path(p) => Some(p.clone()),
            Value::Text(s) => Some(PathBuf::from(s)),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_pipeline(&self) -> Option<&PipelineCallable> {
        match self {
            Value::Pipeline(p) => Some(p),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Integer(v) => write!(f, "Integer({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Text(v) => write!(f, "Text({:?})", v),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Date(v) => write!(f, "Date({})", v.to_rfc3339()),
            Value::Path(v) => write!(f, "Path({})", v.display()),
            Value::Array(v) => f.debug_list().entries(v).finish(),
            Value::Object(_) => write!(f, "Object(..)"),
            Value::Pipeline(p) => write!(f, "Pipeline({})", p.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Pipeline(a), Value::Pipeline(b)) => a.same_evaluator(b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(OrderedFloat(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<PathBuf> for Value {
    fn from(value: PathBuf) -> Self {
        Value::Path(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

/// Static type of a value input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    Text,
    Boolean,
    /// Text restricted to the input's allowed values.
    Enum,
    Date,
    FilePath,
    DirectoryPath,
    Array(Box<ValueType>),
    /// A type the engine has no binding for.
    Custom(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Enum => write!(f, "enum"),
            ValueType::Date => write!(f, "date"),
            ValueType::FilePath => write!(f, "file path"),
            ValueType::DirectoryPath => write!(f, "directory path"),
            ValueType::Array(inner) => write!(f, "array of {}", inner),
            ValueType::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl ValueType {
    /// Whether a value binding can serve this type. Nested arrays are not bindable.
    pub fn is_bindable(&self) -> bool {
        match self {
            ValueType::Custom(_) => false,
            ValueType::Array(inner) => {
                !matches!(**inner, ValueType::Array(_)) && inner.is_bindable()
            }
            _ => true,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    /// Element type for arrays, the type itself otherwise.
    pub fn element(&self) -> &ValueType {
        match self {
            ValueType::Array(inner) => inner,
            other => other,
        }
    }

    /// Parse one stored string as a scalar of this type.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            ValueType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| e.to_string()),
            ValueType::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| e.to_string()),
            ValueType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" => Ok(Value::Boolean(false)),
                other => Err(format!("'{}' is not a boolean", other)),
            },
            ValueType::Text | ValueType::Enum => Ok(Value::Text(raw.to_string())),
            ValueType::Date => DateTime::parse_from_rfc3339(raw.trim())
                .map(|d| Value::Date(d.with_timezone(&Utc)))
                .map_err(|e| e.to_string()),
            ValueType::FilePath | ValueType::DirectoryPath => Ok(Value::Path(PathBuf::from(raw))),
            ValueType::Array(_) => Err("arrays are stored element-wise".to_string()),
            ValueType::Custom(name) => Err(format!("no parser for type '{}'", name)),
        }
    }

    /// Convert `value` to this type if compatible. Integers widen to floats and
    /// text converts to paths.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ValueType::Integer, Value::Integer(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::Text, Value::Text(_))
            | (ValueType::Enum, Value::Text(_))
            | (ValueType::Boolean, Value::Boolean(_))
            | (ValueType::Date, Value::Date(_))
            | (ValueType::FilePath, Value::Path(_))
            | (ValueType::DirectoryPath, Value::Path(_)) => Some(value.clone()),
            (ValueType::Float, Value::Integer(i)) => Some(Value::from(*i as f64)),
            (ValueType::FilePath | ValueType::DirectoryPath, Value::Text(s)) => {
                Some(Value::Path(PathBuf::from(s)))
            }
            (ValueType::Array(inner), Value::Array(items)) => items
                .iter()
                .map(|item| inner.coerce(item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        }
    }

    /// Render a scalar value for storage.
    pub fn format(&self, value: &Value) -> Option<String> {
        match self.coerce(value)? {
            Value::Integer(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.into_inner().to_string()),
            Value::Text(s) => Some(s),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Date(d) => Some(d.to_rfc3339()),
            Value::Path(p) => Some(p.to_string_lossy().into_owned()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(ValueType::Integer.parse(" 42 ").unwrap(), Value::Integer(42));
        assert_eq!(ValueType::Float.parse("2.5").unwrap(), Value::from(2.5));
        assert_eq!(ValueType::Boolean.parse("True").unwrap(), Value::Boolean(true));
        assert!(ValueType::Integer.parse("4.2").is_err());
        assert!(ValueType::Boolean.parse("maybe").is_err());
        let date = ValueType::Date.parse("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(ValueType::Date.format(&date).unwrap(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_coerce_widens_integers_only() {
        assert_eq!(
            ValueType::Float.coerce(&Value::Integer(3)),
            Some(Value::from(3.0))
        );
        assert_eq!(ValueType::Integer.coerce(&Value::from(3.0)), None);
        assert_eq!(
            ValueType::FilePath.coerce(&Value::from("out/a.txt")),
            Some(Value::Path(PathBuf::from("out/a.txt")))
        );
        let ints = ValueType::Array(Box::new(ValueType::Float));
        assert_eq!(
            ints.coerce(&Value::Array(vec![Value::Integer(1), Value::from(2.0)])),
            Some(Value::Array(vec![Value::from(1.0), Value::from(2.0)]))
        );
        assert_eq!(ints.coerce(&Value::Array(vec![Value::from("x")])), None);
    }

    #[test]
    fn test_bindable_types() {
        assert!(ValueType::Integer.is_bindable());
        assert!(ValueType::Array(Box::new(ValueType::Text)).is_bindable());
        assert!(!ValueType::Custom("Matrix4".into()).is_bindable());
        let nested = ValueType::Array(Box::new(ValueType::Array(Box::new(ValueType::Integer))));
        assert!(!nested.is_bindable());
    }

    #[test]
    fn test_object_downcast() {
        let value = Value::object(vec![1u8, 2, 3]);
        assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![1u8, 2, 3]));
        assert!(value.downcast_ref::<String>().is_none());
        assert_eq!(value.clone(), value);
    }
}
