use crate::error::BuildError;
use crate::model::project::{Property, PropertyProvider, PropertyProviderMut};
use crate::plugin::filter::InputDescriptor;
use crate::plugin::value::{Value, ValueType};

/// Binds a value input to a stored property.
///
/// Reads parse the layered property (or the declared default), writes format
/// the value back. Numeric values are clamped to the declared range both
/// ways; enum and text values are checked against the allowed list.
#[derive(Clone, Debug)]
pub struct ValueBinding {
    descriptor: InputDescriptor,
    value_type: ValueType,
}

impl ValueBinding {
    pub(crate) fn new(descriptor: InputDescriptor, value_type: ValueType) -> Self {
        Self {
            descriptor,
            value_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &InputDescriptor {
        &self.descriptor
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    fn declared_value(&self) -> &str {
        match &self.descriptor.default {
            Some(Property::Value(v)) => v,
            _ => "",
        }
    }

    fn declared_array(&self) -> &[String] {
        match &self.descriptor.default {
            Some(Property::Array(a)) => a,
            _ => &[],
        }
    }

    /// Current value, or `Value::None` when nothing is stored or declared.
    pub fn get(&self, properties: &impl PropertyProvider) -> Result<Value, BuildError> {
        if self.value_type.is_array() {
            if !properties.contains(self.name()) && self.descriptor.default.is_none() {
                return Ok(Value::None);
            }
            let raw = properties.get_array(self.name(), self.declared_array());
            self.parse_array(&raw)
        } else {
            let raw = properties.get_value(self.name(), self.declared_value());
            self.parse_scalar(&raw)
        }
    }

    /// Value the input would have without the most specific layer.
    pub fn default_value(&self, properties: &impl PropertyProvider) -> Result<Value, BuildError> {
        if self.value_type.is_array() {
            let raw = properties.get_default_array(self.name(), self.declared_array());
            if raw.is_empty() && self.descriptor.default.is_none() {
                return Ok(Value::None);
            }
            self.parse_array(&raw)
        } else {
            let raw = properties.get_default_value(self.name(), self.declared_value());
            self.parse_scalar(&raw)
        }
    }

    /// Store `value`. `Value::None` clears the key. Returns whether the stored
    /// property changed.
    pub fn set(
        &self,
        properties: &mut impl PropertyProviderMut,
        value: &Value,
    ) -> Result<bool, BuildError> {
        if value.is_none() {
            return Ok(properties.clear(self.name()));
        }
        let coerced = self
            .value_type
            .coerce(value)
            .ok_or_else(|| {
                self.invalid(value.type_name(), format!("expected {}", self.value_type))
            })?;

        match coerced {
            Value::Array(items) => {
                let element = self.value_type.element();
                let mut raw = Vec::with_capacity(items.len());
                for item in items {
                    let item = self.constrain(item)?;
                    raw.push(self.format(element, &item)?);
                }
                Ok(properties.set_array(self.name(), &raw))
            }
            scalar => {
                let scalar = self.constrain(scalar)?;
                let raw = self.format(&self.value_type, &scalar)?;
                Ok(properties.set_value(self.name(), Some(&raw)))
            }
        }
    }

    /// True when the most specific layer holds a value that differs from the
    /// inherited one.
    pub fn has_own_value(&self, properties: &impl PropertyProvider) -> bool {
        if !properties.contains_own(self.name()) {
            return false;
        }
        if self.value_type.is_array() {
            properties.get_array(self.name(), &[])
                != properties.get_default_array(self.name(), self.declared_array())
        } else {
            properties.get_value(self.name(), "")
                != properties.get_default_value(self.name(), self.declared_value())
        }
    }

    /// Drop the most specific layer's value.
    pub fn reset(&self, properties: &mut impl PropertyProviderMut) -> bool {
        properties.clear(self.name())
    }

    fn parse_scalar(&self, raw: &str) -> Result<Value, BuildError> {
        if raw.is_empty() {
            return Ok(Value::None);
        }
        let value = self
            .value_type
            .parse(raw)
            .map_err(|reason| self.invalid(raw, reason))?;
        self.constrain(value)
    }

    fn parse_array(&self, raw: &[String]) -> Result<Value, BuildError> {
        let element = self.value_type.element();
        let mut items = Vec::with_capacity(raw.len());
        for item in raw {
            let value = element
                .parse(item)
                .map_err(|reason| self.invalid(item, reason))?;
            items.push(self.constrain(value)?);
        }
        Ok(Value::Array(items))
    }

    fn format(&self, value_type: &ValueType, value: &Value) -> Result<String, BuildError> {
        value_type
            .format(value)
            .ok_or_else(|| {
                self.invalid(value.type_name(), format!("cannot store as {}", value_type))
            })
    }

    /// Clamp numbers into range and check allowed values.
    fn constrain(&self, value: Value) -> Result<Value, BuildError> {
        let (min, max) = (self.descriptor.minimum, self.descriptor.maximum);
        let value = match value {
            Value::Integer(i) => {
                let mut i = i;
                if let Some(min) = min {
                    i = i.max(min.ceil() as i64);
                }
                if let Some(max) = max {
                    i = i.min(max.floor() as i64);
                }
                Value::Integer(i)
            }
            Value::Float(f) => {
                let mut f = f.into_inner();
                if let Some(min) = min {
                    f = f.max(min);
                }
                if let Some(max) = max {
                    f = f.min(max);
                }
                Value::from(f)
            }
            other => other,
        };

        if let Value::Text(text) = &value {
            let allowed = &self.descriptor.allowed_values;
            if !allowed.is_empty() && !allowed.contains(text) {
                let reason = format!("allowed values are {}", allowed.join(", "));
                return Err(self.invalid(text, reason));
            }
        }
        Ok(value)
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> BuildError {
        BuildError::InvalidValue {
            member: self.name().to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{ConfigurationPath, Node, PropertyGroup};

    fn ranged() -> ValueBinding {
        ValueBinding::new(
            InputDescriptor::value("Quality", ValueType::Integer)
                .with_default("50")
                .with_range(0.0, 100.0),
            ValueType::Integer,
        )
    }

    #[test]
    fn test_get_uses_declared_default() {
        let group = PropertyGroup::new();
        assert_eq!(ranged().get(&group).unwrap(), Value::Integer(50));

        let bare = ValueBinding::new(
            InputDescriptor::value("Name", ValueType::Text),
            ValueType::Text,
        );
        assert_eq!(bare.get(&group).unwrap(), Value::None);
    }

    #[test]
    fn test_set_clamps_and_read_clamps() {
        let binding = ranged();
        let mut group = PropertyGroup::new();
        assert!(binding.set(&mut group, &Value::Integer(250)).unwrap());
        assert_eq!(group.get_value("Quality", ""), "100");

        group.set_value("Quality", Some("-7"));
        assert_eq!(binding.get(&group).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_set_rejects_wrong_type_and_disallowed() {
        let mut group = PropertyGroup::new();
        assert!(matches!(
            ranged().set(&mut group, &Value::from("high")),
            Err(BuildError::InvalidValue { .. })
        ));

        let mode = ValueBinding::new(
            InputDescriptor::value("Mode", ValueType::Enum).with_allowed(&["Fast", "Best"]),
            ValueType::Enum,
        );
        assert!(mode.set(&mut group, &Value::from("Best")).unwrap());
        assert!(mode.set(&mut group, &Value::from("Slow")).is_err());
        assert_eq!(mode.get(&group).unwrap(), Value::from("Best"));
    }

    #[test]
    fn test_array_values() {
        let binding = ValueBinding::new(
            InputDescriptor::value("Weights", ValueType::Array(Box::new(ValueType::Float)))
                .with_range(0.0, 1.0),
            ValueType::Array(Box::new(ValueType::Float)),
        );
        let mut group = PropertyGroup::new();
        assert_eq!(binding.get(&group).unwrap(), Value::None);
        binding
            .set(&mut group, &Value::Array(vec![Value::Integer(2), Value::from(0.5)]))
            .unwrap();
        assert_eq!(group.get_array("Weights", &[]), vec!["1".to_string(), "0.5".to_string()]);
        assert_eq!(
            binding.get(&group).unwrap(),
            Value::Array(vec![Value::from(1.0), Value::from(0.5)])
        );
    }

    #[test]
    fn test_has_own_value_and_reset() {
        let binding = ranged();
        let root = ConfigurationPath::root();
        let debug = ConfigurationPath::parse("Root.Debug").unwrap();
        let mut node = Node::new("Encode");

        binding.set(&mut node.properties_mut(&root), &Value::Integer(70)).unwrap();
        assert!(binding.has_own_value(&node.properties(&root)));
        assert!(!binding.has_own_value(&node.properties(&debug)));

        // same as inherited: stored but not own
        binding.set(&mut node.properties_mut(&debug), &Value::Integer(70)).unwrap();
        assert!(!binding.has_own_value(&node.properties(&debug)));

        binding.set(&mut node.properties_mut(&debug), &Value::Integer(80)).unwrap();
        assert!(binding.has_own_value(&node.properties(&debug)));
        assert_eq!(
            binding.default_value(&node.properties(&debug)).unwrap(),
            Value::Integer(70)
        );

        assert!(binding.reset(&mut node.properties_mut(&debug)));
        assert_eq!(binding.get(&node.properties(&debug)).unwrap(), Value::Integer(70));
    }
}
