use crate::pipeline::context::FilterContext;
use crate::plugin::filter::{
    Filter, FilterDescriptor, FilterError, InputDescriptor, integer_input,
};
use crate::plugin::value::{Value, ValueType};

/// Produces its stored integer.
#[derive(Default)]
pub struct AssignIntegerValue {
    value: i64,
}

impl Filter for AssignIntegerValue {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("AssignIntegerValue")
            .with_title("Integer")
            .with_format("{Value}")
            .with_input(InputDescriptor::value("Value", ValueType::Integer).with_default("0"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        match name {
            "Value" => self.value = integer_input(name, &value)?,
            _ => return Err(FilterError::UnknownInput(name.to_string())),
        }
        Ok(())
    }

    fn evaluate(&mut self, _context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        Ok(Value::Integer(self.value))
    }
}

/// Adds the outputs of two nodes.
#[derive(Default)]
pub struct AddIntegerValues {
    value1: Option<i64>,
    value2: Option<i64>,
}

impl Filter for AddIntegerValues {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("AddIntegerValues")
            .with_title("Add")
            .with_format("{Value1} + {Value2}")
            .with_input(InputDescriptor::node("Value1"))
            .with_input(InputDescriptor::node("Value2"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        match name {
            "Value1" => self.value1 = Some(integer_input(name, &value)?),
            "Value2" => self.value2 = Some(integer_input(name, &value)?),
            _ => return Err(FilterError::UnknownInput(name.to_string())),
        }
        Ok(())
    }

    fn evaluate(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        let a = self
            .value1
            .ok_or_else(|| FilterError::MissingInput("Value1".to_string()))?;
        let b = self
            .value2
            .ok_or_else(|| FilterError::MissingInput("Value2".to_string()))?;
        let sum = a
            .checked_add(b)
            .ok_or_else(|| FilterError::message(format!("{} + {} overflows", a, b)))?;
        context.trace(&format!("{} + {} = {}", a, b, sum));
        Ok(Value::Integer(sum))
    }
}

/// Sums the outputs of any number of nodes.
#[derive(Default)]
pub struct SumIntegerValues {
    values: Vec<i64>,
}

impl Filter for SumIntegerValues {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("SumIntegerValues")
            .with_title("Sum")
            .with_input(InputDescriptor::nodes("Values"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        if name != "Values" {
            return Err(FilterError::UnknownInput(name.to_string()));
        }
        let items = value
            .as_array()
            .ok_or_else(|| FilterError::input_type(name, "array", &value))?;
        self.values = items
            .iter()
            .map(|item| integer_input(name, item))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn evaluate(&mut self, _context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        self.values
            .iter()
            .try_fold(0i64, |acc, v| acc.checked_add(*v))
            .map(Value::Integer)
            .ok_or_else(|| FilterError::message("sum overflows"))
    }
}
