use crate::pipeline::context::FilterContext;
use crate::pipeline::evaluator::PipelineCallable;
use crate::plugin::filter::{Filter, FilterDescriptor, FilterError, InputDescriptor};
use crate::plugin::value::Value;

/// Invokes a template with the outputs of its `Arguments` nodes as
/// positional arguments.
#[derive(Default)]
pub struct InvokeTemplate {
    template: Option<PipelineCallable>,
    arguments: Vec<Value>,
}

impl Filter for InvokeTemplate {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("InvokeTemplate")
            .with_title("Invoke Template")
            .with_input(InputDescriptor::pipeline("Template"))
            .with_input(InputDescriptor::nodes("Arguments"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        match (name, value) {
            ("Template", Value::Pipeline(callable)) => self.template = Some(callable),
            ("Arguments", Value::Array(items)) => self.arguments = items,
            ("Template", other) => return Err(FilterError::input_type(name, "pipeline", &other)),
            ("Arguments", other) => return Err(FilterError::input_type(name, "array", &other)),
            _ => return Err(FilterError::UnknownInput(name.to_string())),
        }
        Ok(())
    }

    fn evaluate(&mut self, context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| FilterError::MissingInput("Template".to_string()))?;
        context.debug(&format!(
            "Invoking '{}' with {} arguments",
            template.name(),
            self.arguments.len()
        ));
        Ok(template.invoke(context.monitor(), &self.arguments)?)
    }
}
