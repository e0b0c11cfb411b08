#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use content_pipeline::model::project::{
    ConfigurationPath, Node, Pipeline, Project, PropertyProviderMut, Task,
};
use content_pipeline::pipeline::{BuildContext, FilterContext, NullMonitor, PipelineEvaluator};
use content_pipeline::plugin::{
    Filter, FilterDescriptor, FilterError, FilterRegistry, InputDescriptor, Value, ValueType,
    integer_input,
};
use content_pipeline::BuildError;
use uuid::Uuid;

pub fn root() -> ConfigurationPath {
    ConfigurationPath::root()
}

pub fn debug() -> ConfigurationPath {
    ConfigurationPath::parse("Root.Debug").expect("valid path")
}

pub fn ids(items: &[Uuid]) -> Vec<String> {
    items.iter().map(Uuid::to_string).collect()
}

/// `AssignIntegerValue` node storing `value` under `Root`.
pub fn assign(pipeline: &mut Pipeline, value: i64) -> Uuid {
    let mut node = Node::new("AssignIntegerValue");
    node.properties_mut(&root()).set_value("Value", Some(&value.to_string()));
    pipeline.add_node(node)
}

pub fn add(pipeline: &mut Pipeline, a: Uuid, b: Uuid) -> Uuid {
    let mut node = Node::new("AddIntegerValues");
    let mut props = node.properties_mut(&root());
    props.set_array("Value1", &ids(&[a]));
    props.set_array("Value2", &ids(&[b]));
    pipeline.add_node(node)
}

pub fn sum(pipeline: &mut Pipeline, inputs: &[Uuid]) -> Uuid {
    let mut node = Node::new("SumIntegerValues");
    node.properties_mut(&root()).set_array("Values", &ids(inputs));
    pipeline.add_node(node)
}

/// Returns `Value` and counts how often it was computed.
pub struct Counting {
    counter: Arc<AtomicUsize>,
    value: i64,
}

impl Filter for Counting {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new("Counting")
            .with_input(InputDescriptor::value("Value", ValueType::Integer).with_default("1"))
    }

    fn set_input(&mut self, name: &str, value: Value) -> Result<(), FilterError> {
        self.value = integer_input(name, &value)?;
        Ok(())
    }

    fn evaluate(&mut self, _context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Integer(self.value))
    }
}

/// Builtins plus `Counting`, with the shared counter.
pub fn counting_registry() -> (FilterRegistry, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = FilterRegistry::with_builtins();
    let shared = Arc::clone(&counter);
    registry.register_constructor(move || {
        Box::new(Counting {
            counter: Arc::clone(&shared),
            value: 0,
        })
    });
    (registry, counter)
}

pub fn context() -> Arc<BuildContext> {
    Arc::new(BuildContext::new("/tmp/source", "/tmp/target", root()))
}

pub fn set_up(
    project: &Project,
    task: &Task,
    configuration: ConfigurationPath,
    registry: Arc<FilterRegistry>,
) -> Result<PipelineEvaluator, BuildError> {
    let mut evaluator = PipelineEvaluator::for_task(task, configuration, registry, context());
    evaluator.set_up(project, &task.pipeline)?;
    Ok(evaluator)
}

/// Set up and evaluate `task` with the builtin registry.
pub fn evaluate(
    project: &Project,
    task: &Task,
    configuration: ConfigurationPath,
) -> Result<Value, BuildError> {
    let registry = Arc::new(FilterRegistry::with_builtins());
    set_up(project, task, configuration, registry)?.evaluate(&NullMonitor, &[])
}
