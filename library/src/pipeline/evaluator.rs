//! Instantiates a task or template pipeline and evaluates it.
//!
//! Set up walks the graph depth-first from the root, creating one filter
//! instance per reachable node and recording a post-order (dependencies
//! first) evaluation order. Templates referenced through pipeline inputs get
//! their own nested evaluator, exposed to the consuming filter as a
//! [`PipelineCallable`].

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::binding::{self, Binding, DependencyKind, NodeBindings};
use crate::error::BuildError;
use crate::model::project::{
    ConfigurationPath, Pipeline, Project, PropertyGroup, Task, Template, TemplateParameter,
};
use crate::pipeline::context::{BuildContext, FilterContext};
use crate::pipeline::monitor::{Monitor, SubMonitor};
use crate::plugin::filter::{Filter, FilterError};
use crate::plugin::registry::FilterRegistry;
use crate::plugin::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluatorState {
    Unconfigured,
    SetUp,
    Evaluating,
    Complete,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Build,
    Preview,
}

/// What the evaluator instantiates.
#[derive(Clone, Debug)]
enum Owner {
    Task {
        id: Uuid,
        name: String,
    },
    Template {
        id: Uuid,
        name: String,
        parameters: Vec<TemplateParameter>,
    },
}

impl Owner {
    fn id(&self) -> Uuid {
        match self {
            Owner::Task { id, .. } | Owner::Template { id, .. } => *id,
        }
    }

    fn name(&self) -> &str {
        match self {
            Owner::Task { name, .. } | Owner::Template { name, .. } => name,
        }
    }

    fn parameters(&self) -> &[TemplateParameter] {
        match self {
            Owner::Task { .. } => &[],
            Owner::Template { parameters, .. } => parameters,
        }
    }

    fn describe(&self) -> String {
        match self {
            Owner::Task { name, .. } => format!("task '{}'", name),
            Owner::Template { name, .. } => format!("template '{}'", name),
        }
    }
}

struct NodeInstance {
    id: Uuid,
    class_identifier: String,
    filter: Box<dyn Filter>,
    bindings: NodeBindings,
    /// Layered properties of the evaluated configuration, flattened.
    properties: PropertyGroup,
    /// Set once the filter has run in some pass.
    used: bool,
}

/// Results of one evaluation pass.
struct Pass<'a> {
    mode: Mode,
    args: &'a [Value],
    results: HashMap<Uuid, Value>,
}

pub struct PipelineEvaluator {
    owner: Owner,
    configuration: ConfigurationPath,
    state: EvaluatorState,
    /// Set only when the last set up succeeded.
    root: Option<Uuid>,
    instances: HashMap<Uuid, NodeInstance>,
    order: Vec<Uuid>,
    templates: HashMap<Uuid, PipelineCallable>,
    context: Arc<BuildContext>,
    // Declared after the instances: plugin filters must drop before their library.
    registry: Arc<FilterRegistry>,
}

impl PipelineEvaluator {
    fn new(
        owner: Owner,
        configuration: ConfigurationPath,
        registry: Arc<FilterRegistry>,
        context: Arc<BuildContext>,
    ) -> Self {
        Self {
            owner,
            configuration,
            state: EvaluatorState::Unconfigured,
            root: None,
            instances: HashMap::new(),
            order: Vec::new(),
            templates: HashMap::new(),
            context,
            registry,
        }
    }

    /// Unconfigured evaluator for `task`.
    pub fn for_task(
        task: &Task,
        configuration: ConfigurationPath,
        registry: Arc<FilterRegistry>,
        context: Arc<BuildContext>,
    ) -> Self {
        let owner = Owner::Task {
            id: task.id,
            name: task.name.clone(),
        };
        Self::new(owner, configuration, registry, context)
    }

    /// Unconfigured evaluator for `template`.
    pub fn for_template(
        template: &Template,
        configuration: ConfigurationPath,
        registry: Arc<FilterRegistry>,
        context: Arc<BuildContext>,
    ) -> Self {
        let owner = Owner::Template {
            id: template.id,
            name: template.name.clone(),
            parameters: template.parameters.clone(),
        };
        Self::new(owner, configuration, registry, context)
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    pub fn configuration(&self) -> &ConfigurationPath {
        &self.configuration
    }

    /// Node ids in evaluation order, dependencies first.
    pub fn evaluation_order(&self) -> &[Uuid] {
        &self.order
    }

    /// Instantiate `pipeline` (the owner's pipeline within `project`).
    pub fn set_up(&mut self, project: &Project, pipeline: &Pipeline) -> Result<(), BuildError> {
        let mut template_stack = Vec::new();
        if let Owner::Template { id, .. } = &self.owner {
            template_stack.push(*id);
        }
        let result = self.set_up_with(project, pipeline, &mut template_stack);
        self.state = match result {
            Ok(()) => EvaluatorState::SetUp,
            Err(_) => EvaluatorState::Failed,
        };
        result
    }

    fn set_up_with(
        &mut self,
        project: &Project,
        pipeline: &Pipeline,
        template_stack: &mut Vec<Uuid>,
    ) -> Result<(), BuildError> {
        self.root = None;
        self.instances.clear();
        self.order.clear();
        self.templates.clear();

        let root = pipeline.root.ok_or_else(|| BuildError::MissingRoot {
            owner: self.owner.describe(),
        })?;
        if !pipeline.contains(root) {
            return Err(BuildError::RootNotFound {
                owner: self.owner.describe(),
                root,
            });
        }
        let mut stack = Vec::new();
        if let Err(e) = self.visit(project, pipeline, root, &mut stack, template_stack) {
            self.instances.clear();
            self.order.clear();
            self.templates.clear();
            return Err(e);
        }
        self.root = Some(root);
        debug!(
            "Set up {} under {}: {} nodes, {} templates",
            self.owner.describe(),
            self.configuration,
            self.order.len(),
            self.templates.len()
        );
        Ok(())
    }

    fn visit(
        &mut self,
        project: &Project,
        pipeline: &Pipeline,
        id: Uuid,
        stack: &mut Vec<Uuid>,
        template_stack: &mut Vec<Uuid>,
    ) -> Result<(), BuildError> {
        if stack.contains(&id) {
            return Err(BuildError::CircularReference(id));
        }
        if self.instances.contains_key(&id) {
            return Ok(());
        }
        let Some(node) = pipeline.node(id) else {
            debug!("Reference to {} has no node in {}", id, self.owner.describe());
            return Ok(());
        };

        stack.push(id);
        let filter = self.registry.create_instance(&node.class_identifier);
        let bindings = NodeBindings::new(id, &filter.descriptor());
        let properties = node.properties(&self.configuration);

        for dependency in bindings.dependencies() {
            for reference in dependency.references(&properties)? {
                if dependency.kind() == DependencyKind::Pipeline {
                    self.set_up_template(project, reference, template_stack)?;
                } else {
                    self.visit(project, pipeline, reference, stack, template_stack)?;
                }
            }
        }
        stack.pop();

        self.instances.insert(
            id,
            NodeInstance {
                id,
                class_identifier: node.class_identifier.clone(),
                filter,
                bindings,
                properties: properties.flatten(),
                used: false,
            },
        );
        self.order.push(id);
        Ok(())
    }

    fn set_up_template(
        &mut self,
        project: &Project,
        template_id: Uuid,
        template_stack: &mut Vec<Uuid>,
    ) -> Result<(), BuildError> {
        if template_stack.contains(&template_id) {
            return Err(BuildError::CircularReference(template_id));
        }
        if self.templates.contains_key(&template_id) {
            return Ok(());
        }
        let Some(template) = project.get_template(template_id) else {
            warn!(
                "{} references missing template {}",
                self.owner.describe(),
                template_id
            );
            return Ok(());
        };

        let mut nested = PipelineEvaluator::for_template(
            template,
            self.configuration.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.context),
        );
        template_stack.push(template_id);
        let result = nested.set_up_with(project, &template.pipeline, template_stack);
        template_stack.pop();
        result?;
        nested.state = EvaluatorState::SetUp;

        self.templates
            .insert(template_id, PipelineCallable::new(template, nested));
        Ok(())
    }

    /// Evaluate the root node.
    pub fn evaluate(&mut self, monitor: &dyn Monitor, args: &[Value]) -> Result<Value, BuildError> {
        let root = self.require_root()?;
        self.run(monitor, root, args, Mode::Build)
    }

    /// Evaluate the root node through each filter's preview operation.
    pub fn preview(&mut self, monitor: &dyn Monitor, args: &[Value]) -> Result<Value, BuildError> {
        let root = self.require_root()?;
        self.run(monitor, root, args, Mode::Preview)
    }

    /// Evaluate one node, or hand back the callable of a set-up template.
    pub fn evaluate_node(
        &mut self,
        monitor: &dyn Monitor,
        id: Uuid,
        args: &[Value],
    ) -> Result<Value, BuildError> {
        self.require_root()?;
        self.run(monitor, id, args, Mode::Build)
    }

    fn require_root(&self) -> Result<Uuid, BuildError> {
        self.root.ok_or_else(|| {
            BuildError::runtime(format!("{} has not been set up", self.owner.describe()))
        })
    }

    fn run(
        &mut self,
        monitor: &dyn Monitor,
        id: Uuid,
        args: &[Value],
        mode: Mode,
    ) -> Result<Value, BuildError> {
        self.check_arguments(args)?;
        self.state = EvaluatorState::Evaluating;
        let mut pass = Pass {
            mode,
            args,
            results: HashMap::new(),
        };
        let result = self.evaluate_id(monitor, id, &mut pass);
        match &result {
            Ok(_) => {
                self.state = EvaluatorState::Complete;
                monitor.report(1.0);
            }
            Err(e) => {
                self.state = EvaluatorState::Failed;
                if !e.is_cancelled() {
                    debug!("{} failed: {}", self.owner.describe(), e);
                }
            }
        }
        result
    }

    fn check_arguments(&self, args: &[Value]) -> Result<(), BuildError> {
        let parameters = self.owner.parameters();
        if args.len() <= parameters.len() {
            return Ok(());
        }
        match &self.owner {
            Owner::Task { .. } => Err(BuildError::InvalidArgument(format!(
                "{} takes no arguments, got {}",
                self.owner.describe(),
                args.len()
            ))),
            Owner::Template { id, .. } => Err(BuildError::ParameterMismatch {
                template: *id,
                parameter: format!("#{}", parameters.len()),
                reason: format!(
                    "{} arguments given, {} parameters declared",
                    args.len(),
                    parameters.len()
                ),
            }),
        }
    }

    fn evaluate_id(
        &mut self,
        monitor: &dyn Monitor,
        id: Uuid,
        pass: &mut Pass<'_>,
    ) -> Result<Value, BuildError> {
        if let Some(callable) = self.templates.get(&id) {
            return Ok(Value::Pipeline(callable.clone()));
        }
        if let Some(value) = pass.results.get(&id) {
            return Ok(value.clone());
        }
        let Some(mut instance) = self.instances.remove(&id) else {
            return Ok(Value::None);
        };
        // Each pass starts from a fresh filter so unassigned inputs hold no earlier value.
        if instance.used {
            instance.filter = self.registry.create_instance(&instance.class_identifier);
        }
        instance.used = true;
        let result = self.evaluate_instance(monitor, &mut instance, pass);
        self.instances.insert(id, instance);

        let value = result?;
        pass.results.insert(id, value.clone());
        Ok(value)
    }

    fn evaluate_instance(
        &mut self,
        monitor: &dyn Monitor,
        instance: &mut NodeInstance,
        pass: &mut Pass<'_>,
    ) -> Result<Value, BuildError> {
        if monitor.is_cancel_requested() {
            return Err(BuildError::Cancelled);
        }

        if let Some(invalid) = instance.bindings.invalid().next() {
            return Err(BuildError::InvalidBinding {
                node: instance.id,
                member: invalid.descriptor.name.clone(),
                reason: invalid.reason.clone(),
            });
        }

        for value_binding in instance.bindings.values() {
            let value = value_binding.get(&instance.properties)?;
            if !value.is_none() {
                binding::assign(instance.filter.as_mut(), value_binding.name(), value)?;
            }
        }

        for dependency in instance.bindings.dependencies() {
            dependency.evaluate_and_assign(
                instance.filter.as_mut(),
                &instance.properties,
                &mut |reference| {
                    let value = self.evaluate_id(monitor, reference, pass)?;
                    Ok((!value.is_none()).then_some(value))
                },
            )?;
        }

        for (index, parameter) in self.owner.parameters().iter().enumerate() {
            if parameter.node_id != instance.id {
                continue;
            }
            match pass.args.get(index) {
                Some(arg) if !arg.is_none() => self.substitute(instance, parameter, arg)?,
                _ => {}
            }
        }

        if monitor.is_cancel_requested() {
            return Err(BuildError::Cancelled);
        }

        let position = self
            .order
            .iter()
            .position(|n| *n == instance.id)
            .unwrap_or(0);
        let sub = SubMonitor::part(monitor, position, self.order.len());
        let mut context = FilterContext::new(
            instance.id,
            &instance.class_identifier,
            &sub,
            &self.context,
        );
        sub.report(0.0);
        let filter = &mut instance.filter;
        let outcome = catch_unwind(AssertUnwindSafe(|| match pass.mode {
            Mode::Build => filter.evaluate(&mut context),
            Mode::Preview => filter.preview(&mut context),
        }));

        let value = match outcome {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => return Err(filter_failure(instance, e)),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                return Err(BuildError::PluginFailure {
                    node: instance.id,
                    class_identifier: instance.class_identifier.clone(),
                    source: Box::new(FilterError::message(format!("panicked: {}", message))),
                });
            }
        };
        sub.report(1.0);
        Ok(value)
    }

    /// Inject a template argument into the parameter's input.
    fn substitute(
        &self,
        instance: &mut NodeInstance,
        parameter: &TemplateParameter,
        arg: &Value,
    ) -> Result<(), BuildError> {
        let mismatch = |reason: String| BuildError::ParameterMismatch {
            template: self.owner.id(),
            parameter: parameter.binding_name.clone(),
            reason,
        };

        let value = match instance.bindings.find(&parameter.node_property) {
            Some(Binding::Value(value_binding)) => {
                value_binding.value_type().coerce(arg).ok_or_else(|| {
                    mismatch(format!(
                        "expected {}, got {}",
                        value_binding.value_type(),
                        arg.type_name()
                    ))
                })?
            }
            Some(Binding::Dependency(dependency)) => match (dependency.kind(), arg) {
                (DependencyKind::Pipeline, Value::Pipeline(_)) => arg.clone(),
                (DependencyKind::Pipeline, _) => {
                    return Err(mismatch(format!("expected pipeline, got {}", arg.type_name())));
                }
                _ => arg.clone(),
            },
            Some(Binding::Invalid(invalid)) => {
                return Err(BuildError::InvalidBinding {
                    node: instance.id,
                    member: invalid.descriptor.name.clone(),
                    reason: invalid.reason.clone(),
                });
            }
            None => {
                return Err(mismatch(format!(
                    "node {} has no input '{}'",
                    instance.id, parameter.node_property
                )));
            }
        };
        binding::assign(instance.filter.as_mut(), &parameter.node_property, value)
    }
}

fn filter_failure(instance: &NodeInstance, error: FilterError) -> BuildError {
    match error {
        FilterError::Cancelled => BuildError::Cancelled,
        FilterError::MissingPlugin(class_identifier) => BuildError::UnknownFilter {
            node: instance.id,
            class_identifier,
        },
        FilterError::Build(inner) if inner.is_cancelled() => BuildError::Cancelled,
        other => BuildError::PluginFailure {
            node: instance.id,
            class_identifier: instance.class_identifier.clone(),
            source: Box::new(other),
        },
    }
}

/// A set-up template, callable by the filter that received it.
///
/// Every invocation is a fresh evaluation pass with its own arguments.
#[derive(Clone)]
pub struct PipelineCallable {
    template_id: Uuid,
    name: String,
    parameters: Vec<String>,
    evaluator: Arc<Mutex<PipelineEvaluator>>,
}

impl PipelineCallable {
    fn new(template: &Template, evaluator: PipelineEvaluator) -> Self {
        Self {
            template_id: template.id,
            name: template.name.clone(),
            parameters: template
                .parameters
                .iter()
                .map(|p| p.binding_name.clone())
                .collect(),
            evaluator: Arc::new(Mutex::new(evaluator)),
        }
    }

    pub fn template_id(&self) -> Uuid {
        self.template_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter binding names in positional order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub(crate) fn same_evaluator(&self, other: &PipelineCallable) -> bool {
        Arc::ptr_eq(&self.evaluator, &other.evaluator)
    }

    /// Evaluate the template with positional arguments.
    pub fn invoke(&self, monitor: &dyn Monitor, args: &[Value]) -> Result<Value, BuildError> {
        let mut evaluator = self.evaluator.lock().map_err(|_| {
            BuildError::runtime(format!("template '{}' is poisoned", self.name))
        })?;
        info!("Invoking template '{}' with {} arguments", self.name, args.len());
        evaluator.evaluate(monitor, args)
    }

    /// Evaluate the template with arguments given by binding name. Parameters
    /// not named keep their stored values.
    pub fn invoke_named(
        &self,
        monitor: &dyn Monitor,
        args: &[(&str, Value)],
    ) -> Result<Value, BuildError> {
        let mut positional = vec![Value::None; self.parameters.len()];
        for (name, value) in args {
            let index = self
                .parameters
                .iter()
                .position(|p| p == name)
                .ok_or_else(|| BuildError::ParameterMismatch {
                    template: self.template_id,
                    parameter: name.to_string(),
                    reason: "no parameter with this name".to_string(),
                })?;
            positional[index] = value.clone();
        }
        self.invoke(monitor, &positional)
    }
}

impl fmt::Debug for PipelineCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCallable")
            .field("template_id", &self.template_id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}
