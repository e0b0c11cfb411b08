//! Adapters between filter inputs, stored properties and node results.

mod dependency;
mod value;

pub use dependency::{DependencyBinding, DependencyKind};
pub use value::ValueBinding;

use uuid::Uuid;

use crate::error::BuildError;
use crate::model::project::PropertyProviderMut;
use crate::plugin::filter::{Filter, FilterDescriptor, InputDescriptor, InputKind};
use crate::plugin::value::Value;

/// Declared input whose type no binding supports. Setting up succeeds;
/// evaluating the node reports the reason.
#[derive(Clone, Debug)]
pub struct InvalidBinding {
    pub descriptor: InputDescriptor,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub enum Binding {
    Value(ValueBinding),
    Dependency(DependencyBinding),
    Invalid(InvalidBinding),
}

impl Binding {
    pub fn name(&self) -> &str {
        &self.descriptor().name
    }

    pub fn descriptor(&self) -> &InputDescriptor {
        match self {
            Binding::Value(b) => b.descriptor(),
            Binding::Dependency(b) => b.descriptor(),
            Binding::Invalid(b) => &b.descriptor,
        }
    }
}

/// One binding per declared input, in declaration order.
pub fn create_bindings(descriptor: &FilterDescriptor) -> Vec<Binding> {
    descriptor
        .inputs
        .iter()
        .map(|input| match &input.kind {
            InputKind::Value(value_type) if value_type.is_bindable() => {
                Binding::Value(ValueBinding::new(input.clone(), value_type.clone()))
            }
            InputKind::Value(value_type) => Binding::Invalid(InvalidBinding {
                descriptor: input.clone(),
                reason: format!("unsupported value type '{}'", value_type),
            }),
            InputKind::Node => Binding::Dependency(DependencyBinding::new(
                input.clone(),
                DependencyKind::Single,
            )),
            InputKind::Nodes => Binding::Dependency(DependencyBinding::new(
                input.clone(),
                DependencyKind::Multiple,
            )),
            InputKind::Pipeline => Binding::Dependency(DependencyBinding::new(
                input.clone(),
                DependencyKind::Pipeline,
            )),
        })
        .collect()
}

/// Hand `value` to the filter's input `name`.
pub(crate) fn assign(filter: &mut dyn Filter, name: &str, value: Value) -> Result<(), BuildError> {
    let type_name = value.type_name();
    filter
        .set_input(name, value)
        .map_err(|e| BuildError::InvalidValue {
            member: name.to_string(),
            value: type_name.to_string(),
            reason: e.to_string(),
        })
}

/// Raised for every value binding of a node when one of them changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingChanged {
    pub node: Uuid,
    /// The binding being notified.
    pub binding: String,
    /// The binding that was set.
    pub source: String,
}

pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&BindingChanged) + Send + Sync>;

/// The bindings of one node and the observers of their changes.
pub struct NodeBindings {
    node: Uuid,
    bindings: Vec<Binding>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl NodeBindings {
    pub fn new(node: Uuid, descriptor: &FilterDescriptor) -> Self {
        Self {
            node,
            bindings: create_bindings(descriptor),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn node(&self) -> Uuid {
        self.node
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn find(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    pub fn values(&self) -> impl Iterator<Item = &ValueBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Value(v) => Some(v),
            _ => None,
        })
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &DependencyBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Dependency(d) => Some(d),
            _ => None,
        })
    }

    pub fn invalid(&self) -> impl Iterator<Item = &InvalidBinding> {
        self.bindings.iter().filter_map(|b| match b {
            Binding::Invalid(i) => Some(i),
            _ => None,
        })
    }

    pub fn subscribe(
        &mut self,
        listener: impl Fn(&BindingChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(i, _)| *i != id);
        self.listeners.len() != before
    }

    fn value_binding(&self, name: &str) -> Result<&ValueBinding, BuildError> {
        match self.find(name) {
            Some(Binding::Value(v)) => Ok(v),
            _ => Err(BuildError::InvalidBinding {
                node: self.node,
                member: name.to_string(),
                reason: "no value input with this name".to_string(),
            }),
        }
    }

    /// Set the value input `name`, notifying every value binding on change.
    pub fn set_value(
        &self,
        properties: &mut impl PropertyProviderMut,
        name: &str,
        value: &Value,
    ) -> Result<bool, BuildError> {
        let changed = self.value_binding(name)?.set(properties, value)?;
        if changed {
            self.notify(name);
        }
        Ok(changed)
    }

    /// Reset the value input `name`, notifying every value binding on change.
    pub fn reset(
        &self,
        properties: &mut impl PropertyProviderMut,
        name: &str,
    ) -> Result<bool, BuildError> {
        let changed = self.value_binding(name)?.reset(properties);
        if changed {
            self.notify(name);
        }
        Ok(changed)
    }

    fn notify(&self, source: &str) {
        for binding in self.values() {
            let event = BindingChanged {
                node: self.node,
                binding: binding.name().to_string(),
                source: source.to_string(),
            };
            for (_, listener) in &self.listeners {
                listener(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::project::PropertyGroup;
    use crate::plugin::value::ValueType;

    fn descriptor() -> FilterDescriptor {
        FilterDescriptor::new("Resize")
            .with_input(InputDescriptor::value("Width", ValueType::Integer))
            .with_input(InputDescriptor::value("Height", ValueType::Integer))
            .with_input(InputDescriptor::node("Source"))
            .with_input(InputDescriptor::value("Transform", ValueType::Custom("Matrix".into())))
    }

    #[test]
    fn test_create_bindings_by_kind() {
        let bindings = NodeBindings::new(Uuid::new_v4(), &descriptor());
        assert_eq!(bindings.values().count(), 2);
        assert_eq!(bindings.dependencies().count(), 1);
        let invalid: Vec<_> = bindings.invalid().collect();
        assert_eq!(invalid.len(), 1);
        assert!(invalid[0].reason.contains("Matrix"));
    }

    #[test]
    fn test_set_value_notifies_all_value_bindings() {
        let node = Uuid::new_v4();
        let mut bindings = NodeBindings::new(node, &descriptor());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = bindings.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let mut group = PropertyGroup::new();
        assert!(bindings.set_value(&mut group, "Width", &Value::Integer(640)).unwrap());
        {
            let events = events.lock().unwrap();
            let names: Vec<&str> = events.iter().map(|e| e.binding.as_str()).collect();
            assert_eq!(names, vec!["Width", "Height"]);
            assert!(events.iter().all(|e| e.source == "Width" && e.node == node));
        }

        // unchanged value: no events
        assert!(!bindings.set_value(&mut group, "Width", &Value::Integer(640)).unwrap());
        assert_eq!(events.lock().unwrap().len(), 2);

        assert!(bindings.unsubscribe(id));
        bindings.reset(&mut group, "Width").unwrap();
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_set_value_on_dependency_is_rejected() {
        let bindings = NodeBindings::new(Uuid::new_v4(), &descriptor());
        let mut group = PropertyGroup::new();
        assert!(matches!(
            bindings.set_value(&mut group, "Source", &Value::Integer(1)),
            Err(BuildError::InvalidBinding { .. })
        ));
    }
}
