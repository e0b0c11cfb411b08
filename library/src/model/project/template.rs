use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pipeline::Pipeline;

/// A node property exposed as a call parameter of a template.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct TemplateParameter {
    pub node_id: Uuid,
    pub node_property: String,
    /// Name callers use to pass this parameter.
    pub binding_name: String,
}

impl TemplateParameter {
    pub fn new(node_id: Uuid, node_property: &str, binding_name: &str) -> Self {
        Self {
            node_id,
            node_property: node_property.to_string(),
            binding_name: binding_name.to_string(),
        }
    }
}

/// A reusable, parameterized pipeline invoked like a function.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub parameters: Vec<TemplateParameter>,
}

impl Template {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            pipeline: Pipeline::new(),
            parameters: Vec::new(),
        }
    }

    pub fn add_parameter(&mut self, parameter: TemplateParameter) {
        self.parameters.push(parameter);
    }

    pub fn parameter(&self, binding_name: &str) -> Option<(usize, &TemplateParameter)> {
        self.parameters
            .iter()
            .enumerate()
            .find(|(_, p)| p.binding_name == binding_name)
    }
}
