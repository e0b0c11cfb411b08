//! Deep copies with fresh node identity.
//!
//! Copying a task or template must not alias node ids with the original, so
//! every node gets a new id and every GUID-valued property that pointed at an
//! old id is rewritten to the new one.

use std::collections::HashMap;

use uuid::Uuid;

use super::pipeline::Pipeline;
use super::property::Property;
use super::task::Task;
use super::template::Template;

/// Old id → new id.
pub type IdMap = HashMap<Uuid, Uuid>;

impl Pipeline {
    /// Copy the pipeline, assigning new ids to every node.
    pub fn duplicate(&self) -> (Pipeline, IdMap) {
        let ids: IdMap = self.nodes().map(|n| (n.id(), Uuid::new_v4())).collect();

        let mut copy = Pipeline::new();
        for node in self.nodes() {
            copy.add_node(node.clone().with_id(ids[&node.id()]));
        }
        copy.root = self.root.map(|root| ids.get(&root).copied().unwrap_or(root));
        remap_references(&mut copy, &ids);
        (copy, ids)
    }
}

/// Rewrite every GUID property value found in `ids`. Other values are untouched.
pub fn remap_references(pipeline: &mut Pipeline, ids: &IdMap) {
    for node in pipeline.nodes_mut() {
        for configuration in node.configurations_mut() {
            for (_, property) in configuration.properties.iter_mut() {
                remap_property(property, ids);
            }
        }
    }
}

fn remap_property(property: &mut Property, ids: &IdMap) {
    match property {
        Property::Value(value) => remap_value(value, ids),
        Property::Array(values) => values.iter_mut().for_each(|v| remap_value(v, ids)),
    }
}

fn remap_value(value: &mut String, ids: &IdMap) {
    if let Ok(old) = Uuid::parse_str(value) {
        if let Some(new) = ids.get(&old) {
            *value = new.to_string();
        }
    }
}

impl Task {
    /// Copy under a new task id with remapped node ids.
    pub fn duplicate(&self, name: &str) -> (Task, IdMap) {
        let (pipeline, ids) = self.pipeline.duplicate();
        let task = Task {
            id: Uuid::new_v4(),
            name: name.to_string(),
            enabled: self.enabled,
            pipeline,
        };
        (task, ids)
    }
}

impl Template {
    /// Copy under a new template id; parameter node ids follow the remap.
    pub fn duplicate(&self, name: &str) -> (Template, IdMap) {
        let (pipeline, ids) = self.pipeline.duplicate();
        let parameters = self
            .parameters
            .iter()
            .map(|p| {
                let mut p = p.clone();
                p.node_id = ids.get(&p.node_id).copied().unwrap_or(p.node_id);
                p
            })
            .collect();
        let template = Template {
            id: Uuid::new_v4(),
            name: name.to_string(),
            pipeline,
            parameters,
        };
        (template, ids)
    }
}
