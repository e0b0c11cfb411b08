//! Node arena of one task or template.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::Node;
use super::property::Property;

/// Nodes indexed by id plus the id of the output node.
///
/// Cross-node references are GUID strings stored in node properties; they are
/// resolved at evaluation time and never held as pointers.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct Pipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Uuid>,
    #[serde(default, with = "node_list")]
    nodes: HashMap<Uuid, Node>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Uuid {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node. Clears the root if it pointed at the removed node.
    pub fn remove_node(&mut self, id: Uuid) -> Option<Node> {
        let removed = self.nodes.remove(&id);
        if removed.is_some() && self.root == Some(id) {
            self.root = None;
        }
        removed
    }

    pub fn node(&self, id: Uuid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_root(&mut self, id: Uuid) {
        self.root = Some(id);
    }

    /// Ids of nodes of this pipeline that `id` mentions in any of its
    /// properties, in any configuration. Duplicates are removed.
    pub fn referenced_nodes(&self, id: Uuid) -> Vec<Uuid> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for configuration in node.configurations() {
            for (_, property) in configuration.properties.iter() {
                let values: Vec<&str> = match property {
                    Property::Value(v) => vec![v.as_str()],
                    Property::Array(a) => a.iter().map(String::as_str).collect(),
                };
                for value in values {
                    if let Ok(target) = Uuid::parse_str(value) {
                        if self.nodes.contains_key(&target) && !found.contains(&target) {
                            found.push(target);
                        }
                    }
                }
            }
        }
        found
    }
}

/// Serialize the arena as a list so documents stay readable and stable.
mod node_list {
    use std::collections::HashMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    use super::Node;

    pub fn serialize<S>(map: &HashMap<Uuid, Node>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut nodes: Vec<&Node> = map.values().collect();
        nodes.sort_by_key(|n| n.id());
        nodes.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<Uuid, Node>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nodes: Vec<Node> = Vec::deserialize(deserializer)?;
        let mut map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id();
            if map.insert(id, node).is_some() {
                return Err(serde::de::Error::custom(format!("duplicate node id {}", id)));
            }
        }
        Ok(map)
    }
}
