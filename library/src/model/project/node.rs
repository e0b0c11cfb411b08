use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::configuration::{Configuration, ConfigurationPath};
use super::property::{LayeredProperties, LayeredPropertiesMut, PropertyGroup};

/// One processing unit of a pipeline.
///
/// `class_identifier` names the filter type the registry instantiates for
/// this node. Properties are stored per configuration path and layered at
/// read time.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Node {
    id: Uuid,
    pub class_identifier: String,
    #[serde(default)]
    configurations: Vec<Configuration>,
}

impl Node {
    pub fn new(class_identifier: &str) -> Self {
        Self::new_with_id(Uuid::new_v4(), class_identifier)
    }

    pub fn new_with_id(id: Uuid, class_identifier: &str) -> Self {
        Self {
            id,
            class_identifier: class_identifier.to_string(),
            configurations: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub(crate) fn configurations_mut(&mut self) -> &mut [Configuration] {
        &mut self.configurations
    }

    pub fn configuration(&self, path: &ConfigurationPath) -> Option<&Configuration> {
        self.configurations.iter().find(|c| &c.path == path)
    }

    /// Get the configuration for `path`, creating it on first use.
    pub fn configuration_mut(&mut self, path: &ConfigurationPath) -> &mut Configuration {
        let index = self.layer_index(path);
        &mut self.configurations[index]
    }

    fn layer_index(&mut self, path: &ConfigurationPath) -> usize {
        match self.configurations.iter().position(|c| &c.path == path) {
            Some(index) => index,
            None => {
                self.configurations.push(Configuration::new(path.clone()));
                self.configurations.len() - 1
            }
        }
    }

    /// Layered read view for `path` (the path itself, then each ancestor).
    pub fn properties(&self, path: &ConfigurationPath) -> LayeredProperties<'_> {
        let layers = path
            .lineage()
            .iter()
            .map(|p| self.configuration(p).map(|c| &c.properties))
            .collect();
        LayeredProperties::from_layers(layers)
    }

    /// Layered write view for `path`. Writes land in `path`'s own layer.
    pub fn properties_mut(&mut self, path: &ConfigurationPath) -> LayeredPropertiesMut<'_> {
        let index = self.layer_index(path);
        let lineage = path.lineage();
        let ancestors = &lineage[1..];

        let (head, tail) = self.configurations.split_at_mut(index);
        let (current, rest) = tail.split_at_mut(1);

        let mut layers: Vec<Option<&PropertyGroup>> = vec![None; ancestors.len()];
        for configuration in head.iter().chain(rest.iter()) {
            if let Some(rank) = ancestors.iter().position(|p| p == &configuration.path) {
                layers[rank] = Some(&configuration.properties);
            }
        }

        LayeredPropertiesMut::new(
            &mut current[0].properties,
            LayeredProperties::from_layers(layers),
        )
    }
}
