pub mod configuration;
pub mod node;
pub mod pipeline;
pub mod project;
pub mod property;
pub mod remap;
pub mod task;
pub mod template;

pub use configuration::{Configuration, ConfigurationPath};
pub use node::Node;
pub use pipeline::Pipeline;
pub use project::{
    CURRENT_VERSION, PluginReference, Project, ProjectItem, ProjectMetadata, SettingsItem,
};
pub use property::{
    LayeredProperties, LayeredPropertiesMut, Property, PropertyGroup, PropertyProvider,
    PropertyProviderMut,
};
pub use task::Task;
pub use template::{Template, TemplateParameter};
