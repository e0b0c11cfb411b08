use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::task::Task;
use super::template::Template;
use crate::error::BuildError;

/// Highest document version this build understands.
pub const CURRENT_VERSION: u32 = 3;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub generator: Option<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            copyright: None,
            generator: Some(format!("content_pipeline {}", env!("CARGO_PKG_VERSION"))),
            created: Utc::now(),
        }
    }
}

/// A plugin module the project depends on.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct PluginReference {
    pub id: Uuid,
    /// Absolute, or relative to the project file.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// File names of modules the plugin needs loaded before itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl PluginReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            version: None,
            dependencies: Vec::new(),
        }
    }

    pub fn resolve_path(&self, project_dir: Option<&Path>) -> PathBuf {
        match project_dir {
            Some(dir) if self.path.is_relative() => dir.join(&self.path),
            _ => self.path.clone(),
        }
    }
}

/// Build-wide settings object, looked up by `key` through the build context.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct SettingsItem {
    pub id: Uuid,
    pub key: String,
    #[serde(default)]
    pub values: Value,
}

impl SettingsItem {
    pub fn new(key: &str, values: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.to_string(),
            values,
        }
    }
}

/// Known item kinds, tagged by `kind` in the document.
#[derive(Deserialize)]
#[serde(tag = "kind")]
enum KnownItem {
    Task(Task),
    Template(Template),
    PluginReference(PluginReference),
    Settings(SettingsItem),
}

#[derive(Serialize)]
#[serde(tag = "kind")]
enum KnownItemRef<'a> {
    Task(&'a Task),
    Template(&'a Template),
    PluginReference(&'a PluginReference),
    Settings(&'a SettingsItem),
}

const KNOWN_KINDS: [&str; 4] = ["Task", "Template", "PluginReference", "Settings"];

#[derive(Clone, PartialEq, Debug)]
pub enum ProjectItem {
    Task(Task),
    Template(Template),
    PluginReference(PluginReference),
    Settings(SettingsItem),
    /// Item of a kind this version does not know; kept verbatim.
    Unknown(Value),
}

impl ProjectItem {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            ProjectItem::Task(t) => Some(t.id),
            ProjectItem::Template(t) => Some(t.id),
            ProjectItem::PluginReference(p) => Some(p.id),
            ProjectItem::Settings(s) => Some(s.id),
            ProjectItem::Unknown(v) => v
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok()),
        }
    }
}

impl Serialize for ProjectItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ProjectItem::Task(t) => KnownItemRef::Task(t).serialize(serializer),
            ProjectItem::Template(t) => KnownItemRef::Template(t).serialize(serializer),
            ProjectItem::PluginReference(p) => {
                KnownItemRef::PluginReference(p).serialize(serializer)
            }
            ProjectItem::Settings(s) => KnownItemRef::Settings(s).serialize(serializer),
            ProjectItem::Unknown(v) => v.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ProjectItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        if !KNOWN_KINDS.contains(&kind) {
            return Ok(ProjectItem::Unknown(value));
        }
        // Known kinds are parsed strictly; a malformed task is an error, not an unknown item.
        let item = KnownItem::deserialize(value).map_err(<D::Error as serde::de::Error>::custom)?;
        Ok(match item {
            KnownItem::Task(t) => ProjectItem::Task(t),
            KnownItem::Template(t) => ProjectItem::Template(t),
            KnownItem::PluginReference(p) => ProjectItem::PluginReference(p),
            KnownItem::Settings(s) => ProjectItem::Settings(s),
        })
    }
}

/// Root document.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Project {
    pub version: u32,
    #[serde(default)]
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub items: Vec<ProjectItem>,
    /// Directory of the file the project was loaded from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            version: CURRENT_VERSION,
            metadata: ProjectMetadata::default(),
            items: Vec::new(),
            base_dir: None,
        }
    }

    /// Parse a document, refusing versions newer than [`CURRENT_VERSION`].
    pub fn load(json_str: &str) -> Result<Self, BuildError> {
        let value: Value = serde_json::from_str(json_str)?;
        let raw = value
            .get("version")
            .ok_or_else(|| BuildError::document("missing document version"))?;
        let version = raw
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| BuildError::document(format!("invalid document version {}", raw)))?;
        if version > CURRENT_VERSION {
            return Err(BuildError::UnsupportedVersion {
                found: version,
                supported: CURRENT_VERSION,
            });
        }
        let project: Project = serde_json::from_value(value)?;
        Ok(project)
    }

    pub fn save(&self) -> Result<String, BuildError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let mut project = Self::load(&json)?;
        project.base_dir = path
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));
        Ok(project)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BuildError> {
        std::fs::write(path, self.save()?)?;
        Ok(())
    }

    pub fn add_item(&mut self, item: ProjectItem) {
        self.items.push(item);
    }

    pub fn add_task(&mut self, task: Task) -> Uuid {
        let id = task.id;
        self.items.push(ProjectItem::Task(task));
        id
    }

    pub fn add_template(&mut self, template: Template) -> Uuid {
        let id = template.id;
        self.items.push(ProjectItem::Template(template));
        id
    }

    pub fn remove_item(&mut self, id: Uuid) -> Option<ProjectItem> {
        let index = self.items.iter().position(|i| i.id() == Some(id))?;
        Some(self.items.remove(index))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.items.iter().filter_map(|item| match item {
            ProjectItem::Task(t) => Some(t),
            _ => None,
        })
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.items.iter().filter_map(|item| match item {
            ProjectItem::Template(t) => Some(t),
            _ => None,
        })
    }

    pub fn plugin_references(&self) -> impl Iterator<Item = &PluginReference> {
        self.items.iter().filter_map(|item| match item {
            ProjectItem::PluginReference(p) => Some(p),
            _ => None,
        })
    }

    pub fn settings(&self) -> impl Iterator<Item = &SettingsItem> {
        self.items.iter().filter_map(|item| match item {
            ProjectItem::Settings(s) => Some(s),
            _ => None,
        })
    }

    pub fn get_task(&self, id: Uuid) -> Option<&Task> {
        self.tasks().find(|t| t.id == id)
    }

    pub fn get_task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.items.iter_mut().find_map(|item| match item {
            ProjectItem::Task(t) if t.id == id => Some(t),
            _ => None,
        })
    }

    pub fn find_task(&self, name: &str) -> Option<&Task> {
        self.tasks().find(|t| t.name == name)
    }

    pub fn get_template(&self, id: Uuid) -> Option<&Template> {
        self.templates().find(|t| t.id == id)
    }

    pub fn get_template_mut(&mut self, id: Uuid) -> Option<&mut Template> {
        self.items.iter_mut().find_map(|item| match item {
            ProjectItem::Template(t) if t.id == id => Some(t),
            _ => None,
        })
    }

    /// Absolute paths of every referenced plugin.
    pub fn plugin_paths(&self) -> Vec<PathBuf> {
        self.plugin_references()
            .map(|p| p.resolve_path(self.base_dir.as_deref()))
            .collect()
    }
}
