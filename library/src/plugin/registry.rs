//! Filter type registry keyed by class identifier.

use std::collections::HashMap;
use std::sync::Arc;

use libloading::Library;
use log::{debug, warn};

use crate::pipeline::context::FilterContext;
use crate::plugin::filter::{Filter, FilterDescriptor, FilterError, FilterPlugin};
use crate::plugin::value::Value;

pub type FilterConstructor = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Where a registered filter type came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: String,
    pub name: String,
    pub version: (u32, u32, u32),
}

struct FilterFactory {
    descriptor: FilterDescriptor,
    constructor: FilterConstructor,
    source: Option<String>,
    // Declared last: the constructor's code lives in this library.
    _library: Option<Arc<Library>>,
}

/// Maps class identifiers to filter constructors.
///
/// Unknown identifiers never fail instantiation; they yield an
/// [`UnknownFilter`] placeholder that errors when evaluated.
#[derive(Default)]
pub struct FilterRegistry {
    factories: HashMap<String, FilterFactory>,
    plugins: Vec<PluginInfo>,
    current_source: Option<String>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the filters shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::plugin::builtin::register_builtins(&mut registry);
        registry
    }

    pub fn register<F: Filter + Default + 'static>(&mut self) -> String {
        self.register_constructor(|| Box::new(F::default()))
    }

    /// Register a constructor. The descriptor is taken from a sample instance.
    /// A later registration of the same key replaces the earlier one.
    pub fn register_constructor(
        &mut self,
        constructor: impl Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    ) -> String {
        let descriptor = constructor().descriptor();
        let key = descriptor.key.clone();
        if self.factories.contains_key(&key) {
            warn!("Filter '{}' registered twice; keeping the newest", key);
        }
        debug!("Registered filter '{}'", key);
        self.factories.insert(
            key.clone(),
            FilterFactory {
                descriptor,
                constructor: Arc::new(constructor),
                source: self.current_source.clone(),
                _library: None,
            },
        );
        key
    }

    /// Let `plugin` register its filters, tagging them with the plugin id.
    /// Returns the keys it registered.
    pub fn register_plugin(&mut self, plugin: &dyn FilterPlugin) -> Vec<String> {
        self.current_source = Some(plugin.id().to_string());
        plugin.register(self);
        self.current_source = None;

        self.plugins.push(PluginInfo {
            id: plugin.id().to_string(),
            name: plugin.name(),
            version: plugin.version(),
        });

        let mut added: Vec<String> = self
            .factories
            .iter()
            .filter(|(_, f)| f.source.as_deref() == Some(plugin.id()))
            .map(|(key, _)| key.clone())
            .collect();
        added.sort();
        added
    }

    /// Keep `library` alive for as long as any of `keys` is registered.
    pub(crate) fn attach_library(&mut self, keys: &[String], library: &Arc<Library>) {
        for key in keys {
            if let Some(factory) = self.factories.get_mut(key) {
                factory._library = Some(Arc::clone(library));
            }
        }
    }

    /// Instantiate the filter for `class_identifier`.
    pub fn create_instance(&self, class_identifier: &str) -> Box<dyn Filter> {
        match self.factories.get(class_identifier) {
            Some(factory) => (factory.constructor)(),
            None => {
                warn!(
                    "No filter registered for '{}'; using placeholder",
                    class_identifier
                );
                Box::new(UnknownFilter::new(class_identifier))
            }
        }
    }

    pub fn contains(&self, class_identifier: &str) -> bool {
        self.factories.contains_key(class_identifier)
    }

    pub fn descriptor(&self, class_identifier: &str) -> Option<&FilterDescriptor> {
        self.factories.get(class_identifier).map(|f| &f.descriptor)
    }

    /// Plugin id that registered `class_identifier`, `None` for builtins.
    pub fn source_of(&self, class_identifier: &str) -> Option<&str> {
        self.factories
            .get(class_identifier)
            .and_then(|f| f.source.as_deref())
    }

    /// All registered filter types sorted by key.
    pub fn filter_types(&self) -> Vec<&FilterDescriptor> {
        let mut types: Vec<&FilterDescriptor> =
            self.factories.values().map(|f| &f.descriptor).collect();
        types.sort_by(|a, b| a.key.cmp(&b.key));
        types
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }
}

/// Stand-in for a class identifier no plugin provides.
///
/// Accepts any input so the rest of the pipeline can still be set up.
pub struct UnknownFilter {
    class_identifier: String,
}

impl UnknownFilter {
    pub fn new(class_identifier: &str) -> Self {
        Self {
            class_identifier: class_identifier.to_string(),
        }
    }
}

impl Filter for UnknownFilter {
    fn descriptor(&self) -> FilterDescriptor {
        FilterDescriptor::new(&self.class_identifier)
    }

    fn set_input(&mut self, _name: &str, _value: Value) -> Result<(), FilterError> {
        Ok(())
    }

    fn evaluate(&mut self, _context: &mut FilterContext<'_>) -> Result<Value, FilterError> {
        Err(FilterError::MissingPlugin(self.class_identifier.clone()))
    }
}
