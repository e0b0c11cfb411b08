//! Key/value property storage and configuration layering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored property: a single string or an ordered array of strings.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug, Hash)]
#[serde(untagged)]
pub enum Property {
    Value(String),
    Array(Vec<String>),
}

impl Property {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Property::Value(v) => Some(v),
            Property::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Property::Array(a) => Some(a),
            Property::Value(_) => None,
        }
    }
}

/// Read access shared by plain groups and layered views.
pub trait PropertyProvider {
    fn property(&self, key: &str) -> Option<&Property>;

    fn contains(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// True when the most specific layer itself holds the key.
    fn contains_own(&self, key: &str) -> bool {
        self.contains(key)
    }

    fn get_value(&self, key: &str, default: &str) -> String {
        self.property(key)
            .and_then(Property::as_value)
            .unwrap_or(default)
            .to_string()
    }

    fn get_array(&self, key: &str, default: &[String]) -> Vec<String> {
        self.property(key)
            .and_then(Property::as_array)
            .unwrap_or(default)
            .to_vec()
    }

    /// Value the key would have without the most specific layer.
    ///
    /// Plain groups have no parent, so this is always `default`.
    fn get_default_value(&self, _key: &str, default: &str) -> String {
        default.to_string()
    }

    fn get_default_array(&self, _key: &str, default: &[String]) -> Vec<String> {
        default.to_vec()
    }
}

/// Write access. Writes always land in the most specific layer.
pub trait PropertyProviderMut: PropertyProvider {
    /// Setting `None` or an empty string clears the key.
    fn set_value(&mut self, key: &str, value: Option<&str>) -> bool;

    /// Setting an empty array clears the key.
    fn set_array(&mut self, key: &str, values: &[String]) -> bool;

    fn clear(&mut self, key: &str) -> bool;
}

/// Unordered set of unique-keyed properties.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq, Debug)]
#[serde(transparent)]
pub struct PropertyGroup {
    properties: BTreeMap<String, Property>,
}

impl PropertyGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.properties.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Property)> {
        self.properties.iter_mut()
    }

    /// Overlay `other` on top of this group, replacing shared keys.
    pub fn merge_from(&mut self, other: &PropertyGroup) {
        for (key, property) in &other.properties {
            self.properties.insert(key.clone(), property.clone());
        }
    }
}

impl PropertyProvider for PropertyGroup {
    fn property(&self, key: &str) -> Option<&Property> {
        self.properties.get(key)
    }
}

impl PropertyProviderMut for PropertyGroup {
    fn set_value(&mut self, key: &str, value: Option<&str>) -> bool {
        match value {
            Some(v) if !v.is_empty() => {
                let new = Property::Value(v.to_string());
                if self.properties.get(key) == Some(&new) {
                    return false;
                }
                self.properties.insert(key.to_string(), new);
                true
            }
            _ => self.clear(key),
        }
    }

    fn set_array(&mut self, key: &str, values: &[String]) -> bool {
        if values.is_empty() {
            return self.clear(key);
        }
        let new = Property::Array(values.to_vec());
        if self.properties.get(key) == Some(&new) {
            return false;
        }
        self.properties.insert(key.to_string(), new);
        true
    }

    fn clear(&mut self, key: &str) -> bool {
        self.properties.remove(key).is_some()
    }
}

/// Read-only view over one configuration and its ancestors.
///
/// `current` is the most specific layer (it may not exist yet), `base` is the
/// resolved parent configuration.
#[derive(Clone, Debug, Default)]
pub struct LayeredProperties<'a> {
    current: Option<&'a PropertyGroup>,
    base: Option<Box<LayeredProperties<'a>>>,
}

impl<'a> LayeredProperties<'a> {
    /// Build from layers ordered most specific first.
    pub fn from_layers(layers: Vec<Option<&'a PropertyGroup>>) -> Self {
        let mut view: Option<LayeredProperties<'a>> = None;
        for layer in layers.into_iter().rev() {
            view = Some(LayeredProperties {
                current: layer,
                base: view.map(Box::new),
            });
        }
        view.unwrap_or_default()
    }

    pub fn current(&self) -> Option<&'a PropertyGroup> {
        self.current
    }

    pub fn base(&self) -> Option<&LayeredProperties<'a>> {
        self.base.as_deref()
    }

    /// Collapse every layer into one group, most specific layer winning.
    pub fn flatten(&self) -> PropertyGroup {
        let mut group = self
            .base
            .as_ref()
            .map(|base| base.flatten())
            .unwrap_or_default();
        if let Some(current) = self.current {
            group.merge_from(current);
        }
        group
    }
}

impl PropertyProvider for LayeredProperties<'_> {
    fn property(&self, key: &str) -> Option<&Property> {
        self.current
            .and_then(|group| group.property(key))
            .or_else(|| self.base.as_ref().and_then(|base| base.property(key)))
    }

    fn contains_own(&self, key: &str) -> bool {
        self.current.is_some_and(|group| group.contains(key))
    }

    fn get_default_value(&self, key: &str, default: &str) -> String {
        match &self.base {
            Some(base) => base.get_value(key, default),
            None => default.to_string(),
        }
    }

    fn get_default_array(&self, key: &str, default: &[String]) -> Vec<String> {
        match &self.base {
            Some(base) => base.get_array(key, default),
            None => default.to_vec(),
        }
    }
}

/// Writable layered view: writes target `current`, reads fall back to `base`.
#[derive(Debug)]
pub struct LayeredPropertiesMut<'a> {
    current: &'a mut PropertyGroup,
    base: LayeredProperties<'a>,
}

impl<'a> LayeredPropertiesMut<'a> {
    pub fn new(current: &'a mut PropertyGroup, base: LayeredProperties<'a>) -> Self {
        Self { current, base }
    }

    pub fn current(&self) -> &PropertyGroup {
        &*self.current
    }

    /// True when the most specific layer holds the key.
    pub fn has_own(&self, key: &str) -> bool {
        self.current.contains(key)
    }
}

impl PropertyProvider for LayeredPropertiesMut<'_> {
    fn property(&self, key: &str) -> Option<&Property> {
        self.current.property(key).or_else(|| self.base.property(key))
    }

    fn contains_own(&self, key: &str) -> bool {
        self.has_own(key)
    }

    fn get_default_value(&self, key: &str, default: &str) -> String {
        self.base.get_value(key, default)
    }

    fn get_default_array(&self, key: &str, default: &[String]) -> Vec<String> {
        self.base.get_array(key, default)
    }
}

impl PropertyProviderMut for LayeredPropertiesMut<'_> {
    fn set_value(&mut self, key: &str, value: Option<&str>) -> bool {
        self.current.set_value(key, value)
    }

    fn set_array(&mut self, key: &str, values: &[String]) -> bool {
        self.current.set_array(key, values)
    }

    fn clear(&mut self, key: &str) -> bool {
        self.current.clear(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_value_reports_change() {
        let mut group = PropertyGroup::new();
        assert!(group.set_value("Value", Some("5")));
        assert!(!group.set_value("Value", Some("5")));
        assert!(group.set_value("Value", Some("6")));
        assert_eq!(group.get_value("Value", "0"), "6");
    }

    #[test]
    fn test_empty_value_clears() {
        let mut group = PropertyGroup::new();
        group.set_value("Value", Some("5"));
        assert!(group.set_value("Value", Some("")));
        assert!(!group.contains("Value"));
        group.set_array("Items", &strings(&["a"]));
        assert!(group.set_array("Items", &[]));
        assert!(!group.contains("Items"));
    }

    #[test]
    fn test_value_and_array_are_exclusive() {
        let mut group = PropertyGroup::new();
        group.set_value("Key", Some("x"));
        group.set_array("Key", &strings(&["a", "b"]));
        assert_eq!(group.get_value("Key", "default"), "default");
        assert_eq!(group.get_array("Key", &[]), strings(&["a", "b"]));
    }

    #[test]
    fn test_layered_fallback_and_default() {
        let mut root = PropertyGroup::new();
        root.set_value("Value", Some("5"));
        let mut debug = PropertyGroup::new();

        {
            let view = LayeredProperties::from_layers(vec![Some(&debug), Some(&root)]);
            assert_eq!(view.get_value("Value", "0"), "5");
            assert_eq!(view.get_default_value("Value", "0"), "5");
        }

        debug.set_value("Value", Some("9"));
        let view = LayeredProperties::from_layers(vec![Some(&debug), Some(&root)]);
        assert_eq!(view.get_value("Value", "0"), "9");
        assert_eq!(view.get_default_value("Value", "0"), "5");
        assert_eq!(view.flatten().get_value("Value", "0"), "9");
    }

    #[test]
    fn test_missing_layers_fall_through() {
        let mut root = PropertyGroup::new();
        root.set_array("Inputs", &strings(&["a", "b"]));
        let view = LayeredProperties::from_layers(vec![None, None, Some(&root)]);
        assert_eq!(view.get_array("Inputs", &[]), strings(&["a", "b"]));
        assert_eq!(view.get_default_array("Inputs", &[]), strings(&["a", "b"]));
    }

    #[test]
    fn test_layered_mut_writes_current_only() {
        let mut root = PropertyGroup::new();
        root.set_value("Value", Some("5"));
        let mut debug = PropertyGroup::new();
        {
            let base = LayeredProperties::from_layers(vec![Some(&root)]);
            let mut view = LayeredPropertiesMut::new(&mut debug, base);
            assert!(!view.has_own("Value"));
            view.set_value("Value", Some("7"));
            assert_eq!(view.get_value("Value", "0"), "7");
            assert_eq!(view.get_default_value("Value", "0"), "5");
            view.clear("Value");
            assert_eq!(view.get_value("Value", "0"), "5");
        }
        assert_eq!(root.get_value("Value", "0"), "5");
    }

    #[test]
    fn test_group_serializes_as_map() {
        let mut group = PropertyGroup::new();
        group.set_value("Value", Some("5"));
        group.set_array("Inputs", &strings(&["x", "y"]));
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json, serde_json::json!({ "Inputs": ["x", "y"], "Value": "5" }));
        let back: PropertyGroup = serde_json::from_value(json).unwrap();
        assert_eq!(back, group);
    }
}
