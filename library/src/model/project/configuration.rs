//! Dotted configuration paths (`"Root.Debug"`) and per-path property layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::model::project::property::PropertyGroup;

pub const SEPARATOR: char = '.';

/// A validated configuration path.
///
/// Every segment is non-empty and contains neither whitespace nor the separator.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationPath {
    segments: Vec<String>,
}

impl ConfigurationPath {
    pub fn parse(path: &str) -> Result<Self, BuildError> {
        let segments: Vec<String> = path.split(SEPARATOR).map(str::to_string).collect();
        Self::from_segments(segments)
    }

    pub fn from_segments(segments: Vec<String>) -> Result<Self, BuildError> {
        if segments.is_empty() {
            return Err(BuildError::InvalidConfigurationPath(String::new()));
        }
        for segment in &segments {
            if !is_valid_segment(segment) {
                return Err(BuildError::InvalidConfigurationPath(segments.join(".")));
            }
        }
        Ok(Self { segments })
    }

    /// The conventional top-level configuration.
    pub fn root() -> Self {
        Self {
            segments: vec!["Root".to_string()],
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn parent(&self) -> Option<ConfigurationPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, segment: &str) -> Result<ConfigurationPath, BuildError> {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self::from_segments(segments)
    }

    /// This path followed by each ancestor, most specific first.
    pub fn lineage(&self) -> Vec<ConfigurationPath> {
        (1..=self.segments.len())
            .rev()
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }

    /// True if `self` equals `other` or lies above it in the hierarchy.
    pub fn is_ancestor_of(&self, other: &ConfigurationPath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.chars().any(|c| c.is_whitespace() || c == SEPARATOR)
}

impl fmt::Display for ConfigurationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for ConfigurationPath {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ConfigurationPath {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ConfigurationPath> for String {
    fn from(value: ConfigurationPath) -> Self {
        value.to_string()
    }
}

/// One override layer of a node's properties.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Configuration {
    pub path: ConfigurationPath,
    #[serde(default)]
    pub properties: PropertyGroup,
}

impl Configuration {
    pub fn new(path: ConfigurationPath) -> Self {
        Self {
            path,
            properties: PropertyGroup::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_paths() {
        let path = ConfigurationPath::parse("Root.Debug").unwrap();
        assert_eq!(path.segments(), &["Root".to_string(), "Debug".to_string()]);
        assert_eq!(path.to_string(), "Root.Debug");
        assert_eq!(path.parent(), Some(ConfigurationPath::root()));
        assert_eq!(ConfigurationPath::root().parent(), None);
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        for bad in ["", "Root..Debug", "Root. Debug", ".Root", "Root.", "Ro ot"] {
            assert!(
                ConfigurationPath::parse(bad).is_err(),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_lineage_is_most_specific_first() {
        let path = ConfigurationPath::parse("Root.Debug.Win64").unwrap();
        let lineage: Vec<String> = path.lineage().iter().map(|p| p.to_string()).collect();
        assert_eq!(lineage, vec!["Root.Debug.Win64", "Root.Debug", "Root"]);
        assert!(ConfigurationPath::root().is_ancestor_of(&path));
        assert!(!path.is_ancestor_of(&ConfigurationPath::root()));
    }

    #[test]
    fn test_serde_uses_dotted_string() {
        let path = ConfigurationPath::parse("Root.Release").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"Root.Release\"");
        let back: ConfigurationPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<ConfigurationPath>("\"Root..X\"").is_err());
    }
}
