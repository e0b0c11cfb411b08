use uuid::Uuid;

use crate::error::BuildError;
use crate::model::project::{Property, PropertyProvider, PropertyProviderMut};
use crate::plugin::filter::{Filter, InputDescriptor};
use crate::plugin::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// One node output.
    Single,
    /// Several node outputs, concatenated in reference order.
    Multiple,
    /// A template handed over as a callable.
    Pipeline,
}

/// Binds a node or pipeline input to GUID references stored in properties.
#[derive(Clone, Debug)]
pub struct DependencyBinding {
    descriptor: InputDescriptor,
    kind: DependencyKind,
}

impl DependencyBinding {
    pub(crate) fn new(descriptor: InputDescriptor, kind: DependencyKind) -> Self {
        Self { descriptor, kind }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &InputDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    /// Referenced ids in stored order. Blank entries are skipped; single and
    /// pipeline bindings keep only the first reference.
    pub fn references(&self, properties: &impl PropertyProvider) -> Result<Vec<Uuid>, BuildError> {
        let raw: Vec<&str> = match properties.property(self.name()) {
            Some(Property::Value(v)) => vec![v.as_str()],
            Some(Property::Array(a)) => a.iter().map(String::as_str).collect(),
            None => Vec::new(),
        };

        let mut ids = Vec::with_capacity(raw.len());
        for entry in raw {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let id = Uuid::parse_str(entry)
                .map_err(|_| BuildError::MalformedGuid(entry.to_string()))?;
            ids.push(id);
        }
        if self.kind != DependencyKind::Multiple {
            ids.truncate(1);
        }
        Ok(ids)
    }

    pub fn set_references(&self, properties: &mut impl PropertyProviderMut, ids: &[Uuid]) -> bool {
        let raw: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        properties.set_array(self.name(), &raw)
    }

    /// Resolve every reference through `resolver` and assign the result.
    ///
    /// References the resolver answers with `None` assign nothing; the
    /// multiple form assigns only when at least one reference resolved.
    pub fn evaluate_and_assign(
        &self,
        filter: &mut dyn Filter,
        properties: &impl PropertyProvider,
        resolver: &mut dyn FnMut(Uuid) -> Result<Option<Value>, BuildError>,
    ) -> Result<(), BuildError> {
        let mut values = Vec::new();
        for id in self.references(properties)? {
            if let Some(value) = resolver(id)? {
                values.push(value);
            }
        }

        let value = match self.kind {
            DependencyKind::Multiple if values.is_empty() => return Ok(()),
            DependencyKind::Multiple => Value::Array(values),
            DependencyKind::Single | DependencyKind::Pipeline => match values.into_iter().next() {
                Some(value) => value,
                None => return Ok(()),
            },
        };
        super::assign(filter, self.name(), value)
    }
}
