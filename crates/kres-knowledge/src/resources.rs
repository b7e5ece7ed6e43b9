//! Runtime resources needed to execute computations

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Kind of resource the runtime must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Data resource
    Resource,
    /// Namespace containing models or definitions
    Namespace,
    /// Function library or component
    Component,
    /// Remote service
    Service,
}

/// Reference to one resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub urn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ResourceRef {
    #[must_use]
    pub fn new(kind: ResourceKind, urn: impl Into<String>) -> Self {
        Self {
            kind,
            urn: urn.into(),
            version: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// What the runtime reports for a batch of computations
///
/// An *empty* set means the runtime cannot execute them. A non-empty set
/// may still list no resources, when everything is built in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    supported: bool,
    resources: IndexSet<ResourceRef>,
}

impl ResourceSet {
    /// Nothing is supported
    #[inline]
    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            resources: IndexSet::new(),
        }
    }

    /// Supported without any external resource
    #[inline]
    #[must_use]
    pub fn native() -> Self {
        Self {
            supported: true,
            resources: IndexSet::new(),
        }
    }

    /// Supported with the given resources
    #[must_use]
    pub fn with_resources<I: IntoIterator<Item = ResourceRef>>(resources: I) -> Self {
        Self {
            supported: true,
            resources: resources.into_iter().collect(),
        }
    }

    /// True if the runtime cannot execute the computations
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.supported
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceRef> {
        self.resources.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Add all resources from `other`, keeping first-seen order
    ///
    /// Merging never turns a supported set into an unsupported one.
    pub fn merge(&mut self, other: &Self) {
        if other.supported {
            self.supported = true;
        }
        self.resources.extend(other.resources.iter().cloned());
    }
}

impl Default for ResourceSet {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_deduplicates_and_keeps_order() {
        let a = ResourceRef::new(ResourceKind::Resource, "data:dem");
        let b = ResourceRef::new(ResourceKind::Component, "lib:gis");

        let mut set = ResourceSet::with_resources([a.clone()]);
        set.merge(&ResourceSet::with_resources([b.clone(), a.clone()]));

        let urns: Vec<_> = set.resources().map(|r| r.urn.as_str()).collect();
        assert_eq!(urns, vec!["data:dem", "lib:gis"]);
        assert!(!set.is_empty());
    }

    #[test]
    fn unsupported_is_empty() {
        assert!(ResourceSet::unsupported().is_empty());
        assert!(!ResourceSet::native().is_empty());
        assert_eq!(ResourceSet::native().len(), 0);
    }
}
