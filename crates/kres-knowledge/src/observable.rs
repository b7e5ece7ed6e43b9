//! Observables and their semantic classification

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Semantic classification of an observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// A thing with its own identity (region, watershed, organism)
    Subject,
    /// A subject capable of decisions
    Agent,
    /// Something happening at a place and time
    Event,
    /// A connection between subjects
    Relationship,
    /// A dynamic affecting a subject
    Process,
    /// A measurable property of a subject
    Quality,
    /// A trait attributed to a subject
    Attribute,
    /// An emergent configuration of subjects
    Configuration,
}

impl SemanticType {
    /// Substantials exist independently and can provide context
    #[inline]
    #[must_use]
    pub const fn is_substantial(self) -> bool {
        matches!(
            self,
            Self::Subject | Self::Agent | Self::Event | Self::Relationship
        )
    }

    /// Dependents only exist inherent to a substantial context
    #[inline]
    #[must_use]
    pub const fn is_dependent(self) -> bool {
        !self.is_substantial()
    }

    /// Countables can be instantiated as individual observations
    #[inline]
    #[must_use]
    pub const fn is_countable(self) -> bool {
        self.is_substantial()
    }
}

/// A semantic quantity to observe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observable {
    urn: String,
    semantic_type: SemanticType,
    #[serde(default)]
    collective: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stated_name: Option<String>,
}

impl Observable {
    /// Create a required, non-collective observable
    #[must_use]
    pub fn new(urn: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            urn: urn.into(),
            semantic_type,
            collective: false,
            optional: false,
            stated_name: None,
        }
    }

    /// Mark as collective (observing all instances in the observer's view)
    #[inline]
    #[must_use]
    pub fn collective(mut self) -> Self {
        self.collective = true;
        self
    }

    /// Mark as optional (a dependency that may remain unresolved)
    #[inline]
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Set the local name used when this is a dependency
    #[inline]
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.stated_name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn urn(&self) -> &str {
        &self.urn
    }

    #[inline]
    #[must_use]
    pub const fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    #[inline]
    #[must_use]
    pub const fn is_collective(&self) -> bool {
        self.collective
    }

    #[inline]
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    #[must_use]
    pub fn stated_name(&self) -> Option<&str> {
        self.stated_name.as_deref()
    }

    /// Shorthand for the semantic type's substantiality
    #[inline]
    #[must_use]
    pub const fn is_substantial(&self) -> bool {
        self.semantic_type.is_substantial()
    }

    /// Shorthand for the semantic type's dependency
    #[inline]
    #[must_use]
    pub const fn is_dependent(&self) -> bool {
        self.semantic_type.is_dependent()
    }
}

impl Display for Observable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.urn)
    }
}
